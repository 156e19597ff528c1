//! Internal schema-discovery tools.
//!
//! These exist so the model can orient itself in the warehouse before writing
//! SQL. They are declared to the model like any other tool but marked
//! [`ToolVisibility::Internal`]: their names start with an underscore and
//! their descriptions instruct the model to keep them out of user-facing text.

use async_trait::async_trait;
use serde_json::{Value, json};

use bran_agent::{
    FormatOptions, ParamExt, Tool, ToolContext, ToolFailure, ToolResult, ToolVisibility,
    format_as_table,
};

use crate::clients::SharedWarehouse;

/// Run a fixed discovery statement and render the result.
async fn run_discovery(
    warehouse: &SharedWarehouse,
    tool_name: &str,
    sql: &str,
) -> bran_agent::Result<ToolResult> {
    tracing::debug!(tool = tool_name, "Running discovery statement");
    match warehouse.query(sql).await {
        Ok(rows) => {
            let render = format_as_table(&rows, &FormatOptions::default());
            Ok(ToolResult::text(render.text))
        }
        Err(e) => Ok(ToolResult::failure(ToolFailure::from_provider_error(
            &e.0, tool_name,
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// _list_databases
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListDatabasesTool {
    warehouse: SharedWarehouse,
}

impl ListDatabasesTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for ListDatabasesTool {
    fn name(&self) -> &str {
        "_list_databases"
    }

    fn description(&self) -> &str {
        "List the databases visible to the current role. Internal discovery \
         tool. Use it to orient yourself, but never mention this tool or its \
         name to the user."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn visibility(&self) -> ToolVisibility {
        ToolVisibility::Internal
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        run_discovery(&self.warehouse, self.name(), "SHOW DATABASES").await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// _list_schemas
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListSchemasTool {
    warehouse: SharedWarehouse,
}

impl ListSchemasTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for ListSchemasTool {
    fn name(&self) -> &str {
        "_list_schemas"
    }

    fn description(&self) -> &str {
        "List schemas, optionally within a specific database. Internal \
         discovery tool. Use it to orient yourself, but never mention this \
         tool or its name to the user."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "database": {
                    "type": "string",
                    "description": "Restrict the listing to this database"
                }
            }
        })
    }

    fn visibility(&self) -> ToolVisibility {
        ToolVisibility::Internal
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let sql = match params.opt_str("database") {
            Some(database) => format!("SHOW SCHEMAS IN DATABASE {}", quote_ident(database)),
            None => "SHOW SCHEMAS".to_string(),
        };
        run_discovery(&self.warehouse, self.name(), &sql).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// _list_tables
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListTablesTool {
    warehouse: SharedWarehouse,
}

impl ListTablesTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        "_list_tables"
    }

    fn description(&self) -> &str {
        "List tables, optionally within a specific schema. Internal discovery \
         tool. Use it to orient yourself, but never mention this tool or its \
         name to the user."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "schema": {
                    "type": "string",
                    "description": "Restrict the listing to this schema"
                }
            }
        })
    }

    fn visibility(&self) -> ToolVisibility {
        ToolVisibility::Internal
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let sql = match params.opt_str("schema") {
            Some(schema) => format!("SHOW TABLES IN SCHEMA {}", quote_ident(schema)),
            None => "SHOW TABLES".to_string(),
        };
        run_discovery(&self.warehouse, self.name(), &sql).await
    }
}

/// Double-quote an identifier, escaping embedded quotes.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
