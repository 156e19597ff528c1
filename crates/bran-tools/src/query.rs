//! Warehouse query tools.

use async_trait::async_trait;
use serde_json::{Value, json};

use bran_agent::{
    FailureKind, FormatOptions, ParamExt, Tool, ToolContext, ToolFailure, ToolResult,
    format_as_table,
};

use crate::clients::SharedWarehouse;

/// Default display cap when the model does not ask for one.
const DEFAULT_MAX_ROWS: u64 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// run_query
// ─────────────────────────────────────────────────────────────────────────────

/// Runs model-written SQL against the warehouse and renders the result as a
/// Markdown table.
pub struct RunQueryTool {
    warehouse: SharedWarehouse,
}

impl RunQueryTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for RunQueryTool {
    fn name(&self) -> &str {
        "run_query"
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the data warehouse and return the results \
         as a Markdown table. Large results are truncated for display; the \
         footer reports how many rows the query actually returned."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL query to execute"
                },
                "max_rows": {
                    "type": "integer",
                    "description": "Maximum rows to display (default 100)"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let sql = match params.require_str("sql") {
            Ok(sql) => sql,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let max_rows = params.opt_u64("max_rows", DEFAULT_MAX_ROWS) as usize;

        tracing::info!(rows_cap = max_rows, "Executing warehouse query");
        let rows = match self.warehouse.query(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };

        let render = format_as_table(&rows, &FormatOptions { max_rows });
        tracing::info!(
            total_rows = render.total_rows,
            displayed_rows = render.displayed_rows,
            "Query complete"
        );
        Ok(ToolResult::text(render.text))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// get_account_info
// ─────────────────────────────────────────────────────────────────────────────

/// Looks up a single account by name with a fixed query shape. The model
/// supplies only the account name, never SQL.
pub struct GetAccountInfoTool {
    warehouse: SharedWarehouse,
}

impl GetAccountInfoTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }

    fn build_sql(account_name: &str) -> String {
        // Single quotes are doubled; the rest of the statement is ours.
        let escaped = account_name.replace('\'', "''");
        format!(
            "SELECT ACCOUNT_ID, ACCOUNT_NAME, INDUSTRY, ANNUAL_REVENUE, OWNER_EMAIL \
             FROM ACCOUNTS WHERE UPPER(ACCOUNT_NAME) = UPPER('{}') LIMIT 1",
            escaped
        )
    }
}

#[async_trait]
impl Tool for GetAccountInfoTool {
    fn name(&self) -> &str {
        "get_account_info"
    }

    fn description(&self) -> &str {
        "Look up a single account by name and return its profile (ID, name, \
         industry, annual revenue, owner)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "account_name": {
                    "type": "string",
                    "description": "The account name to look up (case-insensitive)"
                }
            },
            "required": ["account_name"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let account_name = match params.require_str("account_name") {
            Ok(name) => name,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        let sql = Self::build_sql(account_name);
        let rows = match self.warehouse.query(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };

        if rows.is_empty() {
            return Ok(ToolResult::failure(ToolFailure::with_message(
                FailureKind::NotFound,
                format!("No account named '{}' was found.", account_name),
            )));
        }

        let render = format_as_table(&rows, &FormatOptions::default());
        Ok(ToolResult::text(render.text))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::MockWarehouse;
    use serde_json::Map;
    use std::sync::Arc;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_run_query_renders_table() {
        let warehouse = Arc::new(MockWarehouse::new().with_rows(vec![
            row(&[("REGION", json!("EMEA")), ("REVENUE", json!(1200))]),
            row(&[("REGION", json!("APAC")), ("REVENUE", json!(900))]),
        ]));
        let tool = RunQueryTool::new(warehouse.clone());

        let result = tool
            .execute(
                json!({"sql": "SELECT region, revenue FROM sales"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        let text = result.to_llm_content();
        assert!(text.contains("| REGION | REVENUE |"));
        assert!(text.contains("| EMEA | 1200 |"));
        assert!(text.contains("*2 rows*"));
        assert_eq!(
            warehouse.queries(),
            vec!["SELECT region, revenue FROM sales".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_query_empty_result() {
        let warehouse = Arc::new(MockWarehouse::new().with_rows(vec![]));
        let tool = RunQueryTool::new(warehouse);

        let result = tool
            .execute(json!({"sql": "SELECT 1 WHERE 1=0"}), &ToolContext::default())
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(result.to_llm_content(), "No data returned");
    }

    #[tokio::test]
    async fn test_run_query_missing_sql_is_validation_failure() {
        let warehouse = Arc::new(MockWarehouse::new());
        let tool = RunQueryTool::new(warehouse.clone());

        let result = tool
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert_eq!(warehouse.query_count(), 0);
    }

    #[tokio::test]
    async fn test_run_query_normalizes_provider_error() {
        let warehouse = Arc::new(
            MockWarehouse::new()
                .with_error("SQL compilation error: Invalid identifier 'REVENUEE'"),
        );
        let tool = RunQueryTool::new(warehouse);

        let result = tool
            .execute(json!({"sql": "SELECT revenuee"}), &ToolContext::default())
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(!failure.message.contains("REVENUEE"));
    }

    #[tokio::test]
    async fn test_get_account_info_builds_fixed_sql() {
        let warehouse = Arc::new(MockWarehouse::new().with_rows(vec![row(&[
            ("ACCOUNT_ID", json!("A-1")),
            ("ACCOUNT_NAME", json!("Acme")),
        ])]));
        let tool = GetAccountInfoTool::new(warehouse.clone());

        let result = tool
            .execute(json!({"account_name": "O'Brien & Co"}), &ToolContext::default())
            .await
            .unwrap();

        assert!(!result.is_error());
        let sql = &warehouse.queries()[0];
        assert!(sql.contains("UPPER('O''Brien & Co')"));
        assert!(sql.starts_with("SELECT ACCOUNT_ID"));
    }

    #[tokio::test]
    async fn test_get_account_info_not_found() {
        let warehouse = Arc::new(MockWarehouse::new().with_rows(vec![]));
        let tool = GetAccountInfoTool::new(warehouse);

        let result = tool
            .execute(json!({"account_name": "Ghost Corp"}), &ToolContext::default())
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.contains("Ghost Corp"));
    }
}
