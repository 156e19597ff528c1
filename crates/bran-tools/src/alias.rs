//! Alias management tools.
//!
//! Thin wrappers over [`AliasStore`]: the model saves a friendly name for a
//! resource ID, lists what exists, or removes one.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use bran_agent::{FailureKind, ParamExt, Tool, ToolContext, ToolFailure, ToolResult};
use bran_store::{AliasStore, StoreError};

fn store_failure(e: StoreError) -> ToolFailure {
    match e {
        StoreError::AliasNotFound(name) => ToolFailure::with_message(
            FailureKind::NotFound,
            format!("No saved alias named '{}'.", name),
        ),
        other => ToolFailure::from_provider_error(&other.to_string(), "alias_store"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// save_alias
// ─────────────────────────────────────────────────────────────────────────────

pub struct SaveAliasTool {
    store: Arc<AliasStore>,
}

impl SaveAliasTool {
    pub fn new(store: Arc<AliasStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveAliasTool {
    fn name(&self) -> &str {
        "save_alias"
    }

    fn description(&self) -> &str {
        "Save a friendly alias for a resource ID (for example a spreadsheet). \
         Saving an existing alias overwrites it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The alias to save"
                },
                "id": {
                    "type": "string",
                    "description": "The resource ID it should resolve to"
                }
            },
            "required": ["name", "id"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let name = match params.require_str("name") {
            Ok(name) => name,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let id = match params.require_str("id") {
            Ok(id) => id,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        if let Err(e) = self.store.save(name, id) {
            return Ok(ToolResult::failure(store_failure(e)));
        }
        Ok(ToolResult::json(json!({"name": name, "id": id})))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// list_aliases
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListAliasesTool {
    store: Arc<AliasStore>,
}

impl ListAliasesTool {
    pub fn new(store: Arc<AliasStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListAliasesTool {
    fn name(&self) -> &str {
        "list_aliases"
    }

    fn description(&self) -> &str {
        "List every saved alias and the resource ID it resolves to."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let aliases = match self.store.list() {
            Ok(aliases) => aliases,
            Err(e) => return Ok(ToolResult::failure(store_failure(e))),
        };

        if aliases.is_empty() {
            return Ok(ToolResult::text("No aliases saved yet."));
        }

        let mut out = String::from("Saved aliases:\n");
        for alias in &aliases {
            out.push_str(&format!("- **{}** → {}\n", alias.name, alias.id));
        }
        Ok(ToolResult::text(out))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// remove_alias
// ─────────────────────────────────────────────────────────────────────────────

pub struct RemoveAliasTool {
    store: Arc<AliasStore>,
}

impl RemoveAliasTool {
    pub fn new(store: Arc<AliasStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RemoveAliasTool {
    fn name(&self) -> &str {
        "remove_alias"
    }

    fn description(&self) -> &str {
        "Remove a saved alias. The underlying resource is not touched."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The alias to remove"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let name = match params.require_str("name") {
            Ok(name) => name,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        if let Err(e) = self.store.remove(name) {
            return Ok(ToolResult::failure(store_failure(e)));
        }
        Ok(ToolResult::text(format!("Removed alias '{}'.", name)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
