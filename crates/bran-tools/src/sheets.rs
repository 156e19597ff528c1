//! Spreadsheet tools.
//!
//! Everything that mutates a spreadsheet is sensitive: it requires
//! `confirm: true` and is never retried automatically. Sheets created here
//! get an alias derived from their title saved to the [`AliasStore`], so
//! later turns can say "the revenue sheet" instead of a provider ID.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use bran_agent::{
    FailureKind, FormatOptions, ParamExt, Tool, ToolContext, ToolFailure, ToolResult,
    format_as_table,
};
use bran_store::AliasStore;

use crate::clients::{ChartKind, Row, SharedSheets, SharedWarehouse};

/// Derive the auto-saved alias from a sheet title: lowercased, whitespace
/// runs collapsed to single underscores.
pub fn alias_from_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Resolve the `sheet` parameter: an alias saved in the store, or a raw
/// provider ID via `sheet_id`. Exactly one must be given.
fn resolve_sheet_ref(params: &Value, store: &AliasStore) -> Result<String, ToolFailure> {
    match (params.opt_str("alias"), params.opt_str("sheet_id")) {
        (Some(alias), None) => store.resolve(alias).map_err(|e| match e {
            bran_store::StoreError::AliasNotFound(name) => ToolFailure::with_message(
                FailureKind::NotFound,
                format!("No saved alias named '{}'. Use list_aliases to see what exists.", name),
            ),
            other => ToolFailure::from_provider_error(&other.to_string(), "alias_store"),
        }),
        (None, Some(id)) => Ok(id.to_string()),
        (Some(_), Some(_)) => Err(ToolFailure::validation(
            "Provide either 'alias' or 'sheet_id', not both",
        )),
        (None, None) => Err(ToolFailure::validation(
            "Provide 'alias' (a saved alias) or 'sheet_id' (a provider ID)",
        )),
    }
}

/// The refusal returned when a sensitive tool is called without confirm.
fn confirm_required(action: &str) -> ToolResult {
    ToolResult::failure(ToolFailure::validation(format!(
        "This action {}. Nothing was changed. Call again with confirm=true to proceed.",
        action
    )))
}

fn sheet_schema_props() -> Value {
    json!({
        "alias": {
            "type": "string",
            "description": "A saved alias for the spreadsheet"
        },
        "sheet_id": {
            "type": "string",
            "description": "The provider spreadsheet ID"
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// create_sheet
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a spreadsheet from explicit rows and saves a title-derived alias.
pub struct CreateSheetTool {
    sheets: SharedSheets,
    store: Arc<AliasStore>,
}

impl CreateSheetTool {
    pub fn new(sheets: SharedSheets, store: Arc<AliasStore>) -> Self {
        Self { sheets, store }
    }
}

#[async_trait]
impl Tool for CreateSheetTool {
    fn name(&self) -> &str {
        "create_sheet"
    }

    fn description(&self) -> &str {
        "Create a new spreadsheet with the given title and rows. An alias \
         derived from the title is saved automatically so the sheet can be \
         referenced by name later. Requires confirm=true."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title for the new spreadsheet"
                },
                "rows": {
                    "type": "array",
                    "items": {"type": "object"},
                    "description": "Data rows as objects with identical keys"
                },
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true to actually create the sheet"
                }
            },
            "required": ["title", "rows"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let title = match params.require_str("title") {
            Ok(title) => title,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let rows: Vec<Row> = match params.get("rows") {
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_object() {
                        Some(obj) => out.push(obj.clone()),
                        None => {
                            return Ok(ToolResult::failure(ToolFailure::validation(
                                "Parameter 'rows' must be an array of objects",
                            )));
                        }
                    }
                }
                out
            }
            _ => {
                return Ok(ToolResult::failure(ToolFailure::validation(
                    "Missing required parameter: rows",
                )));
            }
        };

        if !params.opt_bool("confirm", false) {
            return Ok(confirm_required(&format!(
                "creates a new spreadsheet titled '{}' with {} rows",
                title,
                rows.len()
            )));
        }

        let sheet_id = match self.sheets.create_spreadsheet(title).await {
            Ok(id) => id,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };
        if let Err(e) = self.sheets.write_rows(&sheet_id, &rows).await {
            return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                &e.0,
                self.name(),
            )));
        }

        let alias = alias_from_title(title);
        if let Err(e) = self.store.save(&alias, &sheet_id) {
            // The sheet exists; a failed alias save must not look like a
            // failed creation.
            tracing::warn!(error = %e, alias, "Failed to save alias for new sheet");
        }

        tracing::info!(sheet_id, alias, rows = rows.len(), "Created spreadsheet");
        Ok(ToolResult::json(json!({
            "sheet_id": sheet_id,
            "alias": alias,
            "rows_written": rows.len()
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// replicate_last_query
// ─────────────────────────────────────────────────────────────────────────────

/// Re-runs the most recent warehouse query and writes the full result into a
/// new spreadsheet. This is how users export "that last result" without the
/// model re-typing rows through the context window.
pub struct ReplicateLastQueryTool {
    warehouse: SharedWarehouse,
    sheets: SharedSheets,
    store: Arc<AliasStore>,
}

impl ReplicateLastQueryTool {
    pub fn new(warehouse: SharedWarehouse, sheets: SharedSheets, store: Arc<AliasStore>) -> Self {
        Self {
            warehouse,
            sheets,
            store,
        }
    }
}

#[async_trait]
impl Tool for ReplicateLastQueryTool {
    fn name(&self) -> &str {
        "replicate_last_query"
    }

    fn description(&self) -> &str {
        "Re-run the most recently executed warehouse query and export the \
         complete result set into a new spreadsheet, bypassing display \
         truncation. Requires confirm=true."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title for the new spreadsheet"
                },
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true to actually create the sheet"
                }
            },
            "required": ["title"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let title = match params.require_str("title") {
            Ok(title) => title,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        let Some(sql) = self.warehouse.last_query() else {
            return Ok(ToolResult::failure(ToolFailure::validation(
                "No query has been run yet, so there is nothing to replicate. \
                 Run a query first.",
            )));
        };

        if !params.opt_bool("confirm", false) {
            return Ok(confirm_required(&format!(
                "re-runs the last query and exports its full result into a new \
                 spreadsheet titled '{}'",
                title
            )));
        }

        let rows = match self.warehouse.query(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };

        let sheet_id = match self.sheets.create_spreadsheet(title).await {
            Ok(id) => id,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };
        if let Err(e) = self.sheets.write_rows(&sheet_id, &rows).await {
            return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                &e.0,
                self.name(),
            )));
        }

        let alias = alias_from_title(title);
        if let Err(e) = self.store.save(&alias, &sheet_id) {
            tracing::warn!(error = %e, alias, "Failed to save alias for new sheet");
        }

        tracing::info!(sheet_id, alias, rows = rows.len(), "Replicated query to sheet");
        Ok(ToolResult::json(json!({
            "sheet_id": sheet_id,
            "alias": alias,
            "rows_written": rows.len()
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// rename_sheet
// ─────────────────────────────────────────────────────────────────────────────

pub struct RenameSheetTool {
    sheets: SharedSheets,
    store: Arc<AliasStore>,
}

impl RenameSheetTool {
    pub fn new(sheets: SharedSheets, store: Arc<AliasStore>) -> Self {
        Self { sheets, store }
    }
}

#[async_trait]
impl Tool for RenameSheetTool {
    fn name(&self) -> &str {
        "rename_sheet"
    }

    fn description(&self) -> &str {
        "Rename an existing spreadsheet, referenced by alias or by ID. \
         Requires confirm=true."
    }

    fn parameters(&self) -> Value {
        let mut props = sheet_schema_props();
        props["new_title"] = json!({
            "type": "string",
            "description": "The new title"
        });
        props["confirm"] = json!({
            "type": "boolean",
            "description": "Must be true to actually rename"
        });
        json!({
            "type": "object",
            "properties": props,
            "required": ["new_title"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let new_title = match params.require_str("new_title") {
            Ok(title) => title,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let sheet_id = match resolve_sheet_ref(&params, &self.store) {
            Ok(id) => id,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        if !params.opt_bool("confirm", false) {
            return Ok(confirm_required(&format!(
                "renames the spreadsheet to '{}'",
                new_title
            )));
        }

        if let Err(e) = self.sheets.rename(&sheet_id, new_title).await {
            return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                &e.0,
                self.name(),
            )));
        }

        tracing::info!(sheet_id, new_title, "Renamed spreadsheet");
        Ok(ToolResult::json(json!({
            "sheet_id": sheet_id,
            "title": new_title
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// add_chart
// ─────────────────────────────────────────────────────────────────────────────

pub struct AddChartTool {
    sheets: SharedSheets,
    store: Arc<AliasStore>,
}

impl AddChartTool {
    pub fn new(sheets: SharedSheets, store: Arc<AliasStore>) -> Self {
        Self { sheets, store }
    }
}

#[async_trait]
impl Tool for AddChartTool {
    fn name(&self) -> &str {
        "add_chart"
    }

    fn description(&self) -> &str {
        "Embed a chart over a spreadsheet's data. Supported chart types: \
         line, bar, column, pie, scatter, area. Requires confirm=true."
    }

    fn parameters(&self) -> Value {
        let mut props = sheet_schema_props();
        props["chart_type"] = json!({
            "type": "string",
            "enum": ChartKind::ALL,
            "description": "The chart type"
        });
        props["title"] = json!({
            "type": "string",
            "description": "Chart title (defaults to the chart type)"
        });
        props["confirm"] = json!({
            "type": "boolean",
            "description": "Must be true to actually add the chart"
        });
        json!({
            "type": "object",
            "properties": props,
            "required": ["chart_type"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let kind: ChartKind = match params.require_str("chart_type") {
            Ok(raw) => match raw.parse() {
                Ok(kind) => kind,
                Err(detail) => return Ok(ToolResult::failure(ToolFailure::validation(detail))),
            },
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let sheet_id = match resolve_sheet_ref(&params, &self.store) {
            Ok(id) => id,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let title = params.opt_str("title").unwrap_or(kind.as_str());

        if !params.opt_bool("confirm", false) {
            return Ok(confirm_required(&format!(
                "adds a {} chart to the spreadsheet",
                kind
            )));
        }

        if let Err(e) = self.sheets.add_chart(&sheet_id, kind, title).await {
            return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                &e.0,
                self.name(),
            )));
        }

        tracing::info!(sheet_id, chart = %kind, "Added chart");
        Ok(ToolResult::json(json!({
            "sheet_id": sheet_id,
            "chart_type": kind.as_str(),
            "title": title
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// read_sheet
// ─────────────────────────────────────────────────────────────────────────────

/// Reads a spreadsheet back as a Markdown table. Read-only, so not sensitive.
pub struct ReadSheetTool {
    sheets: SharedSheets,
    store: Arc<AliasStore>,
}

impl ReadSheetTool {
    pub fn new(sheets: SharedSheets, store: Arc<AliasStore>) -> Self {
        Self { sheets, store }
    }
}

#[async_trait]
impl Tool for ReadSheetTool {
    fn name(&self) -> &str {
        "read_sheet"
    }

    fn description(&self) -> &str {
        "Read a spreadsheet's data, referenced by alias or by ID, and return \
         it as a Markdown table."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": sheet_schema_props()
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let sheet_id = match resolve_sheet_ref(&params, &self.store) {
            Ok(id) => id,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        let rows = match self.sheets.read(&sheet_id).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(ToolResult::failure(ToolFailure::from_provider_error(
                    &e.0,
                    self.name(),
                )));
            }
        };

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
    use crate::clients::mock::{MockSheets, MockWarehouse};
    use crate::clients::{SheetsClient, WarehouseClient};
    use serde_json::Map;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn store() -> Arc<AliasStore> {
        Arc::new(AliasStore::in_memory().unwrap())
    }

    #[test]
    fn test_alias_from_title() {
        assert_eq!(alias_from_title("Q3 Revenue Report"), "q3_revenue_report");
        assert_eq!(alias_from_title("  spaced   out  "), "spaced_out");
        assert_eq!(alias_from_title("single"), "single");
    }

    #[tokio::test]
    async fn test_create_sheet_requires_confirm() {
        let sheets = Arc::new(MockSheets::new());
        let tool = CreateSheetTool::new(sheets.clone(), store());

        let result = tool
            .execute(
                json!({"title": "Test", "rows": [{"a": 1}]}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(failure.message.contains("Nothing was changed"));
        assert!(failure.message.contains("confirm=true"));
        assert_eq!(sheets.sheet_count(), 0);
    }

    #[tokio::test]
    async fn test_create_sheet_writes_rows_and_saves_alias() {
        let sheets = Arc::new(MockSheets::new());
        let aliases = store();
        let tool = CreateSheetTool::new(sheets.clone(), aliases.clone());

        let result = tool
            .execute(
                json!({
                    "title": "Q3 Revenue",
                    "rows": [{"region": "EMEA", "revenue": 1200}],
                    "confirm": true
                }),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert!(!result.is_error());
        let content = result.to_llm_content();
        assert!(content.contains("\"alias\": \"q3_revenue\""));

        let sheet_id = aliases.resolve("q3_revenue").unwrap();
        let sheet = sheets.sheet(&sheet_id).unwrap();
        assert_eq!(sheet.title, "Q3 Revenue");
        assert_eq!(sheet.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_create_sheet_rejects_non_object_rows() {
        let tool = CreateSheetTool::new(Arc::new(MockSheets::new()), store());
        let result = tool
            .execute(
                json!({"title": "T", "rows": [1, 2], "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            result.as_failure().unwrap().kind,
            FailureKind::ValidationError
        );
    }

    #[tokio::test]
    async fn test_replicate_without_prior_query_is_validation_failure() {
        let warehouse = Arc::new(MockWarehouse::new());
        let tool =
            ReplicateLastQueryTool::new(warehouse, Arc::new(MockSheets::new()), store());

        let result = tool
            .execute(
                json!({"title": "Export", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(failure.message.contains("nothing to replicate"));
    }

    #[tokio::test]
    async fn test_replicate_reruns_last_query_into_sheet() {
        let warehouse = Arc::new(
            MockWarehouse::new()
                .with_rows(vec![row(&[("n", json!(1))])])
                .with_rows(vec![row(&[("n", json!(1))]), row(&[("n", json!(2))])]),
        );
        // Simulate the earlier run_query turn.
        warehouse.query("SELECT n FROM t").await.unwrap();

        let sheets = Arc::new(MockSheets::new());
        let aliases = store();
        let tool = ReplicateLastQueryTool::new(warehouse.clone(), sheets.clone(), aliases.clone());

        let result = tool
            .execute(
                json!({"title": "Full Export", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(
            warehouse.queries(),
            vec!["SELECT n FROM t".to_string(), "SELECT n FROM t".to_string()]
        );
        let sheet_id = aliases.resolve("full_export").unwrap();
        assert_eq!(sheets.sheet(&sheet_id).unwrap().rows.len(), 2);
    }

    #[tokio::test]
    async fn test_rename_by_alias() {
        let sheets = Arc::new(MockSheets::new());
        let id = sheets.create_spreadsheet("Old").await.unwrap();
        let aliases = store();
        aliases.save("old", &id).unwrap();

        let tool = RenameSheetTool::new(sheets.clone(), aliases);
        let result = tool
            .execute(
                json!({"alias": "old", "new_title": "New", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(sheets.sheet(&id).unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_unknown_alias_is_not_found() {
        let tool = RenameSheetTool::new(Arc::new(MockSheets::new()), store());
        let result = tool
            .execute(
                json!({"alias": "ghost", "new_title": "X", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.contains("'ghost'"));
    }

    #[tokio::test]
    async fn test_both_alias_and_id_rejected() {
        let tool = ReadSheetTool::new(Arc::new(MockSheets::new()), store());
        let result = tool
            .execute(
                json!({"alias": "a", "sheet_id": "b"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            result.as_failure().unwrap().kind,
            FailureKind::ValidationError
        );
    }

    #[tokio::test]
    async fn test_add_chart_validates_kind() {
        let sheets = Arc::new(MockSheets::new());
        let id = sheets.create_spreadsheet("Data").await.unwrap();
        let tool = AddChartTool::new(sheets.clone(), store());

        let result = tool
            .execute(
                json!({"sheet_id": id, "chart_type": "donut", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(failure.message.contains("donut"));
    }

    #[tokio::test]
    async fn test_add_chart_by_id() {
        let sheets = Arc::new(MockSheets::new());
        let id = sheets.create_spreadsheet("Data").await.unwrap();
        let tool = AddChartTool::new(sheets.clone(), store());

        let result = tool
            .execute(
                json!({"sheet_id": id, "chart_type": "bar", "title": "Revenue", "confirm": true}),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(
            sheets.sheet(&id).unwrap().charts,
            vec![(ChartKind::Bar, "Revenue".to_string())]
        );
    }

    #[tokio::test]
    async fn test_read_sheet_renders_table_without_confirm() {
        let sheets = Arc::new(MockSheets::new());
        let id = sheets.create_spreadsheet("Data").await.unwrap();
        sheets
            .write_rows(&id, &[row(&[("k", json!("v"))])])
            .await
            .unwrap();

        let tool = ReadSheetTool::new(sheets, store());
        assert!(!tool.sensitive());

        let result = tool
            .execute(json!({"sheet_id": id}), &ToolContext::default())
            .await
            .unwrap();

        let text = result.to_llm_content();
        assert!(text.contains("| k |"));
        assert!(text.contains("*1 rows*"));
    }

    #[tokio::test]
    async fn test_mutating_sheet_tools_are_sensitive() {
        let sheets: SharedSheets = Arc::new(MockSheets::new());
        let warehouse: SharedWarehouse = Arc::new(MockWarehouse::new());
        let aliases = store();

        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(CreateSheetTool::new(sheets.clone(), aliases.clone())),
            Box::new(ReplicateLastQueryTool::new(
                warehouse,
                sheets.clone(),
                aliases.clone(),
            )),
            Box::new(RenameSheetTool::new(sheets.clone(), aliases.clone())),
            Box::new(AddChartTool::new(sheets, aliases)),
        ];
        for tool in &tools {
            assert!(tool.sensitive(), "{} should be sensitive", tool.name());
        }
    }
}
