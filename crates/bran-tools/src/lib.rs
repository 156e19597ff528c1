//! BI tools for the Bran agent: warehouse queries, spreadsheet export, alias
//! management, and campaign email.
//!
//! Tools talk to external systems through the traits in [`clients`], so every
//! tool is testable against scriptable in-memory clients. [`build_registry`]
//! assembles the complete toolset the binary hands to the agent.

pub mod alias;
pub mod clients;
pub mod discovery;
pub mod email;
pub mod query;
pub mod sheets;

use std::sync::Arc;

use bran_agent::{RegistryError, ToolRegistry};
use bran_store::AliasStore;

pub use alias::{ListAliasesTool, RemoveAliasTool, SaveAliasTool};
pub use clients::{
    ChartKind, ClientError, EmailMessage, EmailTransport, Row, SharedMailer, SharedSheets,
    SharedWarehouse, SheetsClient, WarehouseClient,
};
pub use discovery::{ListDatabasesTool, ListSchemasTool, ListTablesTool};
pub use email::SendCampaignEmailTool;
pub use query::{GetAccountInfoTool, RunQueryTool};
pub use sheets::{
    AddChartTool, CreateSheetTool, ReadSheetTool, RenameSheetTool, ReplicateLastQueryTool,
    alias_from_title,
};

#[cfg(any(test, feature = "testing"))]
pub use clients::mock::{MockMailer, MockSheet, MockSheets, MockWarehouse};

/// Build the full tool registry over the given clients.
///
/// `sender` is the address that receives test-mode verification copies.
pub fn build_registry(
    warehouse: SharedWarehouse,
    sheets: SharedSheets,
    mailer: SharedMailer,
    store: Arc<AliasStore>,
    sender: impl Into<String>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(RunQueryTool::new(warehouse.clone())))?;
    registry.register(Arc::new(GetAccountInfoTool::new(warehouse.clone())))?;

    registry.register(Arc::new(ListDatabasesTool::new(warehouse.clone())))?;
    registry.register(Arc::new(ListSchemasTool::new(warehouse.clone())))?;
    registry.register(Arc::new(ListTablesTool::new(warehouse.clone())))?;

    registry.register(Arc::new(CreateSheetTool::new(
        sheets.clone(),
        store.clone(),
    )))?;
    registry.register(Arc::new(ReplicateLastQueryTool::new(
        warehouse,
        sheets.clone(),
        store.clone(),
    )))?;
    registry.register(Arc::new(RenameSheetTool::new(
        sheets.clone(),
        store.clone(),
    )))?;
    registry.register(Arc::new(AddChartTool::new(sheets.clone(), store.clone())))?;
    registry.register(Arc::new(ReadSheetTool::new(sheets, store.clone())))?;

    registry.register(Arc::new(SaveAliasTool::new(store.clone())))?;
    registry.register(Arc::new(ListAliasesTool::new(store.clone())))?;
    registry.register(Arc::new(RemoveAliasTool::new(store)))?;

    registry.register(Arc::new(SendCampaignEmailTool::new(mailer, sender)))?;

    Ok(registry)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
