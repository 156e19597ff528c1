//! Client traits the tools are written against.
//!
//! Each external system (warehouse, spreadsheets, email) is reached through a
//! trait object so tools stay testable and the binary decides what to wire
//! in. Client errors carry the raw provider text; tools hand that text to the
//! normalizer, which logs it and maps it onto the closed failure taxonomy.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// One result row: column name to value, in column order.
pub type Row = Map<String, Value>;

/// Error from an external client.
///
/// The message is raw provider text and must never be shown to users
/// directly; it exists to be classified and logged.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ClientError(pub String);

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Warehouse
// ─────────────────────────────────────────────────────────────────────────────

/// A SQL warehouse connection.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Run a query and return all rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError>;

    /// The text of the most recent successfully executed query, if any.
    /// Used by tools that replicate the last result into a sheet.
    fn last_query(&self) -> Option<String>;
}

/// Shared handle to a warehouse client.
pub type SharedWarehouse = Arc<dyn WarehouseClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Spreadsheets
// ─────────────────────────────────────────────────────────────────────────────

/// Chart types a spreadsheet can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Column,
    Pie,
    Scatter,
    Area,
}

impl ChartKind {
    pub const ALL: &'static [&'static str] = &["line", "bar", "column", "pie", "scatter", "area"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Column => "column",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
            Self::Area => "area",
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "column" => Ok(Self::Column),
            "pie" => Ok(Self::Pie),
            "scatter" => Ok(Self::Scatter),
            "area" => Ok(Self::Area),
            other => Err(format!(
                "Unknown chart type '{}'. Supported types: {}",
                other,
                Self::ALL.join(", ")
            )),
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spreadsheet service.
#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Create an empty spreadsheet and return its ID.
    async fn create_spreadsheet(&self, title: &str) -> Result<String, ClientError>;

    /// Write rows (with a header derived from the first row's keys) into the
    /// spreadsheet, replacing existing content.
    async fn write_rows(&self, spreadsheet_id: &str, rows: &[Row]) -> Result<(), ClientError>;

    /// Rename a spreadsheet.
    async fn rename(&self, spreadsheet_id: &str, title: &str) -> Result<(), ClientError>;

    /// Embed a chart over the spreadsheet's data.
    async fn add_chart(
        &self,
        spreadsheet_id: &str,
        kind: ChartKind,
        title: &str,
    ) -> Result<(), ClientError>;

    /// Read the spreadsheet's data back as rows.
    async fn read(&self, spreadsheet_id: &str) -> Result<Vec<Row>, ClientError>;
}

/// Shared handle to a sheets client.
pub type SharedSheets = Arc<dyn SheetsClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Email
// ─────────────────────────────────────────────────────────────────────────────

/// One outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// An outbound email transport.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &EmailMessage) -> Result<(), ClientError>;
}

/// Shared handle to an email transport.
pub type SharedMailer = Arc<dyn EmailTransport>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Clients
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub mod mock {
    //! Scriptable in-memory clients for tests and local runs.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A warehouse that replays queued outcomes and records every query.
    #[derive(Default)]
    pub struct MockWarehouse {
        outcomes: Mutex<Vec<Result<Vec<Row>, ClientError>>>,
        queries: Mutex<Vec<String>>,
        last_query: Mutex<Option<String>>,
    }

    impl MockWarehouse {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful result.
        pub fn with_rows(self, rows: Vec<Row>) -> Self {
            self.outcomes.lock().push(Ok(rows));
            self
        }

        /// Queue a failure with raw provider text.
        pub fn with_error(self, raw: impl Into<String>) -> Self {
            self.outcomes.lock().push(Err(ClientError::new(raw)));
            self
        }

        /// All queries received, in order.
        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().clone()
        }

        pub fn query_count(&self) -> usize {
            self.queries.lock().len()
        }
    }

    #[async_trait]
    impl WarehouseClient for MockWarehouse {
        async fn query(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
            self.queries.lock().push(sql.to_string());
            let outcome = {
                let mut outcomes = self.outcomes.lock();
                if outcomes.is_empty() {
                    Ok(Vec::new())
                } else {
                    outcomes.remove(0)
                }
            };
            if outcome.is_ok() {
                *self.last_query.lock() = Some(sql.to_string());
            }
            outcome
        }

        fn last_query(&self) -> Option<String> {
            self.last_query.lock().clone()
        }
    }

    /// In-memory spreadsheet state.
    #[derive(Debug, Clone, Default)]
    pub struct MockSheet {
        pub title: String,
        pub rows: Vec<Row>,
        pub charts: Vec<(ChartKind, String)>,
    }

    /// A sheets service backed by a HashMap, with an optional scripted error.
    #[derive(Default)]
    pub struct MockSheets {
        sheets: Mutex<HashMap<String, MockSheet>>,
        next_id: Mutex<u64>,
        fail_next: Mutex<Option<ClientError>>,
    }

    impl MockSheets {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next call fail with raw provider text.
        pub fn fail_next(&self, raw: impl Into<String>) {
            *self.fail_next.lock() = Some(ClientError::new(raw));
        }

        /// Snapshot of a sheet's state, if it exists.
        pub fn sheet(&self, id: &str) -> Option<MockSheet> {
            self.sheets.lock().get(id).cloned()
        }

        pub fn sheet_count(&self) -> usize {
            self.sheets.lock().len()
        }

        fn take_failure(&self) -> Result<(), ClientError> {
            match self.fail_next.lock().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SheetsClient for MockSheets {
        async fn create_spreadsheet(&self, title: &str) -> Result<String, ClientError> {
            self.take_failure()?;
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            let id = format!("sheet-{}", *next_id);
            self.sheets.lock().insert(
                id.clone(),
                MockSheet {
                    title: title.to_string(),
                    ..Default::default()
                },
            );
            Ok(id)
        }

        async fn write_rows(&self, spreadsheet_id: &str, rows: &[Row]) -> Result<(), ClientError> {
            self.take_failure()?;
            let mut sheets = self.sheets.lock();
            let sheet = sheets.get_mut(spreadsheet_id).ok_or_else(|| {
                ClientError::new(format!("Spreadsheet '{}' not found (404)", spreadsheet_id))
            })?;
            sheet.rows = rows.to_vec();
            Ok(())
        }

        async fn rename(&self, spreadsheet_id: &str, title: &str) -> Result<(), ClientError> {
            self.take_failure()?;
            let mut sheets = self.sheets.lock();
            let sheet = sheets.get_mut(spreadsheet_id).ok_or_else(|| {
                ClientError::new(format!("Spreadsheet '{}' not found (404)", spreadsheet_id))
            })?;
            sheet.title = title.to_string();
            Ok(())
        }

        async fn add_chart(
            &self,
            spreadsheet_id: &str,
            kind: ChartKind,
            title: &str,
        ) -> Result<(), ClientError> {
            self.take_failure()?;
            let mut sheets = self.sheets.lock();
            let sheet = sheets.get_mut(spreadsheet_id).ok_or_else(|| {
                ClientError::new(format!("Spreadsheet '{}' not found (404)", spreadsheet_id))
            })?;
            sheet.charts.push((kind, title.to_string()));
            Ok(())
        }

        async fn read(&self, spreadsheet_id: &str) -> Result<Vec<Row>, ClientError> {
            self.take_failure()?;
            let sheets = self.sheets.lock();
            let sheet = sheets.get(spreadsheet_id).ok_or_else(|| {
                ClientError::new(format!("Spreadsheet '{}' not found (404)", spreadsheet_id))
            })?;
            Ok(sheet.rows.clone())
        }
    }

    /// An email transport that records sent messages instead of sending.
    #[derive(Default)]
    pub struct MockMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail_next: Mutex<Option<ClientError>>,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self, raw: impl Into<String>) {
            *self.fail_next.lock() = Some(ClientError::new(raw));
        }

        /// Every message handed to the transport, in order.
        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().clone()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl EmailTransport for MockMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), ClientError> {
            if let Some(err) = self.fail_next.lock().take() {
                return Err(err);
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
