//! Markdown rendering for tabular query results.
//!
//! Every tool that returns rows presents them the same way: a GitHub-flavored
//! Markdown table with a row-count footer. Large result sets are capped so a
//! single tool result cannot blow out the model's context window; the render
//! reports both the true and the displayed row counts so callers never
//! misstate how much data exists.

use serde_json::{Map, Value};

/// Longest cell value rendered before truncation.
const MAX_CELL_CHARS: usize = 50;

/// Options for table rendering.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Maximum rows rendered into the table.
    pub max_rows: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { max_rows: 100 }
    }
}

/// A rendered table plus the counts callers must report.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRender {
    /// The Markdown text.
    pub text: String,
    /// How many rows the query actually produced.
    pub total_rows: usize,
    /// How many rows appear in the rendered table.
    pub displayed_rows: usize,
}

impl TableRender {
    /// True when the render shows fewer rows than exist.
    pub fn is_truncated(&self) -> bool {
        self.displayed_rows < self.total_rows
    }
}

/// Format rows (objects with identical keys) as a Markdown table.
///
/// Column order is taken from the first row (maps preserve insertion order).
/// Empty input renders the literal
/// string `No data returned`, which is how a successful-but-empty result is
/// distinguished from an error.
pub fn format_as_table(rows: &[Map<String, Value>], opts: &FormatOptions) -> TableRender {
    if rows.is_empty() {
        return TableRender {
            text: "No data returned".to_string(),
            total_rows: 0,
            displayed_rows: 0,
        };
    }

    let total_rows = rows.len();
    let display = &rows[..total_rows.min(opts.max_rows)];
    // Columns come from the full input: display may be empty when the cap is 0.
    let columns: Vec<&String> = rows[0].keys().collect();

    let header = format!(
        "| {} |",
        columns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    );
    let separator = format!(
        "|{}|",
        columns.iter().map(|_| "------").collect::<Vec<_>>().join("|")
    );

    let mut lines = vec![header, separator];
    for row in display {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| render_cell(row.get(col.as_str())))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    let mut text = lines.join("\n");
    if total_rows > opts.max_rows {
        text.push_str(&format!(
            "\n\n*Showing {} of {} rows*",
            opts.max_rows, total_rows
        ));
    } else {
        text.push_str(&format!("\n\n*{} rows*", total_rows));
    }

    TableRender {
        text,
        total_rows,
        displayed_rows: display.len(),
    }
}

/// Render one cell value. Nulls are blank; long values are clipped.
fn render_cell(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    if raw.chars().count() > MAX_CELL_CHARS {
        let clipped: String = raw.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", clipped)
    } else {
        raw
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
