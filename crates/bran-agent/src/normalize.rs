//! Error normalization for tool failures.
//!
//! Raw provider errors (SQL engines, spreadsheet APIs, SMTP) are noisy,
//! inconsistent, and sometimes carry internals that should not reach a chat
//! transcript. Every tool failure is normalized into a [`ToolFailure`] with a
//! closed [`FailureKind`], a fixed user-facing message, and actionable
//! suggestions. The raw error text goes to the tracing log only.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum dispatch attempts for a retryable failure.
pub const MAX_TOOL_ATTEMPTS: u32 = 3;

/// Initial backoff between dispatch attempts; doubles each retry.
pub const INITIAL_TOOL_BACKOFF: Duration = Duration::from_millis(500);

// ─────────────────────────────────────────────────────────────────────────────
// Failure Taxonomy
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of failure categories tools can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A referenced table, sheet, or resource does not exist.
    NotFound,
    /// The operation succeeded but produced no data.
    EmptyResult,
    /// The caller lacks permission for the resource or action.
    PermissionDenied,
    /// The upstream service is throttling requests.
    RateLimited,
    /// The operation exceeded its time budget.
    Timeout,
    /// The request parameters were malformed or missing.
    ValidationError,
    /// The model asked for a tool that is not registered.
    UnknownTool,
    /// A tool name was registered twice.
    DuplicateTool,
    /// Anything that did not match a known category.
    Unknown,
}

impl FailureKind {
    /// Whether a failure of this kind is worth retrying automatically.
    ///
    /// Only throttling and timeouts are transient; everything else will fail
    /// the same way on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    /// Short human-readable label used in rendered output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "Not Found",
            Self::EmptyResult => "Empty Result",
            Self::PermissionDenied => "Permission Denied",
            Self::RateLimited => "Rate Limited",
            Self::Timeout => "Timeout",
            Self::ValidationError => "Validation Error",
            Self::UnknownTool => "Unknown Tool",
            Self::DuplicateTool => "Duplicate Tool",
            Self::Unknown => "Error",
        }
    }

    /// The fixed user-facing sentence for this kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => {
                "The table, sheet, or resource you referenced doesn't exist or isn't accessible."
            }
            Self::EmptyResult => "The operation succeeded but returned no data.",
            Self::PermissionDenied => "You don't have permission to perform this action.",
            Self::RateLimited => "The service is receiving too many requests right now.",
            Self::Timeout => "The operation took too long and was cancelled.",
            Self::ValidationError => "The request parameters were invalid.",
            Self::UnknownTool => "The requested tool is not available.",
            Self::DuplicateTool => "A tool with this name is already registered.",
            Self::Unknown => "An unexpected error occurred while running the tool.",
        }
    }

    /// Actionable next steps per kind.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::NotFound => &[
                "Check the name spelling",
                "Use the fully qualified form (SCHEMA.TABLE) for warehouse objects",
                "List the available resources first",
                "Verify you have access to this resource",
            ],
            Self::EmptyResult => &[
                "Widen the filters or date range",
                "Verify the expected data has been loaded",
            ],
            Self::PermissionDenied => &[
                "Share the resource with the service account",
                "Verify the account role has the required grants",
                "Confirm the resource ID is correct",
            ],
            Self::RateLimited => &[
                "Wait a moment and try again",
                "Reduce the number of requests in quick succession",
            ],
            Self::Timeout => &[
                "Simplify the query or add filters to reduce the data scanned",
                "Try again; the service may have been briefly overloaded",
            ],
            Self::ValidationError => &[
                "Check that all required parameters are present",
                "Verify parameter types and allowed values",
            ],
            Self::UnknownTool => &["Use one of the registered tools"],
            Self::DuplicateTool => &["Register each tool under a unique name"],
            Self::Unknown => &[
                "Try the operation again",
                "Rephrase the request or break it into smaller steps",
            ],
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Failure
// ─────────────────────────────────────────────────────────────────────────────

/// A normalized tool failure safe to show to users and the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// The failure category.
    pub kind: FailureKind,
    /// User-facing message. Never raw provider text.
    pub message: String,
    /// Actionable suggestions.
    pub suggestions: Vec<String>,
}

impl ToolFailure {
    /// Build a failure with the kind's fixed message and suggestions.
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            suggestions: kind.suggestions().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build a failure with a custom message written by us (not a provider).
    pub fn with_message(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(kind)
        }
    }

    /// Failure for a tool name the registry does not know.
    pub fn unknown_tool(name: &str) -> Self {
        Self::with_message(
            FailureKind::UnknownTool,
            format!("No tool named '{}' is available.", name),
        )
    }

    /// Failure for a parameter problem, with our own wording of the detail.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::with_message(FailureKind::ValidationError, detail)
    }

    /// Classify a raw provider error, log it, and return the normalized form.
    ///
    /// The raw text appears in the tracing output only.
    pub fn from_provider_error(raw: &str, tool: &str) -> Self {
        let kind = classify(raw);
        tracing::warn!(tool, %kind, raw_error = raw, "Tool call failed");
        Self::new(kind)
    }

    /// Render the failure as the Markdown block shown to users.
    pub fn render(&self) -> String {
        let mut out = format!("❌ **{}**\n\n{}\n", self.kind.label(), self.message);
        if !self.suggestions.is_empty() {
            out.push_str("\n**Suggestions:**\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, suggestion));
            }
        }
        out
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Map a raw provider error string onto the closed taxonomy.
///
/// Matching is ordered: the warehouse's combined "does not exist or not
/// authorized" marker must win before the generic permission patterns.
pub fn classify(raw: &str) -> FailureKind {
    let lower = raw.to_lowercase();

    if lower.contains("does not exist or not authorized")
        || lower.contains("not found")
        || lower.contains("404")
    {
        FailureKind::NotFound
    } else if lower.contains("403")
        || lower.contains("permission")
        || lower.contains("access denied")
        || lower.contains("not authorized")
        || lower.contains("authentication failed")
    {
        FailureKind::PermissionDenied
    } else if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        FailureKind::RateLimited
    } else if lower.contains("timed out") || lower.contains("timeout") {
        FailureKind::Timeout
    } else if lower.contains("compilation error")
        || lower.contains("invalid identifier")
        || lower.contains("unable to parse")
        || lower.contains("invalid_argument")
    {
        FailureKind::ValidationError
    } else {
        FailureKind::Unknown
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
