//! Tool trait, execution context, and the closed tool registry.
//!
//! Tools are typed: each implements the [`Tool`] trait and is registered
//! explicitly. There is no reflective discovery; the registry is the complete
//! universe of what the model can call, and registering the same name twice
//! is an error.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::normalize::{
    FailureKind, INITIAL_TOOL_BACKOFF, MAX_TOOL_ATTEMPTS, ToolFailure,
};
use crate::schema::sanitize_schema;
use crate::types::{SessionId, TurnId};
use bran_llm::ToolDefinition;

// ─────────────────────────────────────────────────────────────────────────────
// Visibility & Context
// ─────────────────────────────────────────────────────────────────────────────

/// Who a tool exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolVisibility {
    /// The user may be told about this tool and its output.
    User,
    /// Plumbing for the model only. Never named or surfaced to the user;
    /// internal tool names start with an underscore by convention.
    Internal,
}

/// Context passed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The session this call belongs to.
    pub session_id: SessionId,
    /// The turn this call belongs to.
    pub turn_id: TurnId,
    /// Cooperative cancellation for the whole turn.
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Create a context for the given session and turn.
    pub fn new(session_id: SessionId, turn_id: TurnId) -> Self {
        Self {
            session_id,
            turn_id,
            cancel: CancellationToken::new(),
        }
    }

    /// Whether the turn has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(SessionId::new(), TurnId::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// The outcome of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Plain text output.
    Text(String),
    /// Structured JSON output.
    Json(Value),
    /// A normalized failure.
    Failure(ToolFailure),
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Create a JSON result.
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    /// Create a failure result.
    pub fn failure(failure: ToolFailure) -> Self {
        Self::Failure(failure)
    }

    /// Whether this result is a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The failure, if this result is one.
    pub fn as_failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Failure(f) => Some(f),
            _ => None,
        }
    }

    /// Render the result as the string handed to the model.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Failure(failure) => failure.render(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Helpers for pulling typed parameters out of a tool's JSON arguments.
///
/// All failures come back as [`ToolFailure::validation`] so tools can return
/// them directly without inventing wording.
pub trait ParamExt {
    /// A required string parameter.
    fn require_str(&self, key: &str) -> Result<&str, ToolFailure>;
    /// An optional string parameter.
    fn opt_str(&self, key: &str) -> Option<&str>;
    /// An optional boolean, with a default.
    fn opt_bool(&self, key: &str, default: bool) -> bool;
    /// An optional unsigned integer, with a default.
    fn opt_u64(&self, key: &str, default: u64) -> u64;
    /// An optional array of strings.
    fn opt_str_array(&self, key: &str) -> Result<Option<Vec<String>>, ToolFailure>;
}

impl ParamExt for Value {
    fn require_str(&self, key: &str) -> Result<&str, ToolFailure> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) => Err(ToolFailure::validation(format!(
                "Parameter '{}' must not be empty",
                key
            ))),
            Some(_) => Err(ToolFailure::validation(format!(
                "Parameter '{}' must be a string",
                key
            ))),
            None => Err(ToolFailure::validation(format!(
                "Missing required parameter: {}",
                key
            ))),
        }
    }

    fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    fn opt_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn opt_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    fn opt_str_array(&self, key: &str) -> Result<Option<Vec<String>>, ToolFailure> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => out.push(s.to_string()),
                        None => {
                            return Err(ToolFailure::validation(format!(
                                "Parameter '{}' must be an array of strings",
                                key
                            )));
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(ToolFailure::validation(format!(
                "Parameter '{}' must be an array of strings",
                key
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name. Internal tools start with an underscore.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Whether the tool may be surfaced to the user.
    fn visibility(&self) -> ToolVisibility {
        ToolVisibility::User
    }

    /// Sensitive tools (outbound email, sheet writes) require an explicit
    /// `confirm` parameter and are never retried automatically.
    fn sensitive(&self) -> bool {
        false
    }

    /// Execute the tool. Expected failures come back as
    /// [`ToolResult::Failure`]; `Err` is reserved for infrastructure faults.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> crate::Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    /// No tool with this name is registered.
    #[error("no tool named '{0}'")]
    UnknownTool(String),
}

/// The closed set of tools available to the agent.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names are rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of user-visible tools only, sorted.
    pub fn user_visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .values()
            .filter(|t| t.visibility() == ToolVisibility::User)
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations for every registered tool, schemas sanitized.
    ///
    /// Internal tools are declared too (the model calls them); their
    /// descriptions carry the instruction not to surface them. Output is
    /// sorted by name so requests are deterministic.
    pub fn declarations(&self) -> Vec<ToolDefinition> {
        let mut declarations: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| {
                ToolDefinition::new(
                    tool.name(),
                    tool.description(),
                    sanitize_schema(&tool.parameters()),
                )
            })
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Dispatch a call to a registered tool.
    ///
    /// Unknown names are a [`RegistryError::UnknownTool`]. Tool-level
    /// failures come back inside the `ToolResult`.
    pub async fn dispatch(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, RegistryError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        if ctx.is_cancelled() {
            // Not Timeout: cancellation must never look retryable.
            return Ok(ToolResult::failure(ToolFailure::with_message(
                FailureKind::Unknown,
                "The operation was cancelled before it started.",
            )));
        }

        match tool.execute(params, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(ToolResult::failure(ToolFailure::from_provider_error(
                &e.to_string(),
                name,
            ))),
        }
    }

    /// Dispatch with automatic retry for transient failures.
    ///
    /// Retries up to [`MAX_TOOL_ATTEMPTS`] total attempts with exponential
    /// backoff when the failure kind is retryable. Sensitive tools get a
    /// single attempt no matter what.
    pub async fn dispatch_with_retry(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, RegistryError> {
        let sensitive = self.get(name).map(|t| t.sensitive()).unwrap_or(false);
        let max_attempts = if sensitive { 1 } else { MAX_TOOL_ATTEMPTS };
        let mut backoff = INITIAL_TOOL_BACKOFF;

        let mut result = self.dispatch(name, params.clone(), ctx).await?;
        for attempt in 1..max_attempts {
            let retryable = result
                .as_failure()
                .map(|f| f.kind.is_retryable())
                .unwrap_or(false);
            if !retryable {
                break;
            }

            tracing::warn!(
                tool = name,
                attempt,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                "Transient tool failure, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;

            result = self.dispatch(name, params.clone(), ctx).await?;
        }

        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool
// ─────────────────────────────────────────────────────────────────────────────

/// A scriptable tool for tests: records calls and replays queued results.
#[cfg(test)]
pub(crate) struct MockTool {
    name: String,
    visibility: ToolVisibility,
    sensitive: bool,
    results: std::sync::Mutex<Vec<ToolResult>>,
    calls: std::sync::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: ToolVisibility::User,
            sensitive: false,
            results: std::sync::Mutex::new(Vec::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn internal(mut self) -> Self {
        self.visibility = ToolVisibility::Internal;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_result(self, result: ToolResult) -> Self {
        self.results.lock().unwrap().push(result);
        self
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "mock tool"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn visibility(&self) -> ToolVisibility {
        self.visibility
    }

    fn sensitive(&self) -> bool {
        self.sensitive
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> crate::Result<ToolResult> {
        self.calls.lock().unwrap().push(params);
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(ToolResult::text("ok"))
        } else {
            Ok(results.remove(0))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
