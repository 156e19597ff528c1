//! Agent orchestration loop for Bran.
//!
//! This crate is the core of the assistant: it owns the turn state machine,
//! the closed tool registry, and the plumbing that keeps raw provider errors
//! and oversized result sets away from the user.
//!
//! ```text
//!  user message
//!      │
//!      ▼
//!  ┌─────────┐   tool calls    ┌──────────────┐
//!  │ Thinking │ ──────────────▶ │    Acting    │
//!  └─────────┘                  └──────┬───────┘
//!      ▲                               │ results (normalized,
//!      │        ┌──────────────┐       │  truncated)
//!      └─────── │  Observing   │ ◀─────┘
//!   plain text  └──────────────┘
//!      │
//!      ▼
//!  ┌────────────┐
//!  │ Responding │ → AgentResponse + Done event
//!  └────────────┘
//! ```

pub mod agent;
pub mod error;
pub mod format;
pub mod normalize;
pub mod schema;
pub mod stream;
pub mod tool;
pub mod types;

// Agent loop
pub use agent::{Agent, AgentBuilder};

// Errors
pub use error::{AgentError, Result};

// Result formatting
pub use format::{FormatOptions, TableRender, format_as_table};

// Error normalization
pub use normalize::{
    FailureKind, INITIAL_TOOL_BACKOFF, MAX_TOOL_ATTEMPTS, ToolFailure, classify,
};

// Schema sanitizing
pub use schema::sanitize_schema;

// Event stream
pub use stream::{AgentEvent, EventPayload};

// Tools
pub use tool::{
    ParamExt, RegistryError, Tool, ToolContext, ToolRegistry, ToolResult, ToolVisibility,
};

// Core types
pub use types::{
    AgentConfig, AgentResponse, ResponseUsage, Session, SessionId, ToolCall, ToolResultRecord,
    Turn, TurnId, TurnPhase,
};
