//! LLM backend abstraction for Bran.
//!
//! Provides a unified interface for completion-style LLM providers with
//! native tool calling. The agent loop talks to the [`LlmBackend`] trait and
//! never to a concrete provider.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! │  - health_check()                       │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!    ┌──────────┐        ┌───────────┐
//!    │ Anthropic│        │MockBackend│ (testing)
//!    └──────────┘        └───────────┘
//! ```

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use backend::{LlmBackend, SharedBackend, with_retry};
pub use error::{LlmError, RateLimitInfo, Result, is_retryable};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolResultBlock, ToolUseBlock, Usage,
};

#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockOutcome};
