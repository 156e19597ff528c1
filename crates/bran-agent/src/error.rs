//! Error types for the agent crate.

use thiserror::Error;

use crate::tool::RegistryError;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Error from the LLM backend.
    #[error("LLM error: {0}")]
    Llm(#[from] bran_llm::LlmError),

    /// Registry error (duplicate or unknown tool).
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Agent construction/configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
