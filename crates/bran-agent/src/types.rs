//! Core types for sessions, turns, and agent configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a single turn within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    /// Generate a new random turn ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn Phase
// ─────────────────────────────────────────────────────────────────────────────

/// Where a turn currently is in its lifecycle.
///
/// A turn moves `AwaitingInput → Thinking → (Acting → Observing → Thinking)*
/// → Responding`. The Acting/Observing pair repeats once per round of tool
/// calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// No user input yet.
    AwaitingInput,
    /// Waiting on the model to plan or answer.
    Thinking,
    /// Executing tool calls requested by the model.
    Acting,
    /// Feeding tool results back into the transcript.
    Observing,
    /// Producing the final answer.
    Responding,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingInput => "awaiting_input",
            Self::Thinking => "thinking",
            Self::Acting => "acting",
            Self::Observing => "observing",
            Self::Responding => "responding",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Call Records
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation the model requested during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// The provider-assigned call ID.
    pub id: String,
    /// Name of the tool.
    pub name: String,
    /// Arguments the model supplied.
    pub arguments: serde_json::Value,
}

/// The outcome of a tool invocation, as recorded in the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultRecord {
    /// The call this result answers.
    pub tool_call_id: String,
    /// Whether the tool succeeded.
    pub success: bool,
    /// The content handed back to the model.
    pub content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn & Session
// ─────────────────────────────────────────────────────────────────────────────

/// One user message and everything the agent did to answer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub user_message: String,
    pub assistant_response: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResultRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Start a new turn for the given user message.
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            user_message: user_message.into(),
            assistant_response: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the turn finished with the assistant's final text.
    pub fn complete(&mut self, response: impl Into<String>) {
        self.assistant_response = Some(response.into());
        self.completed_at = Some(Utc::now());
    }

    /// Whether the turn has finished.
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A conversation: an ordered list of turns plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Begin a new turn and return a mutable reference to it.
    pub fn start_turn(&mut self, user_message: impl Into<String>) -> &mut Turn {
        self.turns.push(Turn::new(user_message));
        self.updated_at = Utc::now();
        self.turns.last_mut().unwrap()
    }

    /// The turn currently in progress, if any.
    pub fn current_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut().filter(|t| !t.is_complete())
    }

    /// The most recent `n` completed turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let completed = self.turns.len();
        &self.turns[completed.saturating_sub(n)..]
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier passed to the backend.
    pub model: String,

    /// Max tokens per completion.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Cap on model round-trips within a single turn.
    pub max_iterations: u32,

    /// System prompt prepended to every request.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: None,
            max_iterations: 25,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens per completion.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Response
// ─────────────────────────────────────────────────────────────────────────────

/// The result of a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The assistant's final text.
    pub text: String,
    /// Tool calls made during the turn, in order.
    pub tool_calls: Vec<ToolCall>,
    /// Tool results, in the same order.
    pub tool_results: Vec<ToolResultRecord>,
    /// Model round-trips used.
    pub iterations: u32,
    /// Accumulated token usage across round-trips.
    pub usage: ResponseUsage,
    /// True when the turn was cut off by the iteration cap.
    pub truncated: bool,
}

/// Token usage accumulated over a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ResponseUsage {
    /// Add one completion's usage into the running total.
    pub fn accumulate(&mut self, usage: &bran_llm::Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
