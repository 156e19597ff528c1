//! The agent orchestration loop.
//!
//! A turn is an explicit state machine: `Thinking` asks the model what to do,
//! `Acting` runs the tool calls it requested, `Observing` feeds the results
//! back, and the cycle repeats until the model answers in plain text
//! (`Responding`) or the iteration cap trips. Tool failures never abort a
//! turn; their normalized form is handed back to the model as a tool result
//! so it can adjust.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::normalize::{ToolFailure, classify};
use crate::stream::{AgentEvent, EventPayload, EventSink};
use crate::tool::{RegistryError, ToolContext, ToolRegistry, ToolResult, ToolVisibility};
use crate::types::{
    AgentConfig, AgentResponse, ResponseUsage, Session, ToolCall, ToolResultRecord, TurnPhase,
};
use bran_llm::{CompletionRequest, Message, SharedBackend, ToolResultBlock};

/// Final text used when the iteration cap cuts a turn short.
const TRUNCATED_RESPONSE: &str =
    "I wasn't able to finish within the allowed number of steps. \
     Here's where I got to; ask me to continue if you'd like.";

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// The orchestrator: one LLM backend, one tool registry, one config.
pub struct Agent {
    backend: SharedBackend,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent directly.
    pub fn new(backend: SharedBackend, registry: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            backend,
            registry,
            config,
        }
    }

    /// Start building an agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The agent's tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one turn without event observers.
    pub async fn turn(&self, session: &mut Session, user_message: &str) -> Result<AgentResponse> {
        self.run_turn(session, user_message, None).await
    }

    /// Run one turn, streaming progress events to `events`.
    ///
    /// Exactly one terminal event (`Done` or `Error`) is sent, and it is the
    /// last event of the turn.
    pub async fn turn_with_events(
        &self,
        session: &mut Session,
        user_message: &str,
        events: UnboundedSender<AgentEvent>,
    ) -> Result<AgentResponse> {
        self.run_turn(session, user_message, Some(events)).await
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        user_message: &str,
        events: Option<UnboundedSender<AgentEvent>>,
    ) -> Result<AgentResponse> {
        let mut sink = EventSink::new(events);

        match self.run_turn_inner(session, user_message, &mut sink).await {
            Ok(response) => {
                sink.emit(EventPayload::Done {
                    response: response.clone(),
                });
                Ok(response)
            }
            Err(e) => {
                // Normalize before anything user-facing sees it; the raw
                // error is already in the logs.
                let failure = ToolFailure::new(classify(&e.to_string()));
                sink.emit(EventPayload::Error { failure });
                Err(e)
            }
        }
    }

    async fn run_turn_inner(
        &self,
        session: &mut Session,
        user_message: &str,
        sink: &mut EventSink,
    ) -> Result<AgentResponse> {
        // Prior completed turns become the conversation history.
        let mut messages: Vec<Message> = Vec::new();
        for turn in &session.turns {
            if let Some(response) = &turn.assistant_response {
                messages.push(Message::user(&turn.user_message));
                messages.push(Message::assistant(response));
            }
        }
        messages.push(Message::user(user_message));

        let turn_id = session.start_turn(user_message).id;
        let ctx = ToolContext::new(session.id, turn_id);

        info!(session = %session.id, turn = %turn_id, "Starting turn");
        sink.emit(EventPayload::Phase {
            phase: TurnPhase::Thinking,
        });

        let declarations = self.registry.declarations();
        let mut iterations: u32 = 0;
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut tool_results: Vec<ToolResultRecord> = Vec::new();
        let mut usage = ResponseUsage::default();

        let (text, truncated) = loop {
            if iterations >= self.config.max_iterations {
                warn!(
                    turn = %turn_id,
                    max_iterations = self.config.max_iterations,
                    "Iteration cap reached, truncating turn"
                );
                sink.emit(EventPayload::Phase {
                    phase: TurnPhase::Responding,
                });
                break (TRUNCATED_RESPONSE.to_string(), true);
            }
            iterations += 1;

            let mut request =
                CompletionRequest::new(&self.config.model, messages.clone(), self.config.max_tokens);
            if let Some(system) = &self.config.system_prompt {
                request = request.with_system(system);
            }
            if let Some(temperature) = self.config.temperature {
                request = request.with_temperature(temperature);
            }
            if !declarations.is_empty() {
                request = request.with_tools(declarations.clone());
            }

            let response = self.backend.complete(request).await?;
            usage.accumulate(&response.usage);

            let tool_uses = response.tool_uses();
            if tool_uses.is_empty() {
                sink.emit(EventPayload::Phase {
                    phase: TurnPhase::Responding,
                });
                break (response.text(), false);
            }

            sink.emit(EventPayload::Phase {
                phase: TurnPhase::Acting,
            });
            messages.push(Message::assistant_blocks(response.content.clone()));

            let mut result_blocks: Vec<ToolResultBlock> = Vec::new();
            for tool_use in tool_uses {
                debug!(turn = %turn_id, tool = %tool_use.name, "Dispatching tool call");
                let internal = self
                    .registry
                    .get(&tool_use.name)
                    .is_some_and(|t| t.visibility() == ToolVisibility::Internal);
                sink.emit(EventPayload::ToolStart {
                    name: tool_use.name.clone(),
                    call_id: tool_use.id.clone(),
                    internal,
                });
                tool_calls.push(ToolCall {
                    id: tool_use.id.clone(),
                    name: tool_use.name.clone(),
                    arguments: tool_use.input.clone(),
                });

                let result = match self
                    .registry
                    .dispatch_with_retry(&tool_use.name, tool_use.input, &ctx)
                    .await
                {
                    Ok(result) => result,
                    Err(RegistryError::UnknownTool(name)) => {
                        warn!(turn = %turn_id, tool = %name, "Model requested unknown tool");
                        ToolResult::failure(ToolFailure::unknown_tool(&name))
                    }
                    Err(other) => return Err(other.into()),
                };

                let is_error = result.is_error();
                let content = result.to_llm_content();
                sink.emit(EventPayload::ToolEnd {
                    name: tool_use.name.clone(),
                    call_id: tool_use.id.clone(),
                    is_error,
                });
                tool_results.push(ToolResultRecord {
                    tool_call_id: tool_use.id.clone(),
                    success: !is_error,
                    content: content.clone(),
                });
                result_blocks.push(if is_error {
                    ToolResultBlock::error(tool_use.id, content)
                } else {
                    ToolResultBlock::success(tool_use.id, content)
                });
            }

            sink.emit(EventPayload::Phase {
                phase: TurnPhase::Observing,
            });
            messages.push(Message::tool_results(result_blocks));
            sink.emit(EventPayload::Phase {
                phase: TurnPhase::Thinking,
            });
        };

        if let Some(turn) = session.current_turn_mut() {
            turn.tool_calls = tool_calls.clone();
            turn.tool_results = tool_results.clone();
            turn.complete(&text);
        }
        info!(turn = %turn_id, iterations, truncated, "Turn finished");

        Ok(AgentResponse {
            text,
            tool_calls,
            tool_results,
            iterations,
            usage,
            truncated,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent builder for [`Agent`].
#[derive(Default)]
pub struct AgentBuilder {
    backend: Option<SharedBackend>,
    registry: Option<Arc<ToolRegistry>>,
    config: AgentConfig,
}

impl AgentBuilder {
    /// Set the LLM backend.
    pub fn backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the tool registry.
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the agent configuration.
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the agent. A backend is required; the registry defaults to empty.
    pub fn build(self) -> Result<Agent> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::Config("an LLM backend is required".to_string()))?;
        let registry = self.registry.unwrap_or_else(|| Arc::new(ToolRegistry::new()));
        Ok(Agent::new(backend, registry, self.config))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
