//! Progress events emitted while a turn runs.
//!
//! Consumers (a CLI spinner, a web socket) subscribe with a tokio mpsc
//! channel. Events are ordered by a per-turn sequence number and every turn
//! ends with exactly one terminal event: `Done` on success, `Error` when the
//! turn itself failed. A dropped receiver never wedges the turn; sends to a
//! closed channel are ignored.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::normalize::ToolFailure;
use crate::types::{AgentResponse, TurnPhase};

/// One progress event within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Monotonically increasing within the turn, starting at 0.
    pub seq: u64,
    /// What happened.
    pub payload: EventPayload,
}

/// Event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The turn moved to a new phase.
    Phase { phase: TurnPhase },

    /// A tool call started. `internal` is true for plumbing tools whose
    /// names must not be surfaced to the user.
    ToolStart {
        name: String,
        call_id: String,
        internal: bool,
    },

    /// A tool call finished.
    ToolEnd {
        name: String,
        call_id: String,
        is_error: bool,
    },

    /// The turn finished successfully. Terminal.
    Done { response: AgentResponse },

    /// The turn itself failed. Terminal.
    Error { failure: ToolFailure },
}

impl EventPayload {
    /// Whether this payload ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Internal helper that numbers events and swallows send failures.
pub(crate) struct EventSink {
    tx: Option<UnboundedSender<AgentEvent>>,
    next_seq: u64,
}

impl EventSink {
    pub(crate) fn new(tx: Option<UnboundedSender<AgentEvent>>) -> Self {
        Self { tx, next_seq: 0 }
    }

    pub(crate) fn emit(&mut self, payload: EventPayload) {
        let event = AgentEvent {
            seq: self.next_seq,
            payload,
        };
        self.next_seq += 1;
        if let Some(tx) = &self.tx {
            // Receiver may be gone; the turn must not care.
            let _ = tx.send(event);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseUsage;

    fn dummy_response() -> AgentResponse {
        AgentResponse {
            text: "done".to_string(),
            tool_calls: vec![],
            tool_results: vec![],
            iterations: 1,
            usage: ResponseUsage::default(),
            truncated: false,
        }
    }

    #[test]
    fn test_sink_numbers_events_from_zero() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = EventSink::new(Some(tx));

        sink.emit(EventPayload::Phase {
            phase: TurnPhase::Thinking,
        });
        sink.emit(EventPayload::Done {
            response: dummy_response(),
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert!(second.payload.is_terminal());
    }

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);

        let mut sink = EventSink::new(Some(tx));
        sink.emit(EventPayload::Phase {
            phase: TurnPhase::Thinking,
        });
        // No panic, no error: the turn does not care.
    }

    #[test]
    fn test_terminal_classification() {
        assert!(
            EventPayload::Done {
                response: dummy_response()
            }
            .is_terminal()
        );
        assert!(
            !EventPayload::Phase {
                phase: TurnPhase::Acting
            }
            .is_terminal()
        );
        assert!(
            !EventPayload::ToolStart {
                name: "t".into(),
                call_id: "c".into(),
                internal: false,
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_event_serde_tag() {
        let event = AgentEvent {
            seq: 3,
            payload: EventPayload::ToolEnd {
                name: "run_query".to_string(),
                call_id: "call_1".to_string(),
                is_error: false,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["seq"], 3);
        assert_eq!(value["payload"]["type"], "tool_end");
    }
}
