//! End-to-end turns: scripted model + mock clients, real registry and loop.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use bran_agent::{Agent, AgentConfig, EventPayload, Session, TurnPhase};
use bran_llm::{CompletionResponse, ContentBlock, MockBackend, StopReason, Usage};
use bran_store::AliasStore;
use bran_tools::{MockMailer, MockSheets, MockWarehouse, build_registry};

fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn tool_use_response(id: &str, tool: &str, input: Value) -> CompletionResponse {
    CompletionResponse::new(
        format!("msg_{id}"),
        "mock-model",
        vec![ContentBlock::tool_use(id, tool, input)],
        StopReason::ToolUse,
        Usage::new(50, 10),
    )
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse::new(
        "msg_final",
        "mock-model",
        vec![ContentBlock::text(text)],
        StopReason::EndTurn,
        Usage::new(80, 30),
    )
}

struct Fixture {
    warehouse: Arc<MockWarehouse>,
    sheets: Arc<MockSheets>,
    mailer: Arc<MockMailer>,
    store: Arc<AliasStore>,
}

impl Fixture {
    fn new(warehouse: MockWarehouse) -> Self {
        Self {
            warehouse: Arc::new(warehouse),
            sheets: Arc::new(MockSheets::new()),
            mailer: Arc::new(MockMailer::new()),
            store: Arc::new(AliasStore::in_memory().unwrap()),
        }
    }

    fn agent(&self, backend: MockBackend) -> Agent {
        let registry = build_registry(
            self.warehouse.clone(),
            self.sheets.clone(),
            self.mailer.clone(),
            self.store.clone(),
            "owner@example.com",
        )
        .unwrap();
        Agent::new(Arc::new(backend), Arc::new(registry), AgentConfig::default())
    }
}

#[tokio::test]
async fn query_turn_renders_table_into_final_answer() {
    let fixture = Fixture::new(MockWarehouse::new().with_rows(vec![
        row(&[("REGION", json!("EMEA")), ("REVENUE", json!(1200))]),
        row(&[("REGION", json!("APAC")), ("REVENUE", json!(900))]),
    ]));
    let backend = MockBackend::new(vec![
        tool_use_response(
            "call_1",
            "run_query",
            json!({"sql": "SELECT region, revenue FROM sales"}),
        ),
        text_response("EMEA leads with 1200."),
    ]);
    let agent = fixture.agent(backend);

    let mut session = Session::new();
    let response = agent
        .turn(&mut session, "Which region has the most revenue?")
        .await
        .unwrap();

    assert_eq!(response.text, "EMEA leads with 1200.");
    assert_eq!(response.tool_calls.len(), 1);
    assert!(response.tool_results[0].content.contains("| EMEA | 1200 |"));
    assert!(response.tool_results[0].content.contains("*2 rows*"));
    assert!(!response.truncated);
}

#[tokio::test]
async fn query_then_replicate_builds_sheet_with_auto_alias() {
    let data = vec![row(&[("N", json!(1))]), row(&[("N", json!(2))])];
    let fixture = Fixture::new(
        MockWarehouse::new()
            .with_rows(data.clone())
            .with_rows(data),
    );
    let backend = MockBackend::new(vec![
        tool_use_response("call_1", "run_query", json!({"sql": "SELECT n FROM t"})),
        tool_use_response(
            "call_2",
            "replicate_last_query",
            json!({"title": "Full Export", "confirm": true}),
        ),
        text_response("Exported to the sheet 'Full Export'."),
    ]);
    let agent = fixture.agent(backend);

    let mut session = Session::new();
    let response = agent
        .turn(&mut session, "Run it, then export everything to a sheet")
        .await
        .unwrap();

    assert!(response.text.contains("Full Export"));
    let sheet_id = fixture.store.resolve("full_export").unwrap();
    assert_eq!(fixture.sheets.sheet(&sheet_id).unwrap().rows.len(), 2);
    // run_query once, replicate re-runs the same SQL once more
    assert_eq!(fixture.warehouse.query_count(), 2);
}

#[tokio::test]
async fn transient_warehouse_failure_is_retried_within_one_tool_call() {
    let fixture = Fixture::new(
        MockWarehouse::new()
            .with_error("HTTP 429 Too Many Requests")
            .with_rows(vec![row(&[("N", json!(1))])]),
    );
    let backend = MockBackend::new(vec![
        tool_use_response("call_1", "run_query", json!({"sql": "SELECT n"})),
        text_response("One row."),
    ]);
    let agent = fixture.agent(backend);

    let mut session = Session::new();
    let response = agent.turn(&mut session, "count things").await.unwrap();

    assert_eq!(response.text, "One row.");
    assert!(response.tool_results[0].success);
    // First attempt rate-limited, second succeeded, all inside one dispatch.
    assert_eq!(fixture.warehouse.query_count(), 2);
}

#[tokio::test]
async fn unconfirmed_email_fails_closed_and_sends_nothing() {
    let fixture = Fixture::new(MockWarehouse::new());
    let backend = MockBackend::new(vec![
        tool_use_response(
            "call_1",
            "send_campaign_email",
            json!({
                "subject": "Launch",
                "body": "Hello",
                "recipients": ["a@x.com", "b@x.com"]
            }),
        ),
        text_response("I need your confirmation before sending."),
    ]);
    let agent = fixture.agent(backend);

    let mut session = Session::new();
    let response = agent
        .turn(&mut session, "Email the launch note to the team")
        .await
        .unwrap();

    assert_eq!(fixture.mailer.sent_count(), 0);
    assert!(!response.tool_results[0].success);
    assert!(response.tool_results[0].content.contains("confirm=true"));
}

#[tokio::test]
async fn event_stream_covers_the_whole_turn_in_order() {
    let fixture = Fixture::new(MockWarehouse::new().with_rows(vec![row(&[("N", json!(1))])]));
    let backend = MockBackend::new(vec![
        tool_use_response("call_1", "run_query", json!({"sql": "SELECT n"})),
        text_response("done"),
    ]);
    let agent = fixture.agent(backend);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = Session::new();
    agent
        .turn_with_events(&mut session, "go", tx)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    // Contiguous sequence numbers from zero.
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64);
    }
    // Exactly one terminal event, and it is last.
    let terminals: Vec<_> = events
        .iter()
        .filter(|e| e.payload.is_terminal())
        .collect();
    assert_eq!(terminals.len(), 1);
    assert!(events.last().unwrap().payload.is_terminal());

    let phases: Vec<TurnPhase> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Phase { phase } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            TurnPhase::Thinking,
            TurnPhase::Acting,
            TurnPhase::Observing,
            TurnPhase::Thinking,
            TurnPhase::Responding,
        ]
    );
}

#[tokio::test]
async fn second_turn_sees_first_turn_history() {
    let fixture = Fixture::new(MockWarehouse::new());
    let backend = MockBackend::new(vec![
        text_response("The answer is 42."),
        text_response("As I said, 42."),
    ]);
    let agent = fixture.agent(backend);

    let mut session = Session::new();
    agent.turn(&mut session, "What is the answer?").await.unwrap();
    let response = agent.turn(&mut session, "Say it again").await.unwrap();

    assert_eq!(response.text, "As I said, 42.");
    assert_eq!(session.recent_turns(10).len(), 2);
}
