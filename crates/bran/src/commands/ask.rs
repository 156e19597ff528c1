//! Ask command - one-shot question to the agent.
//!
//! Wires the Anthropic backend and the full tool registry, runs a single
//! turn, and prints progress events as they arrive. External clients are the
//! in-memory fixtures shipped with `bran-tools`; production deployments
//! implement the client traits against their own warehouse and services.

use anyhow::Result;
use clap::Args;
use console::Style;
use std::sync::Arc;

use bran_agent::{Agent, AgentConfig, EventPayload, Session};
use bran_llm::AnthropicBackend;
use bran_tools::{MockMailer, MockSheets, MockWarehouse, build_registry};

use super::Context;

const SYSTEM_PROMPT: &str = "You are Bran, a business-intelligence assistant. \
You answer questions about company data by querying the warehouse, and can \
export results to spreadsheets or send campaign email when asked. Present \
query results exactly as the tools return them, including row-count footers. \
Never mention internal tools whose names start with an underscore. Before any \
action that sends email or modifies a spreadsheet, describe what will happen \
and ask for confirmation.";

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true)]
    pub prompt: String,

    /// Model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum agent loop iterations for the turn
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();

    let backend = Arc::new(AnthropicBackend::from_env()?);
    let store = super::open_store()?;
    let registry = build_registry(
        Arc::new(MockWarehouse::new()),
        Arc::new(MockSheets::new()),
        Arc::new(MockMailer::new()),
        store,
        bran_config::Config::discover()?
            .sender_address()
            .unwrap_or("bran@localhost")
            .to_string(),
    )?;

    let mut config = AgentConfig::default().with_system_prompt(SYSTEM_PROMPT);
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }

    if ctx.verbose {
        println!("{}", dim.apply_to(format!("Model: {}", config.model)));
        println!();
    }

    let agent = Agent::new(backend, Arc::new(registry), config);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let prompt = args.prompt.clone();
    let turn = tokio::spawn(async move {
        let mut session = Session::new();
        agent.turn_with_events(&mut session, &prompt, tx).await
    });

    while let Some(event) = rx.recv().await {
        match event.payload {
            EventPayload::Phase { phase } => {
                if ctx.verbose {
                    println!("{}", dim.apply_to(format!("[{}]", phase)));
                }
            }
            EventPayload::ToolStart { name, internal, .. } => {
                // Internal tool names never reach the user.
                let label = if internal {
                    "[Looking up metadata]".to_string()
                } else {
                    format!("[Running: {}]", name)
                };
                println!("{}", dim.apply_to(label));
            }
            EventPayload::ToolEnd { is_error, .. } => {
                let status = if is_error { "failed" } else { "done" };
                println!("{}", dim.apply_to(format!("[{}]", status)));
            }
            EventPayload::Done { response } => {
                println!("{}", response.text);
                if ctx.verbose {
                    println!(
                        "{}",
                        dim.apply_to(format!(
                            "({} iterations, {} in / {} out tokens)",
                            response.iterations,
                            response.usage.input_tokens,
                            response.usage.output_tokens
                        ))
                    );
                }
            }
            EventPayload::Error { failure } => {
                let red = Style::new().red();
                eprintln!("{} {}", red.apply_to("Error:"), failure.message);
            }
        }
    }

    turn.await??;
    Ok(())
}
