//! turnloop - Console Chat Entry Point
//!
//! A minimal REPL over the dispatch loop: one thread per session, approval
//! and human-input prompts answered on stdin.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnloop::agent::{build_system_prompt, Dispatcher, TurnOutcome};
use turnloop::checkpoint::{CheckpointStore, InMemorySaver, InterruptReason, SqliteSaver};
use turnloop::config::Config;
use turnloop::llm::OpenRouterClient;
use turnloop::tools::{HumanAssistance, ToolRegistry, VerifyRecord, WebSearch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnloop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.default_model);

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(WebSearch::new(config.tavily_api_key.clone())));
    tools.register(Arc::new(HumanAssistance));
    tools.register(Arc::new(VerifyRecord));

    let store: Arc<dyn CheckpointStore> = match &config.checkpoint_db {
        Some(path) => {
            info!("Using sqlite checkpoints at {}", path.display());
            Arc::new(SqliteSaver::open(path).map_err(|e| anyhow::anyhow!(e))?)
        }
        None => Arc::new(InMemorySaver::new()),
    };

    let llm = Arc::new(OpenRouterClient::new(config.api_key.clone()));
    let system_prompt = build_system_prompt(&tools);
    let dispatcher =
        Dispatcher::new(&config, llm, tools, store).with_system_prompt(system_prompt);

    let thread_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "default".to_string());
    println!("Chatting on thread '{}'. Type 'quit' to leave.", thread_id);

    let stdin = std::io::stdin();
    loop {
        print!("User: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        let mut outcome = match dispatcher.run_turn(&thread_id, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        // A turn may suspend more than once before it completes.
        loop {
            match outcome {
                TurnOutcome::Reply(reply) => {
                    println!("Assistant: {}", reply.content);
                    break;
                }
                TurnOutcome::Interrupted(interrupt) => {
                    let answer = match interrupt.reason {
                        InterruptReason::Approval => {
                            println!(
                                "Approval required: {}",
                                serde_json::to_string_pretty(&interrupt.payload)?
                            );
                            print!("Approve? [y/N] ");
                            std::io::stdout().flush()?;
                            let mut verdict = String::new();
                            stdin.lock().read_line(&mut verdict)?;
                            let approved = verdict.trim().to_lowercase().starts_with('y');
                            json!({ "approved": approved })
                        }
                        InterruptReason::HumanInput => {
                            println!(
                                "Human input required: {}",
                                serde_json::to_string_pretty(&interrupt.payload)?
                            );
                            print!("> ");
                            std::io::stdout().flush()?;
                            let mut response = String::new();
                            stdin.lock().read_line(&mut response)?;
                            json!({ "data": response.trim() })
                        }
                    };
                    outcome = match dispatcher.resume_turn(&thread_id, answer).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            break;
                        }
                    };
                }
            }
        }
    }

    Ok(())
}
