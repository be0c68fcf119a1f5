//! Vidlens application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Build the HTTP backend client and the conversation orchestrator
//! 3. Report background analysis completions as they arrive
//! 4. Run the interactive chat loop on stdin

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use vidlens_chat::format::{self, label};
use vidlens_chat::{
    ChatBackend, ConversationOrchestrator, IngestOutcome, Message, TaskEvent, Timeouts,
};
use vidlens_client::HttpBackend;
use vidlens_core::config::VidlensConfig;

use cli::CliArgs;
use repl::Command;

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.created_at.time_of_day(),
        message.role,
        message.content
    );
}

/// Print task settlements until the orchestrator goes away.
async fn report_task_events(orchestrator: Arc<ConversationOrchestrator>) {
    let mut events = orchestrator.subscribe();
    drop(orchestrator);
    loop {
        match events.recv().await {
            Ok(TaskEvent::Completed { agent_type, .. }) => {
                println!("✅ {} is ready. Ask for it to see the result.", label(agent_type));
            }
            Ok(TaskEvent::Failed {
                agent_type, error, ..
            }) => {
                println!("❌ {} failed: {}", label(agent_type), error);
            }
            Ok(TaskEvent::Discarded { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Task event listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Index the active transcript in the background and announce the outcome.
fn spawn_ingestion(orchestrator: &Arc<ConversationOrchestrator>) {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        match orchestrator.ingest_active_transcript().await {
            IngestOutcome::Indexed => println!("{}", format::INGESTED_NOTICE),
            IngestOutcome::Failed => println!("{}", format::INGEST_FAILED_NOTICE),
            IngestOutcome::Suppressed => {
                println!("Indexing is already running or finished for this transcript.")
            }
            IngestOutcome::NoTranscript => println!("No active transcript. Use /transcript <id>."),
            IngestOutcome::Stale => {}
        }
    });
}

fn print_status(orchestrator: &ConversationOrchestrator) {
    match orchestrator.active_transcript() {
        Some(id) => {
            let ingestion = orchestrator
                .ingestion_state()
                .map(|s| s.to_string())
                .unwrap_or_default();
            println!("transcript: {} (ingestion: {})", id, ingestion);
        }
        None => println!("transcript: none"),
    }
    let missing: Vec<&str> = orchestrator
        .cache()
        .missing()
        .into_iter()
        .map(label)
        .collect();
    println!(
        "cached analyses: {}, missing: {}",
        orchestrator.cache().len(),
        if missing.is_empty() {
            "none".to_string()
        } else {
            missing.join(", ")
        }
    );
    println!("session: {}", orchestrator.session_id());
}

/// Execute one command. Returns false when the session should end.
async fn execute(orchestrator: &Arc<ConversationOrchestrator>, command: Command) -> bool {
    match command {
        Command::Say(text) => match orchestrator.handle_utterance(&text).await {
            Ok(reply) => print_message(&reply),
            Err(e) => println!("⚠️ {}", e),
        },
        Command::Transcript(id) => {
            if orchestrator.set_transcript(id.clone()) {
                println!("Active transcript: {}", id);
            }
            spawn_ingestion(orchestrator);
        }
        Command::Ingest => spawn_ingestion(orchestrator),
        Command::RunAll => match orchestrator.run_all() {
            Ok(_) => {
                if let Some(notice) = orchestrator.history().last() {
                    print_message(&notice);
                }
            }
            Err(e) => println!("⚠️ {}", e),
        },
        Command::Rerun(agent_type) => match orchestrator.rerun(agent_type) {
            Ok(true) => println!("{}", format::ReplyFormatter::default().processing(agent_type)),
            Ok(false) => println!("{} is already running.", label(agent_type)),
            Err(e) => println!("⚠️ {}", e),
        },
        Command::Clear => match orchestrator.clear().await {
            Ok(_) => {
                for message in orchestrator.history().all() {
                    print_message(&message);
                }
            }
            Err(e) => println!("⚠️ {}", e),
        },
        Command::History => {
            for message in orchestrator.history().all() {
                print_message(&message);
            }
        }
        Command::Export(path) => {
            let written = orchestrator
                .history()
                .to_json()
                .and_then(|json| std::fs::write(&path, json).map_err(Into::into));
            match written {
                Ok(()) => println!("Conversation written to {}", path.display()),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Export failed");
                    println!("⚠️ Export failed: {}", e);
                }
            }
        }
        Command::Status => print_status(orchestrator),
        Command::Help => println!("{}", repl::HELP),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = VidlensConfig::load_or_default(&config_file);
    config.backend.base_url = args.resolve_backend_url(&config.backend.base_url);
    config.chat.include_history = args.resolve_include_history(config.chat.include_history);

    // Tracing. RUST_LOG takes precedence over the resolved level.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Vidlens v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        backend = %config.backend.base_url,
        "Configuration resolved"
    );

    // Backend + orchestrator.
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(&config.backend)?);
    let orchestrator = Arc::new(
        ConversationOrchestrator::new(backend, config.chat.clone())
            .with_timeouts(Timeouts::from(&config.backend)),
    );

    tokio::spawn(report_task_events(Arc::clone(&orchestrator)));

    for message in orchestrator.history().all() {
        print_message(&message);
    }

    if let Some(id) = args.transcript {
        orchestrator.set_transcript(id.as_str());
        println!("Active transcript: {}", id);
        spawn_ingestion(&orchestrator);
    }

    // Chat loop.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match repl::parse(&line) {
            Ok(Some(command)) => {
                if !execute(&orchestrator, command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("⚠️ {}", e),
        }
    }

    tracing::info!("Vidlens shutting down");
    Ok(())
}
