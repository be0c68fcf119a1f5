//! Line commands of the interactive chat session.
//!
//! Lines starting with `/` are commands; anything else is sent to the
//! orchestrator as an utterance.

use std::path::PathBuf;

use vidlens_chat::AgentType;
use vidlens_core::types::TranscriptId;

pub const HELP: &str = "\
Commands:
  /transcript <id>   activate a transcript and index it for questions
  /ingest            retry indexing the active transcript
  /run-all           run every analysis that is not cached yet
  /rerun <task>      run one analysis again (summary, highlights, violations)
  /clear             start a new session with an empty history
  /history           print the conversation
  /export <path>     write the conversation as JSON
  /status            show transcript, ingestion and cache state
  /help              show this help
  /quit              exit
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Transcript(TranscriptId),
    Ingest,
    RunAll,
    Rerun(AgentType),
    Clear,
    History,
    Export(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("unknown analysis task: {0}")]
    InvalidTask(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "transcript" => Command::Transcript(TranscriptId::new(required(arg, "transcript")?)),
        "ingest" => Command::Ingest,
        "run-all" => Command::RunAll,
        "rerun" => {
            let task = required(arg, "rerun")?;
            Command::Rerun(
                task.parse()
                    .map_err(|_| CommandError::InvalidTask(task.to_string()))?,
            )
        }
        "clear" => Command::Clear,
        "history" => Command::History,
        "export" => Command::Export(PathBuf::from(required(arg, "export")?)),
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(arg: &'a str, command: &'static str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(arg)
    }
}
