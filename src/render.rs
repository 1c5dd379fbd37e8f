//! Presentation of client state.
//!
//! The client never draws anything itself.  Everything a user should see goes through a
//! [`StatusSink`], invoked with explicit data.  [`TerminalSink`] is the plain-text
//! implementation used by `assistant-chat`.

use std::io::{self, Write};

use crate::connection::ConnectionState;
use crate::system::SystemState;
use crate::types::{HistoryEntry, Message, ModelList, PromptSet, Role, ServerStatus};

/// ANSI escape code for dim text (used for placeholders and timestamps).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for informational notices).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for system messages and pull progress).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for assistant answers and the connected status).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// How loudly a notice should be shown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Confirmation of a completed action.
    Info,
    /// A failure the server reported.
    Error,
}

/// An alert-style message outside the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

impl Notice {
    /// An informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// An error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Receives everything the client wants shown.
///
/// Only the connection status and pull progress are mandatory; the rest default to no-ops.
pub trait StatusSink: Send {
    /// The event channel is open.
    fn set_connected(&mut self);

    /// The event channel failed, or the server could not be reached.
    fn set_error(&mut self);

    /// Shows or (with `None`) clears model pull progress.
    fn set_pull_progress(&mut self, progress: Option<&str>);

    /// An alert-style notice.
    fn notify(&mut self, notice: &Notice) {
        _ = notice;
    }

    /// A message was appended to the log.
    fn message_added(&mut self, message: &Message) {
        _ = message;
    }

    /// A placeholder was taken out of the log.
    fn placeholder_removed(&mut self, message: &Message) {
        _ = message;
    }

    /// The log was emptied.
    fn log_cleared(&mut self) {}

    /// The server-side history was reloaded.  `requested` is true when the user asked to see it.
    fn history_loaded(&mut self, entries: &[HistoryEntry], requested: bool) {
        _ = entries;
        _ = requested;
    }

    /// Fresh system information arrived.
    fn system_info(&mut self, state: &SystemState) {
        _ = state;
    }

    /// A model listing arrived.  `embedding` distinguishes the two listings.
    fn models_listed(&mut self, models: &ModelList, embedding: bool) {
        _ = models;
        _ = embedding;
    }

    /// The prompt texts arrived.
    fn prompts_loaded(&mut self, prompts: &PromptSet) {
        _ = prompts;
    }

    /// The server's health report arrived.
    fn server_status(&mut self, status: &ServerStatus) {
        _ = status;
    }
}

/// Plain-text sink with optional ANSI styling.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
    use_color: bool,
    status: Option<ConnectionState>,
    pull_progress: Option<String>,
}

impl TerminalSink {
    /// Creates a sink writing to stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a sink writing to stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a sink writing to `out`.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            status: None,
            pull_progress: None,
        }
    }

    fn line(&mut self, color: &str, text: &str) {
        let result = if self.use_color && !color.is_empty() {
            writeln!(self.out, "{color}{text}{ANSI_RESET}")
        } else {
            writeln!(self.out, "{text}")
        };
        if let Err(err) = result.and_then(|_| self.out.flush()) {
            tracing::debug!(error = %err, "terminal write failed");
        }
    }

    fn set_status(&mut self, status: ConnectionState, color: &str, text: &str) {
        if self.status == Some(status) {
            return;
        }
        self.status = Some(status);
        self.line(color, text);
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for TerminalSink {
    fn set_connected(&mut self) {
        self.set_status(ConnectionState::Open, ANSI_GREEN, "[status: connected]");
    }

    fn set_error(&mut self) {
        self.set_status(ConnectionState::Reconnecting, ANSI_RED, "[status: connection error]");
    }

    fn set_pull_progress(&mut self, progress: Option<&str>) {
        match progress {
            Some(text) => {
                self.pull_progress = Some(text.to_string());
                self.line(ANSI_YELLOW, &format!("[pull] {text}"));
            }
            None => self.pull_progress = None,
        }
    }

    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => self.line(ANSI_CYAN, &notice.text),
            NoticeLevel::Error => self.line(ANSI_RED, &format!("Error: {}", notice.text)),
        }
    }

    fn message_added(&mut self, message: &Message) {
        match message.role {
            // The user typed it; echoing it back is noise.
            Role::User => {}
            Role::Assistant if message.is_placeholder() => {
                self.line(ANSI_DIM, &format!("[{}]", message.content));
            }
            Role::Assistant => {
                let text = format!("assistant: {}", message.content);
                self.line(ANSI_GREEN, &text);
            }
            Role::System => {
                let text = format!("[system] {}", message.content);
                self.line(ANSI_YELLOW, &text);
            }
        }
    }

    fn log_cleared(&mut self) {
        self.line(ANSI_DIM, "[chat cleared]");
    }

    fn history_loaded(&mut self, entries: &[HistoryEntry], requested: bool) {
        if !requested {
            return;
        }
        if entries.is_empty() {
            self.line(ANSI_DIM, "[history is empty]");
            return;
        }
        for entry in entries {
            let when = entry
                .metadata
                .timestamp
                .map(|ts| format!("{:02}:{:02}:{:02} ", ts.hour(), ts.minute(), ts.second()))
                .unwrap_or_default();
            let text = format!("{when}{}: {}", entry.role, entry.content);
            self.line("", &text);
        }
    }

    fn system_info(&mut self, state: &SystemState) {
        let on_off = |v: bool| if v { "on" } else { "off" };
        let text = format!(
            "[model: {} | embedding: {} | documents: {} | memory: {} | chat mode: {} | cache: {} | speech: {}]",
            state.llm_model.as_deref().unwrap_or("?"),
            state.embedding_model.as_deref().unwrap_or("?"),
            state
                .total_documents
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            state.memory_usage.as_deref().unwrap_or("?"),
            on_off(state.use_chat_mode),
            on_off(state.use_cache),
            on_off(state.speech_enabled),
        );
        self.line(ANSI_DIM, &text);
    }

    fn models_listed(&mut self, models: &ModelList, embedding: bool) {
        let heading = if embedding { "Embedding models:" } else { "Models:" };
        self.line(ANSI_CYAN, heading);
        for model in &models.models {
            let marker = if models.current_model.as_deref() == Some(model.as_str()) {
                "*"
            } else {
                " "
            };
            self.line("", &format!("  {marker} {model}"));
        }
    }

    fn prompts_loaded(&mut self, prompts: &PromptSet) {
        let mode = match prompts.use_chat_mode {
            Some(true) => "chat",
            Some(false) => "generation",
            None => "unknown",
        };
        self.line(ANSI_CYAN, &format!("Mode: {mode}"));
        if let Some(prompt) = &prompts.chat_prompt {
            self.line("", &format!("chat prompt:\n{prompt}"));
        }
        if let Some(prompt) = &prompts.generation_prompt {
            self.line("", &format!("generation prompt:\n{prompt}"));
        }
    }

    fn server_status(&mut self, status: &ServerStatus) {
        let version = status.version.as_deref().unwrap_or("unknown");
        self.line(ANSI_CYAN, &format!("Server {} (version {version})", status.status));
    }
}
