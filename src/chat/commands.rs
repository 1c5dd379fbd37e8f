//! Slash command parsing for the chat front end.
//!
//! Input starting with `/` controls the client; anything else is a question.

use crate::types::PromptKind;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Add a document to the knowledge base.
    Knowledge(String),

    /// Set or clear the source label used by `/knowledge`.
    /// `None` restores the configured default.
    Source(Option<String>),

    /// Switch the generation model.
    Model(String),

    /// Switch the embedding model.
    Embedding(String),

    /// Download a model.
    Pull(String),

    /// Replace one of the prompts.
    Prompt(PromptKind, String),

    /// Show the prompt texts.
    ShowPrompts,

    /// Restore both prompts to their defaults.
    ResetPrompts,

    /// Flip chat mode.
    ToggleChatMode,

    /// Flip the answer cache.
    ToggleCache,

    /// Flip speech output.
    ToggleSpeech,

    /// Clear the chat history on the server and on screen.
    ClearHistory,

    /// Clear the model's answer cache.
    ClearCache,

    /// Search the knowledge base.
    Search(String),

    /// Show system statistics.
    Stats,

    /// List the available models.
    Models,

    /// Show the server-side chat history.
    History,

    /// Check the server's health.
    Status,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be asked as a question.
///
/// # Examples
///
/// ```
/// # use assistant_client::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/pull llama3").is_some());
/// assert!(parse_command("What is RAG?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "knowledge" | "add" => required(
            argument,
            "/knowledge requires some text",
            ChatCommand::Knowledge,
        ),
        "source" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::Source(None),
            Some(arg) => ChatCommand::Source(Some(arg.to_string())),
            None => ChatCommand::Source(None),
        },
        "model" => required(argument, "/model requires a model name", ChatCommand::Model),
        "embedding" => required(
            argument,
            "/embedding requires a model name",
            ChatCommand::Embedding,
        ),
        "pull" => required(argument, "/pull requires a model name", ChatCommand::Pull),
        "prompt" => parse_prompt_command(argument),
        "reset-prompts" => ChatCommand::ResetPrompts,
        "chat-mode" => ChatCommand::ToggleChatMode,
        "cache" => ChatCommand::ToggleCache,
        "speech" => ChatCommand::ToggleSpeech,
        "clear-history" => ChatCommand::ClearHistory,
        "clear-cache" => ChatCommand::ClearCache,
        "search" => required(argument, "/search requires a query", ChatCommand::Search),
        "stats" => ChatCommand::Stats,
        "models" => ChatCommand::Models,
        "history" => ChatCommand::History,
        "status" => ChatCommand::Status,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn required<F>(argument: Option<&str>, missing: &str, constructor: F) -> ChatCommand
where
    F: Fn(String) -> ChatCommand,
{
    match argument {
        Some(arg) => constructor(arg.to_string()),
        None => ChatCommand::Invalid(missing.to_string()),
    }
}

fn parse_prompt_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::ShowPrompts;
    };

    let mut parts = arg.splitn(2, char::is_whitespace);
    let kind = match parts.next().map(str::to_lowercase).as_deref() {
        Some("chat") => PromptKind::Chat,
        Some("generation") => PromptKind::Generation,
        Some("current") => PromptKind::Current,
        _ => {
            return ChatCommand::Invalid(
                "/prompt expects 'chat', 'generation', or 'current' followed by the text"
                    .to_string(),
            );
        }
    };
    match parts.next().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(text) => ChatCommand::Prompt(kind, text.to_string()),
        None => ChatCommand::Invalid(format!("/prompt {kind} requires the prompt text")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  <text>                      Ask a question
  /knowledge <text>           Add text to the knowledge base
  /source [name]              Set the source label for /knowledge (no argument resets it)
  /model <name>               Switch the generation model
  /embedding <name>           Switch the embedding model
  /pull <name>                Download a model
  /prompt                     Show the current prompts
  /prompt chat <text>         Replace the chat prompt
  /prompt generation <text>   Replace the generation prompt
  /prompt current <text>      Replace the prompt of the current mode
  /reset-prompts              Restore the default prompts
  /chat-mode                  Toggle between chat and generation mode
  /cache                      Toggle the answer cache
  /speech                     Toggle speech output
  /clear-history              Clear the chat history
  /clear-cache                Clear the answer cache
  /search <query>             Search the knowledge base (results appear on the server)
  /stats                      Show system statistics
  /models                     List available models
  /history                    Show the chat history
  /status                     Check the server status
  /help                       Show this help message
  /quit                       Exit the chat"#
}
