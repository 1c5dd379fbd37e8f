//! Terminal front end for the assistant client.
//!
//! - [`config`]: CLI argument parsing
//! - [`commands`]: Slash command parsing
//!
//! Rendering lives in [`crate::render`]; the `assistant-chat` binary wires these to an
//! [`AssistantClient`](crate::AssistantClient).

mod commands;
mod config;

pub use crate::render::{Notice, NoticeLevel, StatusSink, TerminalSink};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::ClientArgs;
