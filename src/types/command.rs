use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::SessionId;

/// Source label attached to knowledge when the caller does not supply one.
pub const DEFAULT_KNOWLEDGE_SOURCE: &str = "web_interface";

/// Which stored prompt an update applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// The prompt used in chat mode.
    Chat,
    /// The prompt used in generation mode.
    Generation,
    /// Whichever prompt the server currently uses.
    Current,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptKind::Chat => write!(f, "chat"),
            PromptKind::Generation => write!(f, "generation"),
            PromptKind::Current => write!(f, "current"),
        }
    }
}

/// A fire-and-forget command sent to one of the service's command endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ask a question; the answer arrives later on the event channel.
    Ask {
        /// The question text.
        question: String,
        /// The session the answer will be correlated with.
        session_id: SessionId,
    },
    /// Add a document to the knowledge base.
    AddKnowledge {
        /// The document text.
        content: String,
        /// Where the document came from.
        source: String,
    },
    /// Switch the generation model.
    SwitchModel {
        /// The model to switch to.
        model_name: String,
    },
    /// Switch the embedding model.
    SwitchEmbeddingModel {
        /// The model to switch to.
        model_name: String,
    },
    /// Download a model; completion arrives later on the event channel.
    PullModel {
        /// The model to download.
        model_name: String,
    },
    /// Replace one of the stored prompts.
    UpdatePrompt {
        /// Which prompt to replace.
        kind: PromptKind,
        /// The new prompt text.
        prompt: String,
    },
    /// Turn chat mode on or off.
    ToggleChatMode {
        /// The requested value.
        use_chat_mode: bool,
    },
    /// Turn the answer cache on or off.
    ToggleCache {
        /// The requested value.
        use_cache: bool,
    },
    /// Turn speech output on or off.
    ToggleSpeech {
        /// The requested value.
        speech_enabled: bool,
    },
    /// Restore both prompts to their defaults.
    ResetPrompts,
    /// Drop the server's chat history.
    ClearChatHistory,
    /// Drop the model's answer cache.
    ClearCache,
    /// Search the knowledge base.
    SearchKnowledge {
        /// The search query.
        query: String,
    },
}

/// The kind of a [`Command`], without its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// See [`Command::Ask`].
    Ask,
    /// See [`Command::AddKnowledge`].
    AddKnowledge,
    /// See [`Command::SwitchModel`].
    SwitchModel,
    /// See [`Command::SwitchEmbeddingModel`].
    SwitchEmbeddingModel,
    /// See [`Command::PullModel`].
    PullModel,
    /// See [`Command::UpdatePrompt`].
    UpdatePrompt,
    /// See [`Command::ToggleChatMode`].
    ToggleChatMode,
    /// See [`Command::ToggleCache`].
    ToggleCache,
    /// See [`Command::ToggleSpeech`].
    ToggleSpeech,
    /// See [`Command::ResetPrompts`].
    ResetPrompts,
    /// See [`Command::ClearChatHistory`].
    ClearChatHistory,
    /// See [`Command::ClearCache`].
    ClearCache,
    /// See [`Command::SearchKnowledge`].
    SearchKnowledge,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Ask => "ask",
            CommandKind::AddKnowledge => "add_knowledge",
            CommandKind::SwitchModel => "switch_model",
            CommandKind::SwitchEmbeddingModel => "switch_embedding_model",
            CommandKind::PullModel => "pull_model",
            CommandKind::UpdatePrompt => "update_prompt",
            CommandKind::ToggleChatMode => "toggle_chat_mode",
            CommandKind::ToggleCache => "toggle_cache",
            CommandKind::ToggleSpeech => "toggle_speech",
            CommandKind::ResetPrompts => "reset_prompts",
            CommandKind::ClearChatHistory => "clear_chat_history",
            CommandKind::ClearCache => "clear_cache",
            CommandKind::SearchKnowledge => "search_knowledge",
        };
        f.write_str(name)
    }
}

impl Command {
    /// Returns the kind of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Ask { .. } => CommandKind::Ask,
            Command::AddKnowledge { .. } => CommandKind::AddKnowledge,
            Command::SwitchModel { .. } => CommandKind::SwitchModel,
            Command::SwitchEmbeddingModel { .. } => CommandKind::SwitchEmbeddingModel,
            Command::PullModel { .. } => CommandKind::PullModel,
            Command::UpdatePrompt { .. } => CommandKind::UpdatePrompt,
            Command::ToggleChatMode { .. } => CommandKind::ToggleChatMode,
            Command::ToggleCache { .. } => CommandKind::ToggleCache,
            Command::ToggleSpeech { .. } => CommandKind::ToggleSpeech,
            Command::ResetPrompts => CommandKind::ResetPrompts,
            Command::ClearChatHistory => CommandKind::ClearChatHistory,
            Command::ClearCache => CommandKind::ClearCache,
            Command::SearchKnowledge { .. } => CommandKind::SearchKnowledge,
        }
    }

    /// The endpoint path, relative to the server root.
    pub fn path(&self) -> String {
        format!("api/{}", self.kind())
    }

    /// The JSON body posted to the endpoint.
    pub fn body(&self) -> Value {
        match self {
            Command::Ask {
                question,
                session_id,
            } => json!({ "question": question, "session_id": session_id }),
            Command::AddKnowledge { content, source } => {
                json!({ "content": content, "source": source })
            }
            Command::SwitchModel { model_name }
            | Command::SwitchEmbeddingModel { model_name }
            | Command::PullModel { model_name } => json!({ "model_name": model_name }),
            Command::UpdatePrompt { kind, prompt } => json!({ "type": kind, "prompt": prompt }),
            Command::ToggleChatMode { use_chat_mode } => json!({ "use_chat_mode": use_chat_mode }),
            Command::ToggleCache { use_cache } => json!({ "use_cache": use_cache }),
            Command::ToggleSpeech { speech_enabled } => {
                json!({ "speech_enabled": speech_enabled })
            }
            Command::ResetPrompts | Command::ClearChatHistory | Command::ClearCache => json!({}),
            Command::SearchKnowledge { query } => json!({ "query": query }),
        }
    }

    /// Rejects commands the server would refuse for missing input.
    pub fn validate(&self) -> Result<()> {
        let (value, what, param) = match self {
            Command::Ask { question, .. } => (question, "Question", "question"),
            Command::AddKnowledge { content, .. } => (content, "Content", "content"),
            Command::SwitchModel { model_name }
            | Command::SwitchEmbeddingModel { model_name }
            | Command::PullModel { model_name } => (model_name, "Model name", "model_name"),
            Command::UpdatePrompt { prompt, .. } => (prompt, "Prompt", "prompt"),
            Command::SearchKnowledge { query } => (query, "Query", "query"),
            _ => return Ok(()),
        };
        require(value, what, param)
    }
}

/// Fails with a validation error when `value` is blank.
pub(crate) fn require(value: &str, what: &str, param: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(
            format!("{what} cannot be empty"),
            Some(param.to_string()),
        ));
    }
    Ok(())
}

/// The status field of a command acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AckStatus {
    /// The question was accepted; the answer will be streamed.
    Processing,
    /// The model pull was accepted; completion will be streamed.
    Started,
    /// The command completed.
    Success,
    /// The server refused or failed the command.
    Error,
    /// A status this client does not know.
    Other(String),
}

impl From<String> for AckStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "processing" => AckStatus::Processing,
            "started" => AckStatus::Started,
            "success" => AckStatus::Success,
            "error" => AckStatus::Error,
            _ => AckStatus::Other(status),
        }
    }
}

impl From<AckStatus> for String {
    fn from(status: AckStatus) -> Self {
        match status {
            AckStatus::Processing => "processing".to_string(),
            AckStatus::Started => "started".to_string(),
            AckStatus::Success => "success".to_string(),
            AckStatus::Error => "error".to_string(),
            AckStatus::Other(status) => status,
        }
    }
}

/// The synchronous acknowledgement returned by a command endpoint.
///
/// Only `status` and `message` matter to the client; other fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Whether the command was accepted.
    pub status: AckStatus,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandAck {
    /// An acknowledgement with the given status and no message.
    pub fn new(status: AckStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    /// Attaches a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
