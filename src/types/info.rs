use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Role;

/// Prompt lengths reported alongside the statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    /// Length of the chat prompt, in characters.
    #[serde(default)]
    pub chat_prompt_length: u64,
    /// Length of the generation prompt, in characters.
    #[serde(default)]
    pub generation_prompt_length: u64,
}

/// Response of `GET /api/statistics`.
///
/// Every field is optional; servers report different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Documents in the knowledge base.
    #[serde(default)]
    pub total_documents: Option<u64>,
    /// Vector store memory usage, preformatted (e.g. `"12.50%"`).
    #[serde(default)]
    pub memory_usage_percent: Option<String>,
    /// The generation model.
    #[serde(default)]
    pub llm_model: Option<String>,
    /// The embedding model.
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Whether chat mode is on.
    #[serde(default)]
    pub use_chat_mode: Option<bool>,
    /// Whether the answer cache is on.
    #[serde(default)]
    pub use_cache: Option<bool>,
    /// Messages in the server-side history, excluding the system prompt.
    #[serde(default)]
    pub chat_history_size: Option<i64>,
    /// Whether speech output is on.
    #[serde(default)]
    pub speech_enabled: Option<bool>,
    /// Prompt lengths.
    #[serde(default)]
    pub prompt_info: Option<PromptInfo>,
}

/// Response of `GET /api/models` and `GET /api/embedding_models`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Models available on the server.
    #[serde(default)]
    pub models: Vec<String>,
    /// The model in use.
    #[serde(default)]
    pub current_model: Option<String>,
}

/// Response of `GET /api/prompts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    /// Whether chat mode is on.
    #[serde(default)]
    pub use_chat_mode: Option<bool>,
    /// The chat prompt.
    #[serde(default)]
    pub chat_prompt: Option<String>,
    /// The generation prompt.
    #[serde(default)]
    pub generation_prompt: Option<String>,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// `"running"` when the server is healthy.
    pub status: String,
    /// Server version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Server time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Metadata attached to a history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryMetadata {
    /// When the server recorded the entry.
    #[serde(default, with = "crate::utils::time::millis")]
    pub timestamp: Option<OffsetDateTime>,
}

/// One entry of the server-side chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who produced the entry.
    pub role: Role,
    /// The entry text.
    pub content: String,
    /// Server-side metadata.
    #[serde(default)]
    pub metadata: HistoryMetadata,
}

/// Response of `GET /api/chat_history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// The entries, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}
