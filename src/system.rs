//! Read-only queries and the explicit system state they feed.

use async_trait::async_trait;

use crate::Result;
use crate::types::{
    Command, HistoryEntry, ModelList, PromptKind, PromptSet, ServerStatus, Statistics,
};

/// The service's read-only endpoints.
#[async_trait]
pub trait QueryEndpoint: Send + Sync {
    /// `GET /api/statistics`
    async fn statistics(&self) -> Result<Statistics>;
    /// `GET /api/models`
    async fn models(&self) -> Result<ModelList>;
    /// `GET /api/embedding_models`
    async fn embedding_models(&self) -> Result<ModelList>;
    /// `GET /api/prompts`
    async fn prompts(&self) -> Result<PromptSet>;
    /// `GET /api/chat_history`
    async fn chat_history(&self) -> Result<Vec<HistoryEntry>>;
    /// `GET /api/status`
    async fn status(&self) -> Result<ServerStatus>;
}

/// Mode flags and model names as last reported by the server.
///
/// Toggle commands send the negation of these fields, so they must only ever be written from
/// server responses.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    /// Chat mode (as opposed to one-shot generation).
    pub use_chat_mode: bool,
    /// Answer cache.
    pub use_cache: bool,
    /// Speech output.
    pub speech_enabled: bool,
    /// The generation model.
    pub llm_model: Option<String>,
    /// The embedding model.
    pub embedding_model: Option<String>,
    /// Documents in the knowledge base.
    pub total_documents: Option<u64>,
    /// Vector store memory usage, preformatted.
    pub memory_usage: Option<String>,
    /// Messages in the server-side history.
    pub chat_history_size: Option<i64>,
    /// Generation models available on the server.
    pub available_models: Vec<String>,
    /// Embedding models available on the server.
    pub available_embedding_models: Vec<String>,
    /// The chat prompt text.
    pub chat_prompt: Option<String>,
    /// The generation prompt text.
    pub generation_prompt: Option<String>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            use_chat_mode: true,
            use_cache: true,
            speech_enabled: false,
            llm_model: None,
            embedding_model: None,
            total_documents: None,
            memory_usage: None,
            chat_history_size: None,
            available_models: Vec::new(),
            available_embedding_models: Vec::new(),
            chat_prompt: None,
            generation_prompt: None,
        }
    }
}

impl SystemState {
    /// Folds a statistics response in.  Absent fields leave the current value alone.
    pub fn apply_statistics(&mut self, stats: &Statistics) {
        if let Some(v) = stats.use_chat_mode {
            self.use_chat_mode = v;
        }
        if let Some(v) = stats.use_cache {
            self.use_cache = v;
        }
        if let Some(v) = stats.speech_enabled {
            self.speech_enabled = v;
        }
        if stats.llm_model.is_some() {
            self.llm_model.clone_from(&stats.llm_model);
        }
        if stats.embedding_model.is_some() {
            self.embedding_model.clone_from(&stats.embedding_model);
        }
        if stats.total_documents.is_some() {
            self.total_documents = stats.total_documents;
        }
        if stats.memory_usage_percent.is_some() {
            self.memory_usage.clone_from(&stats.memory_usage_percent);
        }
        if stats.chat_history_size.is_some() {
            self.chat_history_size = stats.chat_history_size;
        }
    }

    /// Folds a generation model listing in.
    pub fn apply_models(&mut self, models: &ModelList) {
        self.available_models.clone_from(&models.models);
        if models.current_model.is_some() {
            self.llm_model.clone_from(&models.current_model);
        }
    }

    /// Folds an embedding model listing in.
    pub fn apply_embedding_models(&mut self, models: &ModelList) {
        self.available_embedding_models.clone_from(&models.models);
        if models.current_model.is_some() {
            self.embedding_model.clone_from(&models.current_model);
        }
    }

    /// Folds a prompt listing in.
    pub fn apply_prompts(&mut self, prompts: &PromptSet) {
        if let Some(v) = prompts.use_chat_mode {
            self.use_chat_mode = v;
        }
        if prompts.chat_prompt.is_some() {
            self.chat_prompt.clone_from(&prompts.chat_prompt);
        }
        if prompts.generation_prompt.is_some() {
            self.generation_prompt.clone_from(&prompts.generation_prompt);
        }
    }

    /// Records the value a successful toggle set.  The server's statistics do not always
    /// report these flags, so the accepted command is the authority until they do.
    pub fn apply_accepted(&mut self, command: &Command) {
        match command {
            Command::ToggleChatMode { use_chat_mode } => self.use_chat_mode = *use_chat_mode,
            Command::ToggleCache { use_cache } => self.use_cache = *use_cache,
            Command::ToggleSpeech { speech_enabled } => self.speech_enabled = *speech_enabled,
            _ => {}
        }
    }

    /// The prompt the server uses in its current mode.
    pub fn current_prompt_kind(&self) -> PromptKind {
        if self.use_chat_mode {
            PromptKind::Chat
        } else {
            PromptKind::Generation
        }
    }

    /// The text of the prompt the server uses in its current mode.
    pub fn current_prompt(&self) -> Option<&str> {
        match self.current_prompt_kind() {
            PromptKind::Chat => self.chat_prompt.as_deref(),
            _ => self.generation_prompt.as_deref(),
        }
    }
}
