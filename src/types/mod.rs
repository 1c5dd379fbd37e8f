// Public modules
pub mod command;
pub mod info;
pub mod message;
pub mod session_id;
pub mod stream_event;

// Re-exports
pub use command::{
    AckStatus, Command, CommandAck, CommandKind, DEFAULT_KNOWLEDGE_SOURCE, PromptKind,
};
pub use info::{
    HistoryEntry, HistoryMetadata, HistoryResponse, ModelList, PromptInfo, PromptSet,
    ServerStatus, Statistics,
};
pub use message::{Message, Role};
pub use session_id::SessionId;
pub use stream_event::StreamEvent;
