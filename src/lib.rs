//! Streaming session client for a retrieval-augmented assistant service.
//!
//! Questions are posted as commands; answers arrive later on a long-lived server-sent event
//! channel.  [`AssistantClient`] ties the two together: it keeps the conversation log, drops
//! answers that belong to a superseded question, and keeps the event channel open across
//! server restarts.

// Public modules
pub mod assistant;
pub mod chat;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod message_log;
pub mod observability;
pub mod render;
pub mod router;
pub mod session;
pub mod sse;
pub mod system;
pub mod types;
pub mod utils;

// Re-exports
pub use assistant::{AssistantClient, QueryResult, Signal};
pub use client::AssistantApi;
pub use config::ClientConfig;
pub use connection::{
    ConnectionEvent, ConnectionState, EventTransport, FrameStream, SignalSink,
    StreamConnectionManager, StreamSignal,
};
pub use dispatcher::{
    AckOutcome, AckSink, Acknowledgement, CommandEndpoint, RequestDispatcher, interpret,
};
pub use error::{Error, Result};
pub use message_log::MessageLog;
pub use observability::register_biometrics;
pub use render::{Notice, NoticeLevel, StatusSink, TerminalSink};
pub use router::{Effect, EventRouter, Route};
pub use session::SessionRegistry;
pub use sse::process_sse;
pub use system::{QueryEndpoint, SystemState};
pub use types::*;
