use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// An event delivered over the server's event channel.
///
/// Events arrive one per record, in the order the server produced them.  Session-scoped
/// results carry the id the client attached to the originating request; model pulls are
/// global and carry none.  Types the client does not know decode to
/// [`StreamEvent::Unknown`] so that a newer server never breaks the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Sent once when the channel is established.  Purely informational.
    Connected {
        /// The server's id for this channel.  Unrelated to question sessions.
        session_id: SessionId,
        /// Server time in milliseconds since the epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// The answer to a previously asked question.
    AnswerComplete {
        /// The session the question was asked under.
        session_id: SessionId,
        /// The generated answer.
        answer: String,
        /// Server time in milliseconds since the epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// A model download finished.
    ModelPullComplete {
        /// The model that was pulled.
        model_name: String,
        /// Whether the pull succeeded.
        success: bool,
        /// Server time in milliseconds since the epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// A model download failed with an exception on the server.
    ModelPullError {
        /// The model that was being pulled, when the server reports it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        /// Description of the failure.
        #[serde(default)]
        error: String,
        /// Server time in milliseconds since the epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Answer generation (or some other background work) failed.
    Error {
        /// The session of the failed question, when there is one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// Description of the failure.
        #[serde(default)]
        error: String,
        /// Server time in milliseconds since the epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Any event type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The wire name of this event's type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::AnswerComplete { .. } => "answer_complete",
            StreamEvent::ModelPullComplete { .. } => "model_pull_complete",
            StreamEvent::ModelPullError { .. } => "model_pull_error",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Convenience constructor for an `answer_complete` event.
    pub fn answer(session_id: impl Into<SessionId>, answer: impl Into<String>) -> Self {
        StreamEvent::AnswerComplete {
            session_id: session_id.into(),
            answer: answer.into(),
            timestamp: None,
        }
    }
}
