use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::SessionId;

/// The author of a displayed turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the client.
    User,

    /// The assistant service.
    Assistant,

    /// The client itself, or the server reporting a failure.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One displayed turn of the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// The text of the message.
    pub content: String,
    /// When the client recorded the message.
    pub timestamp: OffsetDateTime,
    /// The session this message belongs to, for questions and their answers.
    pub session: Option<SessionId>,
    placeholder: bool,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>, session: Option<SessionId>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            session,
            placeholder: false,
        }
    }

    /// A question the user asked under `session`.
    pub fn user(content: impl Into<String>, session: SessionId) -> Self {
        Self::with_role(Role::User, content, Some(session))
    }

    /// The streamed answer for `session`.
    pub fn assistant(content: impl Into<String>, session: SessionId) -> Self {
        Self::with_role(Role::Assistant, content, Some(session))
    }

    /// A client-side notice, not tied to any session.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content, None)
    }

    /// A provisional assistant entry shown while the answer for `session` is generated.
    pub fn placeholder(content: impl Into<String>, session: SessionId) -> Self {
        Self {
            placeholder: true,
            ..Self::with_role(Role::Assistant, content, Some(session))
        }
    }

    /// True for provisional entries created by [`Message::placeholder`].
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// True if this is the placeholder awaiting the answer for `session`.
    pub fn is_placeholder_for(&self, session: &SessionId) -> bool {
        self.placeholder && self.session.as_ref() == Some(session)
    }
}
