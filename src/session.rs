//! Tracking of the one question session the client currently cares about.
//!
//! A session is created when a question is asked and silently superseded by the next one.
//! There is no disposal: an old session simply stops matching, and any answer that still
//! arrives for it is dropped by the event router.

use time::OffsetDateTime;

use crate::types::SessionId;

/// Holds the single current session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: Option<SessionId>,
    last_stamp: i128,
}

impl SessionRegistry {
    /// Creates a registry with no current session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh id and makes it current, superseding any previous session.
    ///
    /// Ids embed a nanosecond timestamp that is forced to increase strictly, so two calls
    /// never yield the same id even when the clock does not advance between them.
    pub fn new_session(&mut self) -> SessionId {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let stamp = now.max(self.last_stamp + 1);
        self.last_stamp = stamp;
        let id = SessionId::new(format!("session_{stamp}"));
        tracing::debug!(
            session = %id,
            superseded = ?self.current.as_ref().map(SessionId::as_str),
            "new session"
        );
        self.current = Some(id.clone());
        id
    }

    /// The current session, if a question has been asked.
    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// True only for the current session.
    pub fn matches(&self, id: &SessionId) -> bool {
        self.current.as_ref() == Some(id)
    }
}
