use std::fmt;

use serde::{Deserialize, Serialize};

/// A client-generated correlation id binding one question to its streamed answer.
///
/// The server echoes the id back verbatim on `answer_complete` events; the client only
/// ever compares ids for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_string() {
        let id = SessionId::from("session_1700000000000");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"session_1700000000000\""
        );
        let back: SessionId = serde_json::from_str("\"session_1700000000000\"").unwrap();
        assert_eq!(back, id);
    }
}
