//! The ordered record of displayed exchange turns.
//!
//! Entries are only ever appended, with two exceptions: the placeholder shown while an
//! answer is generated is taken out again when that same session's answer arrives, and a
//! confirmed history clear empties the log in one step.

use crate::types::{Message, Role, SessionId};

/// Display-ordered messages.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Removes the last entry if it is the placeholder awaiting `session`'s answer.
    ///
    /// Placeholders belonging to any other session are left alone.
    pub fn take_placeholder_for(&mut self, session: &SessionId) -> Option<Message> {
        if self.messages.last()?.is_placeholder_for(session) {
            self.messages.pop()
        } else {
            None
        }
    }

    /// True if an assistant answer for `session` is already in the log.
    pub fn has_answer_for(&self, session: &SessionId) -> bool {
        self.messages.iter().any(|m| {
            m.role == Role::Assistant && !m.is_placeholder() && m.session.as_ref() == Some(session)
        })
    }

    /// Empties the log, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.messages.len();
        self.messages.clear();
        dropped
    }

    /// All messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the log holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterates messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn placeholder_taken_only_for_its_session() {
        let mut log = MessageLog::new();
        log.push(Message::user("q", sid("s1")));
        log.push(Message::placeholder("Processing request...", sid("s1")));

        assert!(log.take_placeholder_for(&sid("s2")).is_none());
        assert_eq!(log.len(), 2);

        let taken = log.take_placeholder_for(&sid("s1")).unwrap();
        assert!(taken.is_placeholder());
        assert_eq!(log.len(), 1);
        assert!(log.take_placeholder_for(&sid("s1")).is_none());
    }

    #[test]
    fn placeholder_must_be_last() {
        let mut log = MessageLog::new();
        log.push(Message::placeholder("Processing request...", sid("s1")));
        log.push(Message::system("Error: boom"));
        assert!(log.take_placeholder_for(&sid("s1")).is_none());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn answers_are_found_by_session() {
        let mut log = MessageLog::new();
        log.push(Message::placeholder("Processing request...", sid("s1")));
        assert!(!log.has_answer_for(&sid("s1")));
        log.push(Message::assistant("42", sid("s1")));
        assert!(log.has_answer_for(&sid("s1")));
        assert!(!log.has_answer_for(&sid("s2")));
    }

    #[test]
    fn clear_empties_everything() {
        let mut log = MessageLog::new();
        log.push(Message::system("a"));
        log.push(Message::system("b"));
        assert_eq!(log.clear(), 2);
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }
}
