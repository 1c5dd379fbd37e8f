//! Classification and routing of stream events.
//!
//! [`EventRouter::classify`] decides what an event means given the current session and touches
//! nothing.  [`EventRouter::route`] applies that decision to the message log and status sink and
//! reports any follow-up work as an [`Effect`] for the caller to perform.

use crate::message_log::MessageLog;
use crate::observability::{ROUTER_ACCEPTED_ANSWERS, ROUTER_STALE_ANSWERS};
use crate::render::{Notice, StatusSink};
use crate::session::SessionRegistry;
use crate::types::{Message, SessionId, StreamEvent};

/// What an event means to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Informational only.
    Diagnostic,
    /// The answer for the current session.
    Answer {
        /// The current session.
        session_id: SessionId,
        /// The answer text.
        answer: String,
    },
    /// An answer for a session that is not current.
    Stale {
        /// The session the answer belongs to.
        session_id: SessionId,
    },
    /// A model pull finished.
    PullComplete {
        /// The pulled model.
        model_name: String,
        /// Whether the pull succeeded.
        success: bool,
    },
    /// A model pull failed on the server.
    PullFailed {
        /// Description of the failure.
        error: String,
    },
    /// Background work failed on the server.
    SystemError {
        /// Description of the failure.
        error: String,
    },
    /// An event type this client does not handle.
    Ignored,
}

/// Follow-up work requested by a routed event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Refresh the server-side history view.
    ReloadHistory,
    /// Refresh statistics and model listings.
    RefreshSystemInfo,
}

/// Routes stream events to the message log and status sink.
#[derive(Debug, Default)]
pub struct EventRouter {
    _private: (),
}

impl EventRouter {
    /// Creates a router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides what `event` means without acting on it.
    pub fn classify(&self, event: &StreamEvent, sessions: &SessionRegistry) -> Route {
        match event {
            StreamEvent::Connected { .. } => Route::Diagnostic,
            StreamEvent::AnswerComplete {
                session_id, answer, ..
            } => {
                if sessions.matches(session_id) {
                    Route::Answer {
                        session_id: session_id.clone(),
                        answer: answer.clone(),
                    }
                } else {
                    Route::Stale {
                        session_id: session_id.clone(),
                    }
                }
            }
            StreamEvent::ModelPullComplete {
                model_name,
                success,
                ..
            } => Route::PullComplete {
                model_name: model_name.clone(),
                success: *success,
            },
            StreamEvent::ModelPullError { error, .. } => Route::PullFailed {
                error: error.clone(),
            },
            StreamEvent::Error { error, .. } => Route::SystemError {
                error: error.clone(),
            },
            StreamEvent::Unknown => Route::Ignored,
        }
    }

    /// Classifies `event` and applies the result.
    pub fn route(
        &self,
        event: &StreamEvent,
        sessions: &SessionRegistry,
        log: &mut MessageLog,
        sink: &mut dyn StatusSink,
    ) -> Option<Effect> {
        match self.classify(event, sessions) {
            Route::Diagnostic => {
                if let StreamEvent::Connected { session_id, .. } = event {
                    tracing::info!(channel = %session_id, "event channel announced");
                }
                None
            }
            Route::Answer { session_id, answer } => {
                ROUTER_ACCEPTED_ANSWERS.click();
                if let Some(placeholder) = log.take_placeholder_for(&session_id) {
                    sink.placeholder_removed(&placeholder);
                }
                let message = Message::assistant(answer, session_id);
                sink.message_added(&message);
                log.push(message);
                Some(Effect::ReloadHistory)
            }
            Route::Stale { session_id } => {
                ROUTER_STALE_ANSWERS.click();
                tracing::debug!(
                    session = %session_id,
                    current = ?sessions.current().map(SessionId::as_str),
                    "discarding answer for superseded session"
                );
                None
            }
            Route::PullComplete {
                model_name,
                success,
            } => {
                sink.set_pull_progress(None);
                if success {
                    sink.notify(&Notice::info(format!(
                        "Model {model_name} downloaded successfully"
                    )));
                    Some(Effect::RefreshSystemInfo)
                } else {
                    sink.notify(&Notice::error(format!(
                        "Failed to download model {model_name}"
                    )));
                    None
                }
            }
            Route::PullFailed { error } => {
                sink.set_pull_progress(None);
                sink.notify(&Notice::error(format!("Model download failed: {error}")));
                None
            }
            Route::SystemError { error } => {
                let message = Message::system(format!("Error: {error}"));
                sink.message_added(&message);
                log.push(message);
                None
            }
            Route::Ignored => {
                tracing::debug!("ignoring unknown stream event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[derive(Default)]
    struct RecordingSink {
        progress: Vec<Option<String>>,
        notices: Vec<Notice>,
        added: usize,
    }

    impl StatusSink for RecordingSink {
        fn set_connected(&mut self) {}

        fn set_error(&mut self) {}

        fn set_pull_progress(&mut self, progress: Option<&str>) {
            self.progress.push(progress.map(str::to_string));
        }

        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }

        fn message_added(&mut self, _: &Message) {
            self.added += 1;
        }
    }

    fn asked(sessions: &mut SessionRegistry, log: &mut MessageLog) -> SessionId {
        let id = sessions.new_session();
        log.push(Message::user("question", id.clone()));
        log.push(Message::placeholder("Processing request...", id.clone()));
        id
    }

    #[test]
    fn answer_replaces_placeholder() {
        let router = EventRouter::new();
        let mut sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();
        let id = asked(&mut sessions, &mut log);

        let effect = router.route(
            &StreamEvent::answer(id.clone(), "42"),
            &sessions,
            &mut log,
            &mut sink,
        );
        assert_eq!(effect, Some(Effect::ReloadHistory));
        assert_eq!(log.len(), 2);
        let last = log.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "42");
        assert!(!last.is_placeholder());
    }

    #[test]
    fn answer_without_placeholder_appends() {
        let router = EventRouter::new();
        let mut sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();
        let id = sessions.new_session();
        log.push(Message::user("question", id.clone()));

        router.route(&StreamEvent::answer(id, "42"), &sessions, &mut log, &mut sink);
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().content, "42");
    }

    #[test]
    fn duplicate_answer_appends_twice() {
        let router = EventRouter::new();
        let mut sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();
        let id = asked(&mut sessions, &mut log);
        let event = StreamEvent::answer(id, "42");

        router.route(&event, &sessions, &mut log, &mut sink);
        router.route(&event, &sessions, &mut log, &mut sink);
        let answers = log
            .iter()
            .filter(|m| m.role == Role::Assistant && !m.is_placeholder())
            .count();
        assert_eq!(answers, 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn stale_answers_are_dropped() {
        let router = EventRouter::new();
        let mut sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();

        // Never matched: no session has been created.
        let foreign = StreamEvent::answer("session_foreign", "nope");
        assert_eq!(
            router.classify(&foreign, &sessions),
            Route::Stale {
                session_id: SessionId::from("session_foreign")
            }
        );
        assert!(router.route(&foreign, &sessions, &mut log, &mut sink).is_none());
        assert!(log.is_empty());

        // Previously matched, since superseded.
        let first = asked(&mut sessions, &mut log);
        let _second = asked(&mut sessions, &mut log);
        let before: Vec<_> = log.messages().to_vec();
        let effect = router.route(
            &StreamEvent::answer(first, "late"),
            &sessions,
            &mut log,
            &mut sink,
        );
        assert!(effect.is_none());
        assert_eq!(log.messages(), &before[..]);
        assert_eq!(sink.added, 0);
    }

    #[test]
    fn pull_events_clear_progress() {
        let router = EventRouter::new();
        let sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();

        let effect = router.route(
            &StreamEvent::ModelPullComplete {
                model_name: "llama3".to_string(),
                success: true,
                timestamp: None,
            },
            &sessions,
            &mut log,
            &mut sink,
        );
        assert_eq!(effect, Some(Effect::RefreshSystemInfo));
        router.route(
            &StreamEvent::ModelPullError {
                model_name: None,
                error: "disk full".to_string(),
                timestamp: None,
            },
            &sessions,
            &mut log,
            &mut sink,
        );
        assert_eq!(sink.progress, vec![None, None]);
        assert_eq!(
            sink.notices,
            vec![
                Notice::info("Model llama3 downloaded successfully"),
                Notice::error("Model download failed: disk full"),
            ]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn error_event_appends_system_message() {
        let router = EventRouter::new();
        let mut sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();
        let id = asked(&mut sessions, &mut log);

        router.route(
            &StreamEvent::Error {
                session_id: Some(id.clone()),
                error: "model crashed".to_string(),
                timestamp: None,
            },
            &sessions,
            &mut log,
            &mut sink,
        );
        let last = log.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, "Error: model crashed");
        assert!(sessions.matches(&id));
    }

    #[test]
    fn connected_and_unknown_touch_nothing() {
        let router = EventRouter::new();
        let sessions = SessionRegistry::new();
        let mut log = MessageLog::new();
        let mut sink = RecordingSink::default();
        let connected = StreamEvent::Connected {
            session_id: SessionId::from("channel"),
            timestamp: None,
        };
        assert_eq!(router.classify(&connected, &sessions), Route::Diagnostic);
        assert!(router.route(&connected, &sessions, &mut log, &mut sink).is_none());
        assert!(router.route(&StreamEvent::Unknown, &sessions, &mut log, &mut sink).is_none());
        assert!(log.is_empty());
        assert!(sessions.current().is_none());
    }
}
