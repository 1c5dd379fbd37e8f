//! Fire-and-forget command submission.
//!
//! A command's HTTP call only ever yields an acknowledgement.  Results that take time (answers,
//! model pulls) arrive on the event channel and never through the call's completion, so the
//! dispatcher hands the acknowledgement back to its owner and forgets the command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::observability::{
    COMMAND_DURATION, COMMAND_REJECTIONS, COMMAND_TRANSPORT_ERRORS, COMMANDS,
};
use crate::types::{AckStatus, Command, CommandAck, SessionId};
use crate::{Error, Result};

/// The service's command endpoints.
#[async_trait]
pub trait CommandEndpoint: Send + Sync {
    /// Posts `command` and returns the server's acknowledgement.
    async fn submit(&self, command: &Command) -> Result<CommandAck>;
}

/// The completion of one command call.
#[derive(Debug)]
pub struct Acknowledgement {
    /// The command that was sent.
    pub command: Command,
    /// The acknowledgement, or why none was received.
    pub result: Result<CommandAck>,
    /// How long the call took.
    pub elapsed: Duration,
}

/// Where spawned command calls deliver their [`Acknowledgement`]s.
pub type AckSink = Arc<dyn Fn(Acknowledgement) + Send + Sync>;

/// What an acknowledgement means to the client.
#[derive(Debug, Clone)]
pub enum AckOutcome {
    /// The question was accepted; its answer will arrive on the event channel.
    AwaitingAnswer {
        /// The session the answer will carry.
        session_id: SessionId,
    },
    /// The model pull was accepted; completion will arrive on the event channel.
    PullStarted,
    /// The command completed.
    Succeeded {
        /// Server-provided detail.
        message: Option<String>,
    },
    /// The server refused or failed the command.
    Rejected {
        /// Server-provided reason, if any.
        message: Option<String>,
    },
    /// The call itself failed; the server may never have seen the command.
    TransportFailed {
        /// What went wrong.
        error: Error,
    },
    /// A status that makes no sense for this command.
    Unexpected {
        /// The status as received.
        status: String,
    },
}

// Transport errors compare by message; their sources are not comparable.
impl PartialEq for AckOutcome {
    fn eq(&self, other: &Self) -> bool {
        use AckOutcome::*;
        match (self, other) {
            (AwaitingAnswer { session_id: a }, AwaitingAnswer { session_id: b }) => a == b,
            (PullStarted, PullStarted) => true,
            (Succeeded { message: a }, Succeeded { message: b }) => a == b,
            (Rejected { message: a }, Rejected { message: b }) => a == b,
            (TransportFailed { error: a }, TransportFailed { error: b }) => {
                a.message() == b.message()
            }
            (Unexpected { status: a }, Unexpected { status: b }) => a == b,
            _ => false,
        }
    }
}

/// Sends commands and reports their acknowledgements through an [`AckSink`].
pub struct RequestDispatcher {
    endpoint: Arc<dyn CommandEndpoint>,
    outbox: AckSink,
}

impl RequestDispatcher {
    /// Creates a dispatcher.
    pub fn new(endpoint: Arc<dyn CommandEndpoint>, outbox: AckSink) -> Self {
        Self { endpoint, outbox }
    }

    /// Validates `command` and sends it on a spawned task.
    ///
    /// Validation failures are returned before anything is sent.  Everything after that,
    /// including transport failures, arrives later as an [`Acknowledgement`].  Must be called
    /// from within a tokio runtime.
    pub fn dispatch(&self, command: Command) -> Result<()> {
        command.validate()?;
        COMMANDS.click();
        tracing::debug!(kind = %command.kind(), "submitting command");
        let endpoint = Arc::clone(&self.endpoint);
        let outbox = Arc::clone(&self.outbox);
        tokio::spawn(async move {
            let start = Instant::now();
            let result = endpoint.submit(&command).await;
            let elapsed = start.elapsed();
            COMMAND_DURATION.add(elapsed.as_secs_f64());
            match &result {
                Ok(ack) => {
                    tracing::debug!(kind = %command.kind(), status = ?ack.status, "command acknowledged");
                }
                Err(err) => {
                    tracing::warn!(kind = %command.kind(), error = %err, "command failed");
                }
            }
            outbox(Acknowledgement {
                command,
                result,
                elapsed,
            });
        });
        Ok(())
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher").finish_non_exhaustive()
    }
}

/// Interprets an acknowledgement in the light of the command it answers.
pub fn interpret(command: &Command, result: &Result<CommandAck>) -> AckOutcome {
    let ack = match result {
        Ok(ack) => ack,
        Err(err) if err.is_transport() => {
            COMMAND_TRANSPORT_ERRORS.click();
            return AckOutcome::TransportFailed { error: err.clone() };
        }
        Err(err) => {
            COMMAND_REJECTIONS.click();
            return AckOutcome::Rejected {
                message: Some(err.message().to_string()),
            };
        }
    };
    match (&ack.status, command) {
        (AckStatus::Processing, Command::Ask { session_id, .. }) => AckOutcome::AwaitingAnswer {
            session_id: session_id.clone(),
        },
        (AckStatus::Started, Command::PullModel { .. }) => AckOutcome::PullStarted,
        (AckStatus::Success, _) => AckOutcome::Succeeded {
            message: ack.message.clone(),
        },
        (AckStatus::Error, _) => {
            COMMAND_REJECTIONS.click();
            AckOutcome::Rejected {
                message: ack.message.clone(),
            }
        }
        (status, _) => AckOutcome::Unexpected {
            status: String::from(status.clone()),
        },
    }
}
