//! The client driver.
//!
//! [`AssistantClient`] owns every piece of client state and is the only thing that mutates it.
//! Background work (the event channel reader, the reconnect timer, command and query calls)
//! posts [`Signal`]s to one inbox; the owner pulls them with [`AssistantClient::next_signal`]
//! and applies them one at a time with [`AssistantClient::handle`].  User actions are plain
//! `&mut self` methods, so a new session is always current before its question is sent and
//! before any further event is routed.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::client::AssistantApi;
use crate::config::ClientConfig;
use crate::connection::{
    ConnectionEvent, ConnectionState, EventTransport, SignalSink, StreamConnectionManager,
    StreamSignal,
};
use crate::dispatcher::{
    AckOutcome, AckSink, Acknowledgement, CommandEndpoint, RequestDispatcher, interpret,
};
use crate::message_log::MessageLog;
use crate::render::{Notice, StatusSink};
use crate::router::{Effect, EventRouter};
use crate::session::SessionRegistry;
use crate::system::{QueryEndpoint, SystemState};
use crate::types::command::require;
use crate::types::{
    Command, HistoryEntry, Message, ModelList, PromptKind, PromptSet, ServerStatus, SessionId,
    Statistics, StreamEvent,
};
use crate::{Error, Result};

/// Progress text shown once a model pull has been accepted.
const PULL_STARTED: &str = "Download started. This may take several minutes...";

/// The result of a read-only query.
#[derive(Debug)]
pub enum QueryResult {
    /// `GET /api/statistics`
    Statistics(Result<Statistics>),
    /// `GET /api/models`
    Models {
        /// The listing.
        result: Result<ModelList>,
        /// Whether the user asked to see it.
        requested: bool,
    },
    /// `GET /api/embedding_models`
    EmbeddingModels {
        /// The listing.
        result: Result<ModelList>,
        /// Whether the user asked to see it.
        requested: bool,
    },
    /// `GET /api/prompts`
    Prompts {
        /// The prompts.
        result: Result<PromptSet>,
        /// Whether the user asked to see them.
        requested: bool,
    },
    /// `GET /api/chat_history`
    History {
        /// The entries.
        result: Result<Vec<HistoryEntry>>,
        /// Whether the user asked to see them.
        requested: bool,
    },
    /// `GET /api/status`
    Status(Result<ServerStatus>),
}

/// Everything that can happen to the client, in arrival order.
#[derive(Debug)]
pub enum Signal {
    /// From the event channel or its reconnect timer.
    Stream(StreamSignal),
    /// A command call completed.
    Ack(Acknowledgement),
    /// A query call completed.
    Query(QueryResult),
}

/// Streaming session client for the assistant service.
pub struct AssistantClient {
    config: ClientConfig,
    sessions: SessionRegistry,
    log: MessageLog,
    connection: StreamConnectionManager,
    router: EventRouter,
    dispatcher: RequestDispatcher,
    queries: Arc<dyn QueryEndpoint>,
    system: SystemState,
    sink: Box<dyn StatusSink>,
    inbox: mpsc::UnboundedReceiver<Signal>,
    outbox: mpsc::UnboundedSender<Signal>,
}

impl AssistantClient {
    /// Creates a client over explicit collaborators.
    ///
    /// Nothing is sent until [`start`](Self::start).
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn EventTransport>,
        commands: Arc<dyn CommandEndpoint>,
        queries: Arc<dyn QueryEndpoint>,
        sink: Box<dyn StatusSink>,
    ) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();

        let tx = outbox.clone();
        let stream_sink: SignalSink = Arc::new(move |signal| {
            let _ = tx.send(Signal::Stream(signal));
        });
        let tx = outbox.clone();
        let ack_sink: AckSink = Arc::new(move |ack| {
            let _ = tx.send(Signal::Ack(ack));
        });

        Self {
            connection: StreamConnectionManager::new(
                transport,
                stream_sink,
                config.reconnect_delay,
            ),
            dispatcher: RequestDispatcher::new(commands, ack_sink),
            config,
            sessions: SessionRegistry::new(),
            log: MessageLog::new(),
            router: EventRouter::new(),
            queries,
            system: SystemState::default(),
            sink,
            inbox,
            outbox,
        }
    }

    /// Creates a client talking HTTP to the server named in `config`.
    pub fn connect(config: ClientConfig, sink: Box<dyn StatusSink>) -> Result<Self> {
        let api = Arc::new(AssistantApi::new(&config)?);
        Ok(Self::new(
            config,
            Arc::clone(&api) as Arc<dyn EventTransport>,
            Arc::clone(&api) as Arc<dyn CommandEndpoint>,
            api,
            sink,
        ))
    }

    /// Opens the event channel and loads system information and history.
    pub fn start(&mut self) {
        tracing::info!(server = %self.config.base_url, "starting assistant client");
        self.connection.open();
        self.refresh_system_info();
        self.reload_history(false);
    }

    /// Tears down the event channel.
    pub fn shutdown(&mut self) {
        self.connection.close();
    }

    /// Waits for the next signal.
    pub async fn next_signal(&mut self) -> Option<Signal> {
        self.inbox.recv().await
    }

    /// Waits for the next signal and applies it.
    pub async fn step(&mut self) {
        if let Some(signal) = self.next_signal().await {
            self.handle(signal);
        }
    }

    /// Applies one signal.
    pub fn handle(&mut self, signal: Signal) {
        match signal {
            Signal::Stream(signal) => match self.connection.handle(signal) {
                Some(ConnectionEvent::Opened) => self.sink.set_connected(),
                Some(ConnectionEvent::Failed(_)) => self.sink.set_error(),
                Some(ConnectionEvent::Event(event)) => self.route_event(&event),
                None => {}
            },
            Signal::Ack(ack) => self.handle_ack(ack),
            Signal::Query(result) => self.handle_query(result),
        }
    }

    /// Routes one stream event and performs any follow-up it asks for.
    pub fn route_event(&mut self, event: &StreamEvent) {
        let effect = self
            .router
            .route(event, &self.sessions, &mut self.log, self.sink.as_mut());
        match effect {
            Some(Effect::ReloadHistory) => self.reload_history(false),
            Some(Effect::RefreshSystemInfo) => self.refresh_system_info(),
            None => {}
        }
    }

    ////////////////////////////////////////// Actions //////////////////////////////////////////

    /// Asks a question under a fresh session.
    ///
    /// The session is current and the question is in the log before the request leaves.
    pub fn ask(&mut self, question: impl Into<String>) -> Result<SessionId> {
        let question = question.into();
        require(&question, "Question", "question")?;
        let session_id = self.sessions.new_session();
        self.append(Message::user(question.clone(), session_id.clone()));
        self.dispatcher.dispatch(Command::Ask {
            question,
            session_id: session_id.clone(),
        })?;
        Ok(session_id)
    }

    /// Adds a document to the knowledge base.
    pub fn add_knowledge(
        &mut self,
        content: impl Into<String>,
        source: Option<&str>,
    ) -> Result<()> {
        let source = source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.config.knowledge_source)
            .to_string();
        self.dispatcher.dispatch(Command::AddKnowledge {
            content: content.into(),
            source,
        })
    }

    /// Switches the generation model.
    pub fn switch_model(&mut self, model_name: impl Into<String>) -> Result<()> {
        self.dispatcher.dispatch(Command::SwitchModel {
            model_name: model_name.into(),
        })
    }

    /// Switches the embedding model.
    pub fn switch_embedding_model(&mut self, model_name: impl Into<String>) -> Result<()> {
        self.dispatcher.dispatch(Command::SwitchEmbeddingModel {
            model_name: model_name.into(),
        })
    }

    /// Starts downloading a model.  Completion arrives on the event channel.
    pub fn pull_model(&mut self, model_name: impl Into<String>) -> Result<()> {
        let command = Command::PullModel {
            model_name: model_name.into(),
        };
        command.validate()?;
        if let Command::PullModel { model_name } = &command {
            let progress = format!("Starting download of model: {model_name}");
            self.sink.set_pull_progress(Some(&progress));
        }
        self.dispatcher.dispatch(command)
    }

    /// Replaces one of the stored prompts.
    pub fn update_prompt(&mut self, kind: PromptKind, prompt: impl Into<String>) -> Result<()> {
        self.dispatcher.dispatch(Command::UpdatePrompt {
            kind,
            prompt: prompt.into(),
        })
    }

    /// Replaces the prompt of the mode the server is in, as last reported.
    pub fn update_current_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        let kind = self.system.current_prompt_kind();
        self.update_prompt(kind, prompt)
    }

    /// Flips chat mode.
    pub fn toggle_chat_mode(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ToggleChatMode {
            use_chat_mode: !self.system.use_chat_mode,
        })
    }

    /// Flips the answer cache.
    pub fn toggle_cache(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ToggleCache {
            use_cache: !self.system.use_cache,
        })
    }

    /// Flips speech output.
    pub fn toggle_speech(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ToggleSpeech {
            speech_enabled: !self.system.speech_enabled,
        })
    }

    /// Restores both prompts to their defaults.
    pub fn reset_prompts(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ResetPrompts)
    }

    /// Clears the server's chat history.  The local log is emptied only once the server agrees.
    pub fn clear_history(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ClearChatHistory)
    }

    /// Clears the model's answer cache.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.dispatcher.dispatch(Command::ClearCache)
    }

    /// Runs a knowledge base search.  Results are printed by the server.
    pub fn search_knowledge(&mut self, query: impl Into<String>) -> Result<()> {
        self.dispatcher.dispatch(Command::SearchKnowledge {
            query: query.into(),
        })
    }

    /// Reloads statistics, model listings and prompts.
    pub fn refresh_system_info(&mut self) {
        let queries = Arc::clone(&self.queries);
        self.spawn_query(async move { queries.statistics().await }, QueryResult::Statistics);
        self.fetch_models(false);
        self.fetch_prompts(false);
    }

    /// Reloads the server-side history.  With `requested`, the sink is asked to show it.
    pub fn reload_history(&mut self, requested: bool) {
        let queries = Arc::clone(&self.queries);
        self.spawn_query(async move { queries.chat_history().await }, move |result| {
            QueryResult::History { result, requested }
        });
    }

    /// Fetches and shows both model listings.
    pub fn list_models(&mut self) {
        self.fetch_models(true);
    }

    /// Fetches and shows the prompt texts.
    pub fn show_prompts(&mut self) {
        self.fetch_prompts(true);
    }

    /// Fetches and shows the server's health report.
    pub fn check_status(&mut self) {
        let queries = Arc::clone(&self.queries);
        self.spawn_query(async move { queries.status().await }, QueryResult::Status);
    }

    ///////////////////////////////////////// Accessors /////////////////////////////////////////

    /// The message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// All messages in display order.
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// The session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The current session.
    pub fn current_session(&self) -> Option<&SessionId> {
        self.sessions.current()
    }

    /// The last reported system state.
    pub fn system_state(&self) -> &SystemState {
        &self.system
    }

    /// The event channel's state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Watches the event channel's state.
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// True while a reconnect is scheduled.
    pub fn reconnect_pending(&self) -> bool {
        self.connection.reconnect_pending()
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    ///////////////////////////////////////// Internals /////////////////////////////////////////

    fn append(&mut self, message: Message) {
        self.sink.message_added(&message);
        self.log.push(message);
    }

    fn fetch_models(&mut self, requested: bool) {
        let queries = Arc::clone(&self.queries);
        self.spawn_query(async move { queries.models().await }, move |result| {
            QueryResult::Models { result, requested }
        });
        let queries = Arc::clone(&self.queries);
        self.spawn_query(
            async move { queries.embedding_models().await },
            move |result| QueryResult::EmbeddingModels { result, requested },
        );
    }

    fn fetch_prompts(&mut self, requested: bool) {
        let queries = Arc::clone(&self.queries);
        self.spawn_query(async move { queries.prompts().await }, move |result| {
            QueryResult::Prompts { result, requested }
        });
    }

    fn spawn_query<T, F, W>(&self, query: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> QueryResult + Send + 'static,
    {
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            let result = query.await;
            let _ = outbox.send(Signal::Query(wrap(result)));
        });
    }

    fn handle_ack(&mut self, ack: Acknowledgement) {
        let Acknowledgement {
            command, result, ..
        } = ack;
        match interpret(&command, &result) {
            AckOutcome::AwaitingAnswer { session_id } => {
                // The answer may already be in, or the user may have moved on.
                if self.sessions.matches(&session_id) && !self.log.has_answer_for(&session_id) {
                    let text = self.config.placeholder.clone();
                    self.append(Message::placeholder(text, session_id));
                }
            }
            AckOutcome::PullStarted => self.sink.set_pull_progress(Some(PULL_STARTED)),
            AckOutcome::Succeeded { message } => self.command_succeeded(&command, message),
            AckOutcome::Rejected { message } => self.command_rejected(&command, message),
            AckOutcome::TransportFailed { error } => self.command_unsent(&command, &error),
            AckOutcome::Unexpected { status } => {
                tracing::warn!(kind = %command.kind(), %status, "unexpected acknowledgement");
            }
        }
    }

    fn command_succeeded(&mut self, command: &Command, message: Option<String>) {
        self.system.apply_accepted(command);
        let on_off = |v: bool| if v { "on" } else { "off" };
        let text = match command {
            Command::AddKnowledge { .. } => "Knowledge added successfully".to_string(),
            Command::SwitchModel { model_name } | Command::SwitchEmbeddingModel { model_name } => {
                message.unwrap_or_else(|| format!("Model switched to: {model_name}"))
            }
            Command::UpdatePrompt { .. } => "Prompt updated".to_string(),
            Command::ToggleChatMode { use_chat_mode } => format!(
                "Mode changed to: {}",
                if *use_chat_mode { "chat" } else { "generation" }
            ),
            Command::ToggleCache { use_cache } => format!("Cache: {}", on_off(*use_cache)),
            Command::ToggleSpeech { speech_enabled } => {
                format!("Speech: {}", on_off(*speech_enabled))
            }
            Command::ResetPrompts => "Prompts reset to defaults".to_string(),
            Command::ClearChatHistory => {
                let dropped = self.log.clear();
                tracing::info!(dropped, "chat history cleared");
                self.sink.log_cleared();
                self.append(Message::system("Chat history cleared"));
                self.reload_history(false);
                "History cleared".to_string()
            }
            Command::ClearCache => message.unwrap_or_else(|| "Cache cleared".to_string()),
            Command::SearchKnowledge { .. } => {
                "Search completed. Results are shown in the server console.".to_string()
            }
            Command::Ask { .. } | Command::PullModel { .. } => {
                message.unwrap_or_else(|| "Request accepted".to_string())
            }
        };
        self.sink.notify(&Notice::info(text));
        if !matches!(
            command,
            Command::ClearChatHistory | Command::SearchKnowledge { .. }
        ) {
            self.refresh_system_info();
        }
    }

    fn command_rejected(&mut self, command: &Command, message: Option<String>) {
        let reason = message.unwrap_or_else(|| "Unknown error".to_string());
        match command {
            Command::Ask { .. } => self.append(Message::system(format!("Error: {reason}"))),
            Command::PullModel { .. } => {
                self.sink.set_pull_progress(None);
                self.sink.notify(&Notice::error(reason));
            }
            _ => self.sink.notify(&Notice::error(reason)),
        }
    }

    fn command_unsent(&mut self, command: &Command, error: &Error) {
        tracing::warn!(kind = %command.kind(), %error, "command not delivered");
        let text = match command {
            Command::Ask { .. } => "Failed to send request".to_string(),
            Command::PullModel { .. } => {
                self.sink.set_pull_progress(None);
                "Failed to start download".to_string()
            }
            Command::SearchKnowledge { .. } => "Search failed".to_string(),
            _ => format!("Connection error: {} was not sent", command.kind()),
        };
        if !matches!(command, Command::Ask { .. }) {
            self.sink.notify(&Notice::error(text.clone()));
        }
        self.append(Message::system(text));
    }

    fn handle_query(&mut self, result: QueryResult) {
        match result {
            QueryResult::Statistics(Ok(stats)) => {
                self.system.apply_statistics(&stats);
                self.sink.system_info(&self.system);
            }
            QueryResult::Statistics(Err(err)) => {
                tracing::warn!(error = %err, "statistics unavailable");
                self.sink.set_error();
            }
            QueryResult::Models { result, requested } => match result {
                Ok(models) => {
                    self.system.apply_models(&models);
                    if requested {
                        self.sink.models_listed(&models, false);
                    }
                }
                Err(err) => self.query_failed("models", &err, requested),
            },
            QueryResult::EmbeddingModels { result, requested } => match result {
                Ok(models) => {
                    self.system.apply_embedding_models(&models);
                    if requested {
                        self.sink.models_listed(&models, true);
                    }
                }
                Err(err) => self.query_failed("embedding models", &err, requested),
            },
            QueryResult::Prompts { result, requested } => match result {
                Ok(prompts) => {
                    self.system.apply_prompts(&prompts);
                    if requested {
                        self.sink.prompts_loaded(&prompts);
                    }
                }
                Err(err) => self.query_failed("prompts", &err, requested),
            },
            QueryResult::History { result, requested } => match result {
                Ok(entries) => self.sink.history_loaded(&entries, requested),
                Err(err) => self.query_failed("history", &err, requested),
            },
            QueryResult::Status(result) => match result {
                Ok(status) => self.sink.server_status(&status),
                Err(err) => self.query_failed("status", &err, true),
            },
        }
    }

    fn query_failed(&mut self, what: &str, err: &Error, requested: bool) {
        tracing::warn!(error = %err, "failed to load {what}");
        if requested {
            self.sink
                .notify(&Notice::error(format!("Failed to load {what}: {}", err.message())));
        }
    }
}

impl std::fmt::Debug for AssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantClient")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("messages", &self.log.len())
            .field("connection", &self.connection)
            .field("system", &self.system)
            .finish_non_exhaustive()
    }
}
