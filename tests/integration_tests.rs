//! End-to-end tests of the client driver against in-memory collaborators.
//! Nothing here touches the network.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use assistant_client::{
        AckStatus, AssistantClient, ClientConfig, Command, CommandAck, CommandEndpoint,
        ConnectionState, Error, EventTransport, FrameStream, HistoryEntry, ModelList, Notice,
        NoticeLevel, PromptSet, QueryEndpoint, Result, Role, ServerStatus, SessionId,
        Statistics, StatusSink, StreamEvent,
    };

    type Reply = Box<dyn Fn(&Command) -> Result<CommandAck> + Send + Sync>;

    /// Command and query endpoints backed by a reply function.
    struct FakeServer {
        reply: Mutex<Reply>,
        commands: Mutex<Vec<Command>>,
        statistics_calls: AtomicUsize,
        history_calls: AtomicUsize,
        report_flags: AtomicBool,
    }

    impl FakeServer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Box::new(default_reply)),
                commands: Mutex::new(Vec::new()),
                statistics_calls: AtomicUsize::new(0),
                history_calls: AtomicUsize::new(0),
                report_flags: AtomicBool::new(true),
            })
        }

        fn reply_with<F>(&self, reply: F)
        where
            F: Fn(&Command) -> Result<CommandAck> + Send + Sync + 'static,
        {
            *self.reply.lock().unwrap() = Box::new(reply);
        }

        fn commands(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }
    }

    fn default_reply(command: &Command) -> Result<CommandAck> {
        Ok(match command {
            Command::Ask { .. } => CommandAck::new(AckStatus::Processing),
            Command::PullModel { .. } => CommandAck::new(AckStatus::Started),
            _ => CommandAck::new(AckStatus::Success),
        })
    }

    #[async_trait]
    impl CommandEndpoint for FakeServer {
        async fn submit(&self, command: &Command) -> Result<CommandAck> {
            self.commands.lock().unwrap().push(command.clone());
            let reply = self.reply.lock().unwrap();
            (*reply)(command)
        }
    }

    #[async_trait]
    impl QueryEndpoint for FakeServer {
        async fn statistics(&self) -> Result<Statistics> {
            self.statistics_calls.fetch_add(1, Ordering::SeqCst);
            let mut stats = Statistics {
                llm_model: Some("llama3".to_string()),
                ..Statistics::default()
            };
            if self.report_flags.load(Ordering::SeqCst) {
                stats.use_chat_mode = Some(true);
                stats.use_cache = Some(false);
                stats.speech_enabled = Some(false);
            }
            Ok(stats)
        }

        async fn models(&self) -> Result<ModelList> {
            Ok(ModelList::default())
        }

        async fn embedding_models(&self) -> Result<ModelList> {
            Ok(ModelList::default())
        }

        async fn prompts(&self) -> Result<PromptSet> {
            Ok(PromptSet::default())
        }

        async fn chat_history(&self) -> Result<Vec<HistoryEntry>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn status(&self) -> Result<ServerStatus> {
            Err(Error::not_found("no status endpoint"))
        }
    }

    /// An event channel whose records the test pushes by hand.
    ///
    /// Each connection gets a fresh feed; the sender for the latest one is kept for the test.
    struct FakeChannel {
        connects: AtomicUsize,
        feed: Mutex<Option<mpsc::UnboundedSender<Result<String>>>>,
    }

    impl FakeChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicUsize::new(0),
                feed: Mutex::new(None),
            })
        }

        fn push(&self, event: &StreamEvent) {
            let raw = serde_json::to_string(event).unwrap();
            let feed = self.feed.lock().unwrap();
            feed.as_ref().unwrap().send(Ok(raw)).unwrap();
        }

        /// Ends the current connection as a server restart would.
        fn hang_up(&self) {
            self.feed.lock().unwrap().take();
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventTransport for FakeChannel {
        async fn connect(&self) -> Result<FrameStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            *self.feed.lock().unwrap() = Some(tx);
            let frames = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            });
            Ok(Box::pin(frames))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn contains(&self, entry: &str) -> bool {
            self.entries().iter().any(|e| e == entry)
        }

        fn record(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }
    }

    impl StatusSink for Recorder {
        fn set_connected(&mut self) {
            self.record("connected".to_string());
        }

        fn set_error(&mut self) {
            self.record("error".to_string());
        }

        fn set_pull_progress(&mut self, progress: Option<&str>) {
            self.record(format!("progress: {}", progress.unwrap_or("-")));
        }

        fn notify(&mut self, notice: &Notice) {
            let level = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Error => "alert",
            };
            self.record(format!("{level}: {}", notice.text));
        }

        fn log_cleared(&mut self) {
            self.record("cleared".to_string());
        }
    }

    struct Harness {
        client: AssistantClient,
        server: Arc<FakeServer>,
        channel: Arc<FakeChannel>,
        sink: Recorder,
    }

    impl Harness {
        async fn started() -> Self {
            Self::started_with(FakeServer::new()).await
        }

        async fn started_with(server: Arc<FakeServer>) -> Self {
            let channel = FakeChannel::new();
            let sink = Recorder::default();
            let config = ClientConfig::new()
                .with_base_url("http://assistant.test/")
                .without_color();
            let mut client = AssistantClient::new(
                config,
                channel.clone(),
                server.clone(),
                server.clone(),
                Box::new(sink.clone()),
            );
            client.start();
            let mut harness = Self {
                client,
                server,
                channel,
                sink,
            };
            harness.settle().await;
            harness
        }

        /// Applies signals until none arrive for a short while.
        async fn settle(&mut self) {
            while let Ok(Some(signal)) =
                tokio::time::timeout(Duration::from_millis(100), self.client.next_signal()).await
            {
                self.client.handle(signal);
            }
        }

        fn log(&self) -> Vec<(Role, String)> {
            self.client
                .messages()
                .iter()
                .map(|m| (m.role, m.content.clone()))
                .collect()
        }
    }

    fn user(text: &str) -> (Role, String) {
        (Role::User, text.to_string())
    }

    fn assistant(text: &str) -> (Role, String) {
        (Role::Assistant, text.to_string())
    }

    fn system(text: &str) -> (Role, String) {
        (Role::System, text.to_string())
    }

    #[tokio::test]
    async fn start_connects_and_loads_state() {
        let h = Harness::started().await;
        assert_eq!(h.client.connection_state(), ConnectionState::Open);
        assert!(h.sink.contains("connected"));
        assert_eq!(h.channel.connects(), 1);
        assert_eq!(h.server.statistics_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.server.history_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.client.system_state().llm_model.as_deref(), Some("llama3"));
        assert!(!h.client.system_state().use_cache);
    }

    #[tokio::test]
    async fn answer_replaces_placeholder() {
        let mut h = Harness::started().await;

        let session = assert_ok!(h.client.ask("what is six times seven?"));
        h.settle().await;
        assert_eq!(h.client.messages().len(), 2);
        assert!(h.client.messages()[1].is_placeholder_for(&session));

        h.channel.push(&StreamEvent::answer(session.clone(), "42"));
        h.settle().await;

        assert_eq!(
            h.log(),
            vec![user("what is six times seven?"), assistant("42")]
        );
        assert!(!h.client.messages().iter().any(|m| m.is_placeholder()));
        // Accepted answers reload the server-side history.
        assert_eq!(h.server.history_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn superseded_answer_is_dropped() {
        let mut h = Harness::started().await;

        let first = h.client.ask("first question").unwrap();
        h.settle().await;
        let second = h.client.ask("second question").unwrap();
        h.settle().await;
        assert_ne!(first, second);
        assert_eq!(h.client.current_session(), Some(&second));

        let before = h.log();
        h.channel.push(&StreamEvent::answer(first.clone(), "late answer"));
        h.settle().await;
        assert_eq!(h.log(), before);

        h.channel.push(&StreamEvent::answer(second.clone(), "fresh answer"));
        h.settle().await;
        let log = h.log();
        assert_eq!(log.last(), Some(&assistant("fresh answer")));
        assert!(!log.contains(&assistant("late answer")));
    }

    #[tokio::test]
    async fn foreign_session_is_dropped() {
        let mut h = Harness::started().await;
        h.client.ask("mine").unwrap();
        h.settle().await;

        let before = h.log();
        h.channel
            .push(&StreamEvent::answer(SessionId::from("someone-else"), "theirs"));
        h.settle().await;
        assert_eq!(h.log(), before);
    }

    #[tokio::test]
    async fn answer_before_acknowledgement_leaves_no_placeholder() {
        let mut h = Harness::started().await;
        let session = h.client.ask("quick one").unwrap();
        // The answer is routed before the acknowledgement signal is applied.
        h.client.route_event(&StreamEvent::answer(session, "done"));
        h.settle().await;
        assert_eq!(h.log(), vec![user("quick one"), assistant("done")]);
    }

    #[tokio::test]
    async fn duplicate_answer_is_appended_twice() {
        let mut h = Harness::started().await;
        let session = h.client.ask("echo?").unwrap();
        h.settle().await;

        h.channel.push(&StreamEvent::answer(session.clone(), "echo"));
        h.channel.push(&StreamEvent::answer(session, "echo"));
        h.settle().await;
        assert_eq!(
            h.log(),
            vec![user("echo?"), assistant("echo"), assistant("echo")]
        );
    }

    #[tokio::test]
    async fn unsent_question_reports_failure() {
        let mut h = Harness::started().await;
        h.server.reply_with(|_| Err(Error::connection("connection refused", None)));

        h.client.ask("anyone there?").unwrap();
        h.settle().await;
        assert_eq!(
            h.log(),
            vec![user("anyone there?"), system("Failed to send request")]
        );
    }

    #[tokio::test]
    async fn rejected_question_reports_reason() {
        let mut h = Harness::started().await;
        h.server
            .reply_with(|_| Ok(CommandAck::new(AckStatus::Error).with_message("model busy")));

        h.client.ask("hello").unwrap();
        h.settle().await;
        assert_eq!(h.log(), vec![user("hello"), system("Error: model busy")]);
    }

    #[tokio::test]
    async fn empty_question_is_refused_locally() {
        let mut h = Harness::started().await;
        let err = assert_err!(h.client.ask("   "));
        assert!(err.is_validation());
        h.settle().await;
        assert!(h.log().is_empty());
        assert!(h.server.commands().is_empty());
        assert_eq!(h.client.current_session(), None);
    }

    #[tokio::test]
    async fn server_error_event_is_shown() {
        let mut h = Harness::started().await;
        h.channel.push(&StreamEvent::Error {
            session_id: None,
            error: "generation crashed".to_string(),
            timestamp: None,
        });
        h.settle().await;
        assert_eq!(h.log(), vec![system("Error: generation crashed")]);
    }

    #[tokio::test]
    async fn clear_history_waits_for_the_server() {
        let mut h = Harness::started().await;
        let session = h.client.ask("remember me").unwrap();
        h.settle().await;
        h.channel.push(&StreamEvent::answer(session, "noted"));
        h.settle().await;

        h.server.reply_with(|command| match command {
            Command::ClearChatHistory => Err(Error::internal_server("database locked")),
            other => default_reply(other),
        });
        h.client.clear_history().unwrap();
        h.settle().await;
        assert_eq!(h.log(), vec![user("remember me"), assistant("noted")]);
        assert!(h.sink.contains("alert: database locked"));

        h.server.reply_with(default_reply);
        h.client.clear_history().unwrap();
        h.settle().await;
        assert_eq!(h.log(), vec![system("Chat history cleared")]);
        assert!(h.sink.contains("cleared"));
        assert!(h.sink.contains("info: History cleared"));
    }

    #[tokio::test]
    async fn model_pull_progress() {
        let mut h = Harness::started().await;
        let stats_before = h.server.statistics_calls.load(Ordering::SeqCst);

        assert_ok!(h.client.pull_model("mistral"));
        h.settle().await;
        assert!(h.sink.contains("progress: Starting download of model: mistral"));
        assert!(h.sink.contains("progress: Download started. This may take several minutes..."));

        h.channel.push(&StreamEvent::ModelPullComplete {
            model_name: "mistral".to_string(),
            success: true,
            timestamp: None,
        });
        h.settle().await;
        assert!(h.sink.contains("progress: -"));
        assert!(h.sink.contains("info: Model mistral downloaded successfully"));
        assert_eq!(
            h.server.statistics_calls.load(Ordering::SeqCst),
            stats_before + 1
        );
        // Pull results never touch the conversation.
        assert!(h.log().is_empty());
    }

    #[tokio::test]
    async fn failed_model_pull() {
        let mut h = Harness::started().await;
        h.client.pull_model("nonexistent").unwrap();
        h.settle().await;
        h.channel.push(&StreamEvent::ModelPullError {
            model_name: Some("nonexistent".to_string()),
            error: "manifest not found".to_string(),
            timestamp: None,
        });
        h.settle().await;
        assert!(h.sink.contains("alert: Model download failed: manifest not found"));
    }

    #[tokio::test]
    async fn toggles_send_the_negated_state() {
        let mut h = Harness::started().await;
        h.client.toggle_chat_mode().unwrap();
        h.client.toggle_cache().unwrap();
        h.client.toggle_speech().unwrap();
        h.settle().await;

        let commands = h.server.commands();
        assert!(commands.contains(&Command::ToggleChatMode {
            use_chat_mode: false
        }));
        assert!(commands.contains(&Command::ToggleCache { use_cache: true }));
        assert!(commands.contains(&Command::ToggleSpeech {
            speech_enabled: true
        }));
        assert!(h.sink.contains("info: Mode changed to: generation"));
        assert!(h.sink.contains("info: Cache: on"));
    }

    #[tokio::test]
    async fn toggles_alternate_when_statistics_omit_flags() {
        let server = FakeServer::new();
        server.report_flags.store(false, Ordering::SeqCst);
        let mut h = Harness::started_with(server).await;

        assert_ok!(h.client.toggle_cache());
        h.settle().await;
        assert!(!h.client.system_state().use_cache);
        assert_ok!(h.client.toggle_cache());
        h.settle().await;
        assert!(h.client.system_state().use_cache);

        assert_ok!(h.client.toggle_chat_mode());
        h.settle().await;
        assert_ok!(h.client.toggle_chat_mode());
        h.settle().await;

        assert_eq!(
            h.server.commands(),
            vec![
                Command::ToggleCache { use_cache: false },
                Command::ToggleCache { use_cache: true },
                Command::ToggleChatMode {
                    use_chat_mode: false
                },
                Command::ToggleChatMode {
                    use_chat_mode: true
                },
            ]
        );
    }

    #[tokio::test]
    async fn unsent_command_is_logged() {
        let mut h = Harness::started().await;
        h.server
            .reply_with(|_| Err(Error::connection("connection refused", None)));

        assert_ok!(h.client.switch_model("mistral"));
        h.settle().await;
        assert_eq!(
            h.log(),
            vec![system("Connection error: switch_model was not sent")]
        );
        assert!(h.sink.contains("alert: Connection error: switch_model was not sent"));

        assert_ok!(h.client.pull_model("mistral"));
        h.settle().await;
        assert!(h.sink.contains("progress: -"));
        assert_eq!(h.log().last(), Some(&system("Failed to start download")));
    }

    #[tokio::test]
    async fn knowledge_uses_configured_source() {
        let mut h = Harness::started().await;
        h.client.add_knowledge("Rust is memory safe.", None).unwrap();
        h.client
            .add_knowledge("Tokio is an async runtime.", Some("handbook"))
            .unwrap();
        h.settle().await;

        let commands = h.server.commands();
        assert!(commands.contains(&Command::AddKnowledge {
            content: "Rust is memory safe.".to_string(),
            source: "web_interface".to_string(),
        }));
        assert!(commands.contains(&Command::AddKnowledge {
            content: "Tokio is an async runtime.".to_string(),
            source: "handbook".to_string(),
        }));
        assert!(h.sink.contains("info: Knowledge added successfully"));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_reconnects_after_server_restart() {
        let mut h = Harness::started().await;
        assert_eq!(h.channel.connects(), 1);

        h.channel.hang_up();
        h.settle().await;
        assert_eq!(h.client.connection_state(), ConnectionState::Reconnecting);
        assert!(h.client.reconnect_pending());
        assert!(h.sink.contains("error"));
        assert_eq!(h.channel.connects(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        h.settle().await;
        assert_eq!(h.channel.connects(), 2);
        assert_eq!(h.client.connection_state(), ConnectionState::Open);
        assert!(!h.client.reconnect_pending());

        // The new connection delivers answers like the old one.
        let session = h.client.ask("still there?").unwrap();
        h.settle().await;
        h.channel.push(&StreamEvent::answer(session, "yes"));
        h.settle().await;
        assert_eq!(h.log(), vec![user("still there?"), assistant("yes")]);
    }

    #[tokio::test]
    async fn shutdown_disconnects() {
        let mut h = Harness::started().await;
        h.client.shutdown();
        assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
        h.settle().await;
        assert!(!h.client.reconnect_pending());
    }
}
