//! Resolved client configuration.

use std::env;
use std::time::Duration;

use crate::types::DEFAULT_KNOWLEDGE_SOURCE;

/// Environment variable naming the server to talk to.
pub const SERVER_URL_ENV: &str = "ASSISTANT_SERVER_URL";

/// Server used when neither flags nor environment name one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/";

/// Delay between an event channel failure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Timeout for command and query calls.  The event channel has no overall timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Text of the placeholder shown while an answer is generated.
pub const DEFAULT_PLACEHOLDER: &str = "Processing request...";

/// Configuration for an [`AssistantClient`](crate::AssistantClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root URL of the service.
    pub base_url: String,

    /// Delay before reconnecting a failed event channel.
    pub reconnect_delay: Duration,

    /// Timeout for command and query calls.
    pub request_timeout: Duration,

    /// Source label for knowledge added without one.
    pub knowledge_source: String,

    /// Placeholder text shown while an answer is generated.
    pub placeholder: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ClientConfig {
    /// Creates a new ClientConfig with default values.
    ///
    /// The server URL comes from `ASSISTANT_SERVER_URL` when set.
    pub fn new() -> Self {
        let base_url = env::var(SERVER_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self {
            base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            knowledge_source: DEFAULT_KNOWLEDGE_SOURCE.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            use_color: true,
        }
    }

    /// Sets the server URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the default knowledge source.
    pub fn with_knowledge_source(mut self, source: impl Into<String>) -> Self {
        self.knowledge_source = source.into();
        self
    }

    /// Sets the placeholder text.
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
