//! Command-line arguments for the chat front end.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;

/// Command-line arguments for the assistant-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ClientArgs {
    /// Root URL of the service.
    #[arrrg(optional, "Server URL (default: $ASSISTANT_SERVER_URL or http://localhost:8080/)", "URL")]
    pub server: Option<String>,

    /// Delay before reconnecting a failed event channel.
    #[arrrg(optional, "Reconnect delay in milliseconds (default: 5000)", "MILLIS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Timeout for command and query calls.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Source label for knowledge added without one.
    #[arrrg(optional, "Default knowledge source (default: web_interface)", "SOURCE")]
    pub source: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log at debug level.
    #[arrrg(flag, "Enable debug logging on stderr")]
    pub verbose: bool,
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        let mut config = ClientConfig::new();
        if let Some(server) = args.server {
            config = config.with_base_url(server);
        }
        if let Some(millis) = args.reconnect_delay_ms {
            config = config.with_reconnect_delay(Duration::from_millis(millis));
        }
        if let Some(secs) = args.timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(source) = args.source {
            config = config.with_knowledge_source(source);
        }
        if args.no_color {
            config = config.without_color();
        }
        config
    }
}
