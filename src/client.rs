use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::ClientConfig;
use crate::connection::{EventTransport, FrameStream};
use crate::dispatcher::CommandEndpoint;
use crate::error::{Error, Result};
use crate::sse::process_sse;
use crate::system::QueryEndpoint;
use crate::types::{
    Command, CommandAck, HistoryEntry, HistoryResponse, ModelList, PromptSet, ServerStatus,
    Statistics,
};

const EVENT_CHANNEL_PATH: &str = "api/chat_stream";

/// HTTP client for the assistant service.
///
/// One value serves all three of the client's seams: command endpoints, read-only queries and
/// the event channel.  Command and query calls share the configured timeout; the event channel
/// only bounds how long connecting may take, since it is meant to stay open indefinitely.
#[derive(Debug, Clone)]
pub struct AssistantApi {
    client: ReqwestClient,
    stream_client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl AssistantApi {
    /// Create a client for the server named in `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_options(&config.base_url, config.request_timeout)
    }

    /// Create a client with custom settings.
    pub fn with_options(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::url(format!("Invalid server URL {base_url:?}: {e}"), Some(e)))?;

        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        let stream_client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            stream_client,
            base_url,
            timeout,
        })
    }

    /// The service root.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::url(format!("Invalid endpoint path {path:?}: {e}"), Some(e)))
    }

    /// Create and return default headers for API requests.
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // The server reports failures as `{"error": "..."}`, occasionally as `{"message": ...}`.
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error.or(e.message))
            .unwrap_or_else(|| error_body.trim().to_string());

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_message),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "query");
        let response = self
            .client
            .get(url)
            .headers(Self::default_headers())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::read_json(response).await
    }

    /// Post a command and return the server's acknowledgement.
    pub async fn send(&self, command: &Command) -> Result<CommandAck> {
        let url = self.endpoint(&command.path())?;
        tracing::debug!(%url, kind = %command.kind(), "command");
        let response = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(&command.body())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::read_json(response).await
    }

    /// Open the event channel and return its record payloads.
    pub async fn stream(&self) -> Result<FrameStream> {
        let url = self.endpoint(EVENT_CHANNEL_PATH)?;
        tracing::debug!(%url, "opening event stream");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let response = self
            .stream_client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

#[async_trait]
impl CommandEndpoint for AssistantApi {
    async fn submit(&self, command: &Command) -> Result<CommandAck> {
        self.send(command).await
    }
}

#[async_trait]
impl EventTransport for AssistantApi {
    async fn connect(&self) -> Result<FrameStream> {
        self.stream().await
    }
}

#[async_trait]
impl QueryEndpoint for AssistantApi {
    async fn statistics(&self) -> Result<Statistics> {
        self.get("api/statistics").await
    }

    async fn models(&self) -> Result<ModelList> {
        self.get("api/models").await
    }

    async fn embedding_models(&self) -> Result<ModelList> {
        self.get("api/embedding_models").await
    }

    async fn prompts(&self) -> Result<PromptSet> {
        self.get("api/prompts").await
    }

    async fn chat_history(&self) -> Result<Vec<HistoryEntry>> {
        let response: HistoryResponse = self.get("api/chat_history").await?;
        Ok(response.history)
    }

    async fn status(&self) -> Result<ServerStatus> {
        self.get("api/status").await
    }
}
