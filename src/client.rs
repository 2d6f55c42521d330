use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, header};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    EXCHANGE_DECODE_ERRORS, EXCHANGE_DURATION, EXCHANGE_PROTOCOL_ERRORS, EXCHANGE_REQUESTS,
    EXCHANGE_TRANSPORT_ERRORS,
};
use crate::types::{ChatReply, ChatRequest};

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const CHAT_PATH: &str = "chat";

/// One request/response round trip with the assistant.
///
/// [`ChatClient`] is the production implementation; the session only depends
/// on this trait so that it can be driven without a network.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `request` and returns the decoded reply.
    ///
    /// # Errors
    ///
    /// Transport failures, non-success statuses, and undecodable bodies are
    /// all reported as errors.
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply>;
}

/// HTTP client for the `/chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl ChatClient {
    /// Create a client for the endpoint rooted at `base_url`.
    ///
    /// No client-side timeout is imposed; the transport decides when to give
    /// up.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a client with custom settings.
    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = chat_endpoint(base_url)?;

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Create a client that reuses an already-configured HTTP client.
    ///
    /// Use this to control proxies, TLS or timeouts beyond what
    /// [`with_options`](Self::with_options) exposes.
    pub fn with_http_client(base_url: &str, client: ReqwestClient) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: chat_endpoint(base_url)?,
            timeout: None,
        })
    }

    /// The fully-qualified URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create and return default headers for chat requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Post one query and decode the reply.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        EXCHANGE_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(request).await;
        EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            if err.is_transport() {
                EXCHANGE_TRANSPORT_ERRORS.click();
            } else if err.is_protocol() {
                EXCHANGE_PROTOCOL_ERRORS.click();
            } else if err.is_decode() {
                EXCHANGE_DECODE_ERRORS.click();
            }
        }
        result
    }

    async fn send_inner(&self, request: &ChatRequest) -> Result<ChatReply> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), body));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        ChatReply::from_slice(&body)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ChatClient {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.send(request).await
    }
}

/// Resolve `{base_url}/chat`, tolerating a trailing slash on the base.
fn chat_endpoint(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url.trim())?;
    match base.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::validation(
                format!("unsupported URL scheme {other:?}; expected http or https"),
                Some("api_url".to_string()),
            ));
        }
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(CHAT_PATH)?)
}
