//! HTTP client for the assistant endpoint.
//!
//! The server side of `/ai/ask` is opaque: the widget sends the typed text
//! together with the stored credential and gets back either pre-rendered
//! markup or an error string.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};

/// Header marking the request as programmatic rather than a page navigation.
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";

/// Request body sent to the assistant endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskRequest {
    /// Trimmed user text.
    pub text: String,
    /// Stored credential.
    pub api_key: String,
}

/// Response body returned by the assistant endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    /// Rendered markup on success.
    #[serde(default)]
    pub response: Option<String>,
    /// Error text on failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl AskResponse {
    /// Collapse the payload into the markup or the reported failure.
    pub fn into_result(self) -> Result<String> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(Error::Server(error));
        }
        self.response
            .ok_or_else(|| Error::Server("empty response".to_string()))
    }
}

/// Remote assistant.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Ask one question. Exactly one request is issued per call; there are no
    /// retries.
    async fn ask(&self, text: &str, api_key: &str) -> Result<String>;
}

/// [`AssistantClient`] talking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAssistantClient {
    ask_url: Url,
    http: reqwest::Client,
}

impl HttpAssistantClient {
    /// Create a client for `base_url` posting to `ask_path`.
    pub fn new(base_url: impl AsRef<str>, ask_path: &str) -> Result<Self> {
        Self::with_client(base_url, ask_path, reqwest::Client::new())
    }

    /// Create a client with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        ask_path: &str,
        http: reqwest::Client,
    ) -> Result<Self> {
        let ask_url = Url::parse(base_url.as_ref())?.join(ask_path)?;
        Ok(Self { ask_url, http })
    }

    /// Build a client from endpoint settings.
    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_client(&config.base_url, &config.ask_path, http)
    }

    /// Fully resolved endpoint URL.
    #[must_use]
    pub fn ask_url(&self) -> &Url {
        &self.ask_url
    }
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn ask(&self, text: &str, api_key: &str) -> Result<String> {
        let body = AskRequest {
            text: text.to_string(),
            api_key: api_key.to_string(),
        };

        let response = self
            .http
            .post(self.ask_url.clone())
            .header(REQUESTED_WITH_HEADER, "XMLHttpRequest")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), url = %self.ask_url, "Assistant responded");

        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let payload: AskResponse = response.json().await?;
        payload.into_result()
    }
}
