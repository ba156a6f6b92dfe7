//! HTTP transport to the backend agent endpoints.
//!
//! Each category is served by `POST {base_url}/api/run/{agent}`, which takes
//! a multipart form (optional `file` part, optional `prompt` field) and
//! answers with an [`AgentResponse`] JSON body.

use crate::models::{AgentResponse, Category};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failures surfaced in a category's output pane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The request never produced a response.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The backend answered with `ok: false`.
    #[error("{0}")]
    Backend(String),

    /// The response body was not the expected JSON.
    #[error("Invalid response from {url} (HTTP {status}): {message}")]
    Decode {
        url: String,
        status: u16,
        message: String,
    },

    /// The file to upload could not be read.
    #[error("Failed to read {path}: {message}")]
    Upload { path: String, message: String },
}

/// Form payload submitted for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSubmission {
    /// File to upload as the `file` part.
    pub file: Option<PathBuf>,
    /// Optional free-form instruction for the agent.
    pub prompt: Option<String>,
}

/// Seam between the runner and the network.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Submit one category's form and return the decoded response.
    async fn submit(
        &self,
        category: Category,
        submission: &AgentSubmission,
    ) -> Result<AgentResponse, AgentError>;
}

/// Settings for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// No timeout is applied when `None`.
    pub timeout_seconds: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_seconds: None,
        }
    }
}

/// reqwest-backed transport.
pub struct HttpAgentClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl HttpAgentClient {
    /// Create a client for the given backend.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;

        info!("Agent endpoints at {}", config.base_url);
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Endpoint URL of a category.
    pub fn endpoint(&self, category: Category) -> String {
        format!(
            "{}/api/run/{}",
            self.config.base_url.trim_end_matches('/'),
            category.as_str()
        )
    }

    async fn build_form(&self, submission: &AgentSubmission) -> Result<Form, AgentError> {
        let mut form = Form::new();

        if let Some(ref path) = submission.file {
            let bytes = tokio::fs::read(path).await.map_err(|e| AgentError::Upload {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            debug!("Attaching {} ({} bytes)", file_name, bytes.len());
            form = form.part("file", Part::bytes(bytes).file_name(file_name));
        }

        if let Some(ref prompt) = submission.prompt {
            if !prompt.trim().is_empty() {
                form = form.text("prompt", prompt.clone());
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl AgentTransport for HttpAgentClient {
    async fn submit(
        &self,
        category: Category,
        submission: &AgentSubmission,
    ) -> Result<AgentResponse, AgentError> {
        let url = self.endpoint(category);
        let form = self.build_form(submission).await?;

        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!(
                        "timed out after {}s",
                        self.config.timeout_seconds.unwrap_or_default()
                    )
                } else if e.is_connect() {
                    "cannot connect. Is the SmartOps server running?".to_string()
                } else {
                    e.to_string()
                };
                AgentError::Transport {
                    url: url.clone(),
                    message,
                }
            })?;

        // The backend reports logical failures as JSON on 4xx/5xx too.
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| AgentError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        decode_response(&url, status, &body)
    }
}

/// Decode a response body, mapping `ok: false` to [`AgentError::Backend`].
pub fn decode_response(url: &str, status: u16, body: &str) -> Result<AgentResponse, AgentError> {
    let response: AgentResponse =
        serde_json::from_str(body).map_err(|e| AgentError::Decode {
            url: url.to_string(),
            status,
            message: e.to_string(),
        })?;

    if !response.ok {
        let message = response
            .error
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(AgentError::Backend(message));
    }

    Ok(response)
}
