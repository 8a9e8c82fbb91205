//! HTTP Backend Implementation
//!
//! Coach backend for the career coach REST API.
//!
//! # Coach API
//!
//! - `POST /chat/stream` - Streamed chat reply (`data: {json}` lines)
//! - `POST /chat/enhanced` - Complete chat reply in one JSON body
//! - `POST /tools/analyze_resume` - Resume feedback
//! - `POST /tools/mock_interview` - Interview questions for a position
//! - `POST /resources/career_guides/featured` - Career guide tips
//! - `GET /health` - Liveness and model availability

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::traits::{
    ByteStream, CareerGuides, ChatReply, ChatRequest, CoachBackend, HealthStatus,
    InterviewQuestions, ResumeAnalysis, TransportError,
};
use crate::config::ServerConfig;

/// HTTP coach backend
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// Base URL without trailing slash
    base_url: String,
    /// Whole-request timeout for non-streamed calls
    request_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend
    ///
    /// Only the connect phase is bounded on the shared client; a streamed
    /// reply may legitimately take minutes.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
            http_client,
        })
    }

    /// Create from the `[server]` config section
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Base URL this backend talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body and decode a JSON reply, bounded by the request timeout
    async fn post_json<B, R>(&self, path: &str, body: &B) -> anyhow::Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .http_client
            .post(&url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Coach API returned {status}: {body}");
        }

        response
            .json::<R>()
            .await
            .with_context(|| format!("Invalid JSON from {url}"))
    }
}

fn network_error(e: &reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

#[async_trait]
impl CoachBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn health(&self) -> anyhow::Result<HealthStatus> {
        let url = self.url("/health");
        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("Health check returned {}", response.status());
        }

        response
            .json::<HealthStatus>()
            .await
            .context("Invalid health response")
    }

    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, TransportError> {
        let url = self.url("/chat/stream");
        tracing::debug!(
            url = %url,
            history = request.conversation_history.len(),
            format = %request.format_preference,
            "Opening chat stream"
        );

        let pending = self.http_client.post(&url).json(request).send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Aborted),
            result = pending => result.map_err(|e| network_error(&e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::Aborted),
                text = response.text() => text.unwrap_or_default(),
            };
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| network_error(&e)))
            .boxed())
    }

    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatReply> {
        self.post_json("/chat/enhanced", request).await
    }

    async fn analyze_resume(&self, resume_text: &str) -> anyhow::Result<ResumeAnalysis> {
        let body = serde_json::json!({
            "resume_text": resume_text,
            "use_llm": true,
        });
        self.post_json("/tools/analyze_resume", &body).await
    }

    async fn mock_interview(&self, position: &str) -> anyhow::Result<InterviewQuestions> {
        let body = serde_json::json!({
            "position": position,
            "use_llm": true,
        });
        self.post_json("/tools/mock_interview", &body).await
    }

    async fn featured_guides(&self, query: &str, top_k: u32) -> anyhow::Result<CareerGuides> {
        let body = serde_json::json!({
            "query": query,
            "top_k": top_k,
            "use_llm": true,
        });
        self.post_json("/resources/career_guides/featured", &body)
            .await
    }
}
