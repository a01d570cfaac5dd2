//! Transport for OpenAI-compatible chat completion calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::Value;

use crate::credentials::{ApiKey, MAX_COOLDOWN};
use crate::error::UpstreamError;

/// One chat completion round-trip with a given key.
///
/// Implementations classify failures into [`UpstreamError`] so the retry
/// loop can decide what to tell the credential rotator.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, api_key: &ApiKey, body: &Value) -> Result<Value, UpstreamError>;
}

/// HTTP backend posting to `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, api_key: &ApiKey, body: &Value) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs).min(MAX_COOLDOWN));
            return Err(UpstreamError::RateLimited { retry_after });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::InvalidCredential(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Transport(format!(
                "HTTP {status}: {}",
                truncate(&detail, 200)
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Returns `choices[0].message`, or `Malformed` if the response has none.
pub(crate) fn first_message(response: &Value) -> Result<&Value, UpstreamError> {
    response
        .pointer("/choices/0/message")
        .ok_or_else(|| UpstreamError::Malformed("response has no choices[0].message".into()))
}
