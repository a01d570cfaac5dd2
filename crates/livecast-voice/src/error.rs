use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the voice pipeline to its callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("no API credentials available: every key is cooling down or dead")]
    NoCredentialsAvailable,

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("persona not found: {0}")]
    PersonaNotFound(String),

    #[error("invalid voice configuration: {0}")]
    Config(String),
}

impl VoiceError {
    /// Whether the failure means no key could be used at all.
    pub fn is_credential_exhaustion(&self) -> bool {
        matches!(self, Self::NoCredentialsAvailable)
    }
}

/// Outcome of a single failed upstream attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    #[error("credential rejected by upstream: {0}")]
    InvalidCredential(String),

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}
