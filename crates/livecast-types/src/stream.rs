//! Coordinator state machine labels and stream-level events.

use crate::ChunkMeta;
use serde::{Deserialize, Serialize};

/// States of the stream loop coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorState {
    Idle,
    Selecting,
    GeneratingScript,
    GeneratingAudio,
    Publishing,
    Draining,
    Stopped,
}

impl CoordinatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Selecting => "SELECTING",
            Self::GeneratingScript => "GENERATING_SCRIPT",
            Self::GeneratingAudio => "GENERATING_AUDIO",
            Self::Publishing => "PUBLISHING",
            Self::Draining => "DRAINING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one API key in the credential pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Active,
    /// Suspended after a rate-limit signal until its cooldown elapses.
    Cooling,
    /// Rejected by the provider. Never selected again.
    Dead,
}

/// Why a cycle completed in degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// Script generation failed; a filler segment was spoken instead.
    ScriptFallback,
    /// Audio synthesis failed; nothing was published for the cycle.
    AudioFailed,
}

/// Events broadcast to playback consumers and operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    ChunkPublished {
        chunk: ChunkMeta,
    },
    CycleDegraded {
        reason: DegradeReason,
        interrupt_id: Option<String>,
    },
    /// Every API key is cooling or dead.
    CredentialsExhausted,
    /// The coordination store could not be reached.
    StoreUnavailable {
        operation: String,
    },
    StateChanged {
        state: CoordinatorState,
    },
}
