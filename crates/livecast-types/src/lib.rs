//! Shared types for the Livecast stream orchestration engine.
//!
//! Every crate in the workspace takes its cross-cutting definitions from
//! here: interrupt events and their priority policy, script segments, audio
//! chunks, viewer chat log entries, coordinator states and the stream events
//! broadcast to playback consumers. Nothing in this crate performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod audio;
mod message;
mod policy;
mod stream;

pub use audio::{AudioChunk, AudioKind, ChunkMeta, ScriptSegment, SynthesizedAudio};
pub use message::{ChatMessage, Gift, MessageKind, RevenueTotals};
pub use policy::{PriorityWeights, QueuePolicy};
pub use stream::{CoordinatorState, CredentialState, DegradeReason, StreamEvent};

/// The kind of audience event that can interrupt scripted narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    /// A plain chat message.
    Chat,
    /// A paid message pinned to the stream.
    Superchat,
    /// A gift sent to the streamer.
    Gift,
}

impl InterruptKind {
    /// Returns the canonical lower-case label stored in the queue.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Superchat => "superchat",
            Self::Gift => "gift",
        }
    }
}

impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InterruptKind {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "superchat" => Ok(Self::Superchat),
            "gift" => Ok(Self::Gift),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// Error returned when a stored label does not match a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label: {0}")]
pub struct ParseLabelError(pub String);

/// Lifecycle of an interrupt from receipt to disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptStatus {
    /// Waiting in the queue.
    Queued,
    /// Dequeued by the coordinator; its cycle has not finished yet.
    InService,
    /// The cycle completed and published a chunk.
    Serviced,
    /// The cycle completed without a published chunk, or with filler content.
    Degraded,
    /// Evicted or rejected by the queue overflow policy.
    Dropped,
}

impl InterruptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InService => "in_service",
            Self::Serviced => "serviced",
            Self::Degraded => "degraded",
            Self::Dropped => "dropped",
        }
    }
}

impl std::str::FromStr for InterruptStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_service" => Ok(Self::InService),
            "serviced" => Ok(Self::Serviced),
            "degraded" => Ok(Self::Degraded),
            "dropped" => Ok(Self::Dropped),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// An audience event competing with scripted narration for the next cycle.
///
/// Immutable once created. The `weight` is fixed at creation from the
/// [`PriorityWeights`] in force, so a later configuration change never
/// reorders events that are already queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptEvent {
    pub id: String,
    pub kind: InterruptKind,
    /// Persona key of the sender. May be empty for anonymous gifts.
    pub persona: String,
    pub message: String,
    /// Monetary value attached to a superchat or gift, if any.
    pub amount: Option<f64>,
    pub weight: i64,
    pub arrival_time: DateTime<Utc>,
}

impl InterruptEvent {
    /// Creates a new event stamped with a fresh id and the current time.
    pub fn new(
        kind: InterruptKind,
        persona: impl Into<String>,
        message: impl Into<String>,
        amount: Option<f64>,
        weights: &PriorityWeights,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            persona: persona.into(),
            message: message.into(),
            amount,
            weight: weights.weight_for(kind),
            arrival_time: Utc::now(),
        }
    }
}
