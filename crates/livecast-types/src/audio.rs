//! Script segments and the audio chunks produced from them.

use crate::InterruptKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a published chunk, derived from the trigger that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioKind {
    /// Organic scripted narration.
    General,
    Chat,
    Superchat,
    Gift,
}

impl AudioKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Chat => "chat",
            Self::Superchat => "superchat",
            Self::Gift => "gift",
        }
    }
}

impl From<Option<InterruptKind>> for AudioKind {
    fn from(kind: Option<InterruptKind>) -> Self {
        match kind {
            None => Self::General,
            Some(InterruptKind::Chat) => Self::Chat,
            Some(InterruptKind::Superchat) => Self::Superchat,
            Some(InterruptKind::Gift) => Self::Gift,
        }
    }
}

impl std::str::FromStr for AudioKind {
    type Err = crate::ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "chat" => Ok(Self::Chat),
            "superchat" => Ok(Self::Superchat),
            "gift" => Ok(Self::Gift),
            _ => Err(crate::ParseLabelError(s.to_string())),
        }
    }
}

/// One line of narration produced by the script generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub text: String,
    /// Set when the segment answers an interrupt; `None` for organic narration.
    pub source_event_id: Option<String>,
    pub persona: String,
    /// Assigned when the segment's audio chunk is published.
    pub sequence_no: Option<u64>,
}

impl ScriptSegment {
    pub fn new(text: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_event_id: None,
            persona: persona.into(),
            sequence_no: None,
        }
    }

    pub fn with_source(mut self, event_id: impl Into<String>) -> Self {
        self.source_event_id = Some(event_id.into());
        self
    }
}

/// Audio returned by the synthesizer, not yet placed in the stream order.
#[derive(Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub persona: String,
    pub mime_type: String,
    pub audio_bytes: Vec<u8>,
}

impl std::fmt::Debug for SynthesizedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedAudio")
            .field("persona", &self.persona)
            .field("mime_type", &self.mime_type)
            .field("audio_bytes", &format_args!("[{} bytes]", self.audio_bytes.len()))
            .finish()
    }
}

/// One unit of ordered audio output ready for playback. Immutable once created.
#[derive(Clone, PartialEq)]
pub struct AudioChunk {
    pub id: String,
    pub session_id: String,
    pub sequence_no: u64,
    pub persona: String,
    pub mime_type: String,
    pub audio_bytes: Vec<u8>,
    pub kind: AudioKind,
    pub transcript: String,
    pub source_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AudioChunk {
    /// Places synthesized audio at `sequence_no` within `session_id`.
    pub fn sequenced(
        session_id: &str,
        sequence_no: u64,
        segment: &ScriptSegment,
        kind: AudioKind,
        audio: SynthesizedAudio,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            sequence_no,
            persona: audio.persona,
            mime_type: audio.mime_type,
            audio_bytes: audio.audio_bytes,
            kind,
            transcript: segment.text.clone(),
            source_event_id: segment.source_event_id.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            sequence_no: self.sequence_no,
            persona: self.persona.clone(),
            mime_type: self.mime_type.clone(),
            kind: self.kind,
            transcript: self.transcript.clone(),
            source_event_id: self.source_event_id.clone(),
            byte_len: self.audio_bytes.len(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("sequence_no", &self.sequence_no)
            .field("persona", &self.persona)
            .field("mime_type", &self.mime_type)
            .field("audio_bytes", &format_args!("[{} bytes]", self.audio_bytes.len()))
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Chunk metadata without the audio payload, as listed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub id: String,
    pub session_id: String,
    pub sequence_no: u64,
    pub persona: String,
    pub mime_type: String,
    pub kind: AudioKind,
    pub transcript: String,
    pub source_event_id: Option<String>,
    pub byte_len: usize,
    pub created_at: DateTime<Utc>,
}
