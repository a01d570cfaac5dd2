//! Ad-hoc generation outside the stream loop.
//!
//! `/talk` runs one script + audio pass and returns the result directly. It
//! never writes to the chunk store: sequence numbers belong to the stream
//! loop alone.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use base64::Engine as _;
use livecast_stream::FillerLines;
use livecast_types::{ScriptSegment, SynthesizedAudio};
use livecast_voice::{parse_script_line, tts::mime_type_for, wav, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Request body for `/talk` and `/talk/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct TalkRequest {
    /// Text to speak instead of a generated line.
    #[serde(default)]
    pub script: Option<String>,
}

/// Response body for `/talk`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TalkResponse {
    pub script: String,
    pub audio_base64: String,
    pub mime_type: String,
}

/// Content used when `/talk` generation fails for a reason other than
/// credential exhaustion.
pub struct TalkFallback {
    filler: Mutex<FillerLines>,
    audio: Option<SynthesizedAudio>,
}

impl TalkFallback {
    pub fn new(filler_lines: Vec<String>, audio: Option<SynthesizedAudio>) -> Self {
        Self {
            filler: Mutex::new(FillerLines::new(filler_lines)),
            audio,
        }
    }

    /// Reads the configured fallback recording. An unreadable file is logged
    /// and replaced by generated silence.
    pub fn load(filler_lines: Vec<String>, audio_path: Option<&Path>, persona: &str) -> Self {
        let audio = audio_path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => {
                let format = path.extension().and_then(|e| e.to_str());
                tracing::info!(
                    path = %path.display(),
                    bytes = bytes.len(),
                    "loaded fallback audio"
                );
                Some(SynthesizedAudio {
                    persona: persona.to_string(),
                    mime_type: mime_type_for(format, None),
                    audio_bytes: bytes,
                })
            }
            Ok(_) => {
                tracing::warn!(
                    path = %path.display(),
                    "fallback audio file is empty, using silence"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "could not read fallback audio, using silence"
                );
                None
            }
        });
        Self::new(filler_lines, audio)
    }

    fn line(&self, default_persona: &str) -> ScriptSegment {
        self.filler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .segment(None, default_persona)
    }

    fn audio(&self, persona: &str) -> SynthesizedAudio {
        match &self.audio {
            Some(audio) => audio.clone(),
            None => SynthesizedAudio {
                persona: persona.to_string(),
                mime_type: "audio/wav".to_string(),
                audio_bytes: wav::silence(1_000),
            },
        }
    }
}

/// A single-line override may carry a `[Speaker]` tag; longer scripts are
/// spoken as written by the default persona.
fn override_segment(script: &str, default_persona: &str) -> Option<ScriptSegment> {
    let script = script.trim();
    if script.is_empty() {
        return None;
    }
    if script.lines().filter(|l| !l.trim().is_empty()).count() == 1 {
        return parse_script_line(script, default_persona);
    }
    Some(ScriptSegment::new(script, default_persona))
}

async fn run_talk(
    state: &AppState,
    request: TalkRequest,
) -> Result<(String, SynthesizedAudio), ApiError> {
    let default_persona = state.personas.default_key().to_string();

    let segment = match request
        .script
        .as_deref()
        .and_then(|s| override_segment(s, &default_persona))
    {
        Some(segment) => segment,
        None => match state.script.generate(&[], None).await {
            Ok(segment) => segment,
            Err(VoiceError::NoCredentialsAvailable) => {
                tracing::warn!("talk request rejected: no upstream credentials available");
                return Err(VoiceError::NoCredentialsAvailable.into());
            }
            Err(e) => {
                tracing::warn!(error = %e, "talk script generation failed, using filler");
                state.talk_fallback.line(&default_persona)
            }
        },
    };

    let synthesized = match state.personas.resolve(&segment.persona) {
        Ok(persona) => state.synth.synthesize(&segment, &persona).await,
        Err(e) => Err(e),
    };
    let audio = match synthesized {
        Ok(audio) => audio,
        Err(VoiceError::NoCredentialsAvailable) => {
            tracing::warn!("talk request rejected: no upstream credentials available");
            return Err(VoiceError::NoCredentialsAvailable.into());
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                persona = %segment.persona,
                "talk synthesis failed, using fallback audio"
            );
            state.talk_fallback.audio(&segment.persona)
        }
    };

    tracing::info!(
        persona = %audio.persona,
        bytes = audio.audio_bytes.len(),
        "talk request served"
    );
    Ok((segment.text, audio))
}

/// Handler for `POST /talk`.
pub async fn talk_handler(
    Extension(state): Extension<Arc<AppState>>,
    request: Option<Json<TalkRequest>>,
) -> Result<Json<TalkResponse>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let (script, audio) = run_talk(&state, request).await?;

    Ok(Json(TalkResponse {
        script,
        audio_base64: base64::engine::general_purpose::STANDARD.encode(&audio.audio_bytes),
        mime_type: audio.mime_type,
    }))
}

/// Handler for `POST /talk/stream`.
///
/// Returns the raw audio; the spoken text travels in `X-Generated-Script`.
pub async fn talk_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    request: Option<Json<TalkRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let (script, audio) = run_talk(&state, request).await?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&audio.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("audio/wav"));
    headers.insert(header::CONTENT_TYPE, content_type);
    // Header values must be visible ASCII; line breaks are folded to spaces.
    let header_script: String = script
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect();
    if let Ok(value) = HeaderValue::from_str(&header_script) {
        headers.insert("x-generated-script", value);
    }

    Ok((headers, audio.audio_bytes))
}
