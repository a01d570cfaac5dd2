//! Persona audio synthesis through the voice model.

use async_trait::async_trait;
use base64::Engine as _;
use livecast_types::{ScriptSegment, SynthesizedAudio};
use serde_json::{json, Value};

use crate::backend::first_message;
use crate::error::{UpstreamError, VoiceError};
use crate::persona::Persona;
use crate::retry::UpstreamClient;

/// Renders a script segment in a persona's voice.
#[async_trait]
pub trait AudioSynthesizer: Send + Sync {
    /// A successful result always carries non-empty audio.
    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        persona: &Persona,
    ) -> Result<SynthesizedAudio, VoiceError>;
}

/// Voice-model sampling settings.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub model: String,
    pub max_completion_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
}

/// [`AudioSynthesizer`] that clones the persona's voice from its reference
/// recording.
pub struct ReferenceVoiceSynthesizer {
    upstream: UpstreamClient,
    settings: SynthesisSettings,
}

impl ReferenceVoiceSynthesizer {
    pub fn new(upstream: UpstreamClient, settings: SynthesisSettings) -> Self {
        Self { upstream, settings }
    }

    fn request_body(&self, segment: &ScriptSegment, persona: &Persona) -> Value {
        let reference_b64 =
            base64::engine::general_purpose::STANDARD.encode(&persona.reference_audio);
        let system_prompt = format!(
            "Generate audio following instruction. Speak consistently, naturally, and continuously.\n\
             <|scene_desc_start|>\n{}\n<|scene_desc_end|>",
            persona.scene_description
        );

        json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": persona.transcript},
                {
                    "role": "assistant",
                    "content": [{
                        "type": "input_audio",
                        "input_audio": {"data": reference_b64, "format": persona.reference_format},
                    }],
                },
                {"role": "user", "content": segment.text},
            ],
            "modalities": ["text", "audio"],
            "max_completion_tokens": self.settings.max_completion_tokens,
            "temperature": self.settings.temperature,
            "top_p": self.settings.top_p,
            "top_k": self.settings.top_k,
            "stream": false,
            "stop": ["<|eot_id|>", "<|end_of_text|>", "<|audio_eos|>"],
        })
    }
}

#[async_trait]
impl AudioSynthesizer for ReferenceVoiceSynthesizer {
    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        persona: &Persona,
    ) -> Result<SynthesizedAudio, VoiceError> {
        let body = self.request_body(segment, persona);
        let (mime_type, audio_bytes) = self.upstream.call("audio", &body, decode_audio).await?;

        tracing::debug!(
            persona = %persona.key,
            mime_type = %mime_type,
            bytes = audio_bytes.len(),
            "audio synthesized"
        );
        Ok(SynthesizedAudio {
            persona: persona.key.clone(),
            mime_type,
            audio_bytes,
        })
    }
}

/// Pulls base64 audio out of `choices[0].message.audio`. Empty audio is
/// rejected so it is retried like any other bad response.
fn decode_audio(response: &Value) -> Result<(String, Vec<u8>), UpstreamError> {
    let audio = &first_message(response)?["audio"];
    let data = audio
        .get("data")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| UpstreamError::Malformed("response did not include audio data".into()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| UpstreamError::Malformed(format!("audio is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(UpstreamError::Malformed("audio payload is empty".into()));
    }

    let mime_type = mime_type_for(
        audio.get("format").and_then(Value::as_str),
        audio.get("mime_type").and_then(Value::as_str),
    );
    Ok((mime_type, bytes))
}

/// `pcm` wins over an explicit mime type; bare formats become `audio/{format}`.
pub fn mime_type_for(format: Option<&str>, mime_type: Option<&str>) -> String {
    let format = format.map(str::trim).filter(|f| !f.is_empty());
    let mime_type = mime_type.map(str::trim).filter(|m| !m.is_empty());

    match (format, mime_type) {
        (Some(f), _) if f.eq_ignore_ascii_case("pcm") => "audio/pcm".to_string(),
        (_, Some(m)) => m.to_string(),
        (Some(f), None) if f.contains('/') => f.to_string(),
        (Some(f), None) => format!("audio/{f}"),
        (None, None) => "audio/wav".to_string(),
    }
}
