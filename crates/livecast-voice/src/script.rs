//! Script generation through the text model.

use async_trait::async_trait;
use livecast_types::{InterruptEvent, InterruptKind, ScriptSegment};
use serde_json::{json, Value};

use crate::backend::first_message;
use crate::error::{UpstreamError, VoiceError};
use crate::persona::normalize_key;
use crate::retry::UpstreamClient;

/// Default trigger text for a gift sent without a message.
pub const DEFAULT_GIFT_PROMPT: &str =
    "A viewer just sent a gift during the livestream. React with excitement and keep the energy high!";

/// Produces the next narration line.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// `context` is the recent narration, oldest first. When `trigger` is
    /// set the line must react to it.
    async fn generate(
        &self,
        context: &[ScriptSegment],
        trigger: Option<&InterruptEvent>,
    ) -> Result<ScriptSegment, VoiceError>;
}

/// Text-model sampling settings.
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    pub model: String,
    pub default_persona: String,
    /// Scene description of the default persona, used to set the host's voice.
    pub streamer_scene: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// [`ScriptGenerator`] backed by an OpenAI-compatible chat model.
pub struct LlmScriptGenerator {
    upstream: UpstreamClient,
    settings: ScriptSettings,
}

impl LlmScriptGenerator {
    pub fn new(upstream: UpstreamClient, settings: ScriptSettings) -> Self {
        Self { upstream, settings }
    }

    fn request_body(&self, context: &[ScriptSegment], trigger: Option<&InterruptEvent>) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system_prompt(&self.settings)},
                {"role": "user", "content": user_prompt(context, trigger)},
            ],
            "stream": false,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        })
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate(
        &self,
        context: &[ScriptSegment],
        trigger: Option<&InterruptEvent>,
    ) -> Result<ScriptSegment, VoiceError> {
        let body = self.request_body(context, trigger);
        let text = self.upstream.call("script", &body, completion_text).await?;

        let (speaker, line) = split_speaker_tag(&text);
        if line.is_empty() {
            return Err(VoiceError::GenerationFailed(
                "text model returned an empty line".into(),
            ));
        }

        let persona = match speaker {
            Some(speaker) => normalize_key(speaker),
            None => match trigger {
                Some(event) if event.kind == InterruptKind::Superchat => {
                    normalize_key(&event.persona)
                }
                _ => normalize_key(&self.settings.default_persona),
            },
        };

        let mut segment = ScriptSegment::new(line, persona);
        if let Some(event) = trigger {
            segment = segment.with_source(&event.id);
        }
        tracing::debug!(
            persona = %segment.persona,
            chars = segment.text.len(),
            "script line generated"
        );
        Ok(segment)
    }
}

fn system_prompt(settings: &ScriptSettings) -> String {
    format!(
        "You write the live script for a livestream hosted by {host}.\n\
         Host persona: {scene}\n\
         Write exactly one spoken line, at most 40 words, in the host's voice unless \
         the situation calls for another speaker. Start the line with the speaker in \
         square brackets, for example [{host}]. No stage directions, no emojis.",
        host = settings.default_persona,
        scene = settings.streamer_scene.trim(),
    )
}

fn user_prompt(context: &[ScriptSegment], trigger: Option<&InterruptEvent>) -> String {
    let mut prompt = String::new();

    if context.is_empty() {
        prompt.push_str("The stream is just starting; nothing has been said yet.\n\n");
    } else {
        prompt.push_str("Speech so far:\n");
        for segment in context {
            prompt.push_str(&format!("[{}] {}\n", segment.persona, segment.text));
        }
        prompt.push('\n');
    }

    match trigger {
        None if context.is_empty() => {
            prompt.push_str("Open the stream with an energetic greeting to chat.");
        }
        None => prompt.push_str("Continue the narration naturally from the last line."),
        Some(event) => match event.kind {
            InterruptKind::Superchat => prompt.push_str(&format!(
                "A superchat from {} just came in: \"{}\". Write the next line reacting to it \
                 and name {} so chat knows it was seen.",
                event.persona, event.message, event.persona
            )),
            InterruptKind::Gift => {
                let message = if event.message.trim().is_empty() {
                    DEFAULT_GIFT_PROMPT
                } else {
                    event.message.as_str()
                };
                prompt.push_str(&format!(
                    "Gift alert from {}: {message} Thank them in the next line.",
                    event.persona
                ));
            }
            InterruptKind::Chat => prompt.push_str(&format!(
                "Chat message from {}: \"{}\". Respond to it briefly in the next line.",
                event.persona, event.message
            )),
        },
    }

    prompt
}

/// Parses a `[Speaker] text` script line. Untagged lines belong to
/// `default_persona`; blank lines yield `None`.
pub fn parse_script_line(line: &str, default_persona: &str) -> Option<ScriptSegment> {
    let (speaker, text) = split_speaker_tag(line);
    if text.is_empty() {
        return None;
    }
    let persona = normalize_key(speaker.unwrap_or(default_persona));
    Some(ScriptSegment::new(text, persona))
}

/// Extracts the completion text; content may be a string or a list of text parts.
fn completion_text(response: &Value) -> Result<String, UpstreamError> {
    let content = &first_message(response)?["content"];
    let text = match content {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(UpstreamError::Malformed("completion has no text".into()));
    }
    Ok(text)
}

/// Splits `[Speaker] line` into the speaker and the line. Only the first
/// non-empty line of the completion is kept.
fn split_speaker_tag(text: &str) -> (Option<&str>, String) {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    if let Some(rest) = line.strip_prefix('[') {
        if let Some((speaker, spoken)) = rest.split_once(']') {
            let speaker = speaker.trim();
            if !speaker.is_empty() {
                return (Some(speaker), spoken.trim().to_string());
            }
        }
    }
    (None, line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::{client, ScriptedBackend};
    use livecast_types::PriorityWeights;
    use std::sync::Arc;

    fn settings() -> ScriptSettings {
        ScriptSettings {
            model: "text-model".into(),
            default_persona: "speed".into(),
            streamer_scene: "extremely high energy".into(),
            max_tokens: 256,
            temperature: 0.7,
        }
    }

    fn reply(text: &str) -> Result<Value, UpstreamError> {
        Ok(json!({"choices": [{"message": {"role": "assistant", "content": text}}]}))
    }

    #[test]
    fn speaker_tag_is_split_off() {
        assert_eq!(
            split_speaker_tag("[Speed] Yo chat!"),
            (Some("Speed"), "Yo chat!".to_string())
        );
        assert_eq!(
            split_speaker_tag("\n  just talking\n[Speed] second"),
            (None, "just talking".to_string())
        );
        assert_eq!(split_speaker_tag("[] hmm"), (None, "[] hmm".to_string()));
    }

    #[test]
    fn script_lines_parse_with_default_speaker() {
        let tagged = parse_script_line("[Speed] Yo yo yo! We are LIVE!", "narrator").unwrap();
        assert_eq!(tagged.persona, "speed");
        assert_eq!(tagged.text, "Yo yo yo! We are LIVE!");

        let plain = parse_script_line("welcome in", "Chinese Trump").unwrap();
        assert_eq!(plain.persona, "chinese_trump");
        assert!(parse_script_line("   ", "speed").is_none());
    }

    #[test]
    fn prompt_mentions_trigger_and_history() {
        let weights = PriorityWeights::default();
        let event = InterruptEvent::new(
            InterruptKind::Superchat,
            "chinese_trump",
            "low energy stream",
            None,
            &weights,
        );
        let context = vec![ScriptSegment::new("We are live!", "speed")];
        let prompt = user_prompt(&context, Some(&event));
        assert!(prompt.contains("[speed] We are live!"));
        assert!(prompt.contains("chinese_trump"));
        assert!(prompt.contains("low energy stream"));

        let gift = InterruptEvent::new(InterruptKind::Gift, "fan", "", None, &weights);
        assert!(user_prompt(&[], Some(&gift)).contains(DEFAULT_GIFT_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn generates_segment_from_tagged_reply() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply(
            "[Chinese Trump] Speed, you call that energy? Sad!",
        )]));
        let generator = LlmScriptGenerator::new(client(&["k1"], backend.clone(), 2), settings());
        let event = InterruptEvent::new(
            InterruptKind::Superchat,
            "chinese_trump",
            "low energy",
            Some(5.0),
            &PriorityWeights::default(),
        );

        let segment = generator.generate(&[], Some(&event)).await.unwrap();
        assert_eq!(segment.persona, "chinese_trump");
        assert_eq!(segment.text, "Speed, you call that energy? Sad!");
        assert_eq!(segment.source_event_id.as_deref(), Some(event.id.as_str()));

        let body = &backend.bodies_seen.lock().unwrap()[0];
        assert_eq!(body["model"], "text-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("low energy"));
    }

    #[tokio::test(start_paused = true)]
    async fn untagged_reply_uses_default_persona() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("Let's keep going chat")]));
        let generator = LlmScriptGenerator::new(client(&["k1"], backend, 1), settings());

        let context = vec![ScriptSegment::new("We are live!", "speed")];
        let segment = generator.generate(&context, None).await.unwrap();
        assert_eq!(segment.persona, "speed");
        assert!(segment.source_event_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_completion_fails_generation() {
        let backend = Arc::new(ScriptedBackend::new(vec![reply("   "), reply("[Speed]   ")]));
        let generator = LlmScriptGenerator::new(client(&["k1"], backend.clone(), 1), settings());
        let err = generator.generate(&[], None).await.unwrap_err();
        assert!(matches!(err, VoiceError::GenerationFailed(_)));

        // A tag with nothing after it is empty too.
        let generator = LlmScriptGenerator::new(client(&["k1"], backend, 1), settings());
        let err = generator.generate(&[], None).await.unwrap_err();
        assert!(matches!(err, VoiceError::GenerationFailed(_)));
    }
}
