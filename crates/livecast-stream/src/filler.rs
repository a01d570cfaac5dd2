//! Canned lines used when the text model cannot produce one.

use livecast_types::{InterruptEvent, InterruptKind, ScriptSegment};
use livecast_voice::normalize_key;

const DEFAULT_LINES: &[&str] = &[
    "Chat, hold on one second, we are so back in a moment!",
    "Yo, stay with me chat, we keep it going!",
    "Let's go! Keep those messages coming in the chat!",
];

/// Rotates through filler lines. A line for an interrupt still names the
/// sender so the event is acknowledged.
#[derive(Debug, Clone)]
pub struct FillerLines {
    lines: Vec<String>,
    next: usize,
}

impl FillerLines {
    /// Uses built-in lines when `lines` has no non-blank entry.
    pub fn new(lines: Vec<String>) -> Self {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let lines = if lines.is_empty() {
            DEFAULT_LINES.iter().map(|l| l.to_string()).collect()
        } else {
            lines
        };
        Self { lines, next: 0 }
    }

    pub fn segment(
        &mut self,
        trigger: Option<&InterruptEvent>,
        default_persona: &str,
    ) -> ScriptSegment {
        let persona = normalize_key(default_persona);
        match trigger {
            Some(event) => {
                let text = match event.kind {
                    InterruptKind::Superchat => {
                        format!("Huge thanks for the superchat, {}!", event.persona)
                    }
                    InterruptKind::Gift => format!("Thank you for the gift, {}!", event.persona),
                    InterruptKind::Chat => format!("Shout out to {} in the chat!", event.persona),
                };
                ScriptSegment::new(text, persona).with_source(&event.id)
            }
            None => {
                let text = self.lines[self.next % self.lines.len()].clone();
                self.next = self.next.wrapping_add(1);
                ScriptSegment::new(text, persona)
            }
        }
    }
}
