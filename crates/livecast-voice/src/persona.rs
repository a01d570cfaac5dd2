//! Persona voice references.
//!
//! A persona is immutable once loaded. Lookups normalise the key
//! (lower-case, spaces to underscores) and fall back to the default
//! narrating persona when the key is unknown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

const DEFAULT_SCENE_DESCRIPTION: &str =
    "The speaker talks naturally and clearly. The recording is in a quiet room with no music.";

/// Persona entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub key: String,
    /// Path to a reference recording of the voice.
    pub reference_audio: PathBuf,
    /// What is said in the reference recording.
    pub transcript: String,
    #[serde(default)]
    pub scene_description: Option<String>,
}

/// A loaded persona.
#[derive(Clone, PartialEq)]
pub struct Persona {
    pub key: String,
    pub reference_audio: Vec<u8>,
    /// Audio format label sent alongside the reference, e.g. `wav`.
    pub reference_format: String,
    pub transcript: String,
    pub scene_description: String,
}

impl std::fmt::Debug for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persona")
            .field("key", &self.key)
            .field(
                "reference_audio",
                &format_args!("[{} bytes]", self.reference_audio.len()),
            )
            .field("reference_format", &self.reference_format)
            .finish_non_exhaustive()
    }
}

impl Persona {
    /// Reads the reference recording from disk.
    pub fn load(config: &PersonaConfig) -> Result<Self, VoiceError> {
        let reference_audio = std::fs::read(&config.reference_audio).map_err(|e| {
            VoiceError::Config(format!(
                "reference audio for persona '{}' unreadable at {}: {e}",
                config.key,
                config.reference_audio.display()
            ))
        })?;

        Ok(Self {
            key: normalize_key(&config.key),
            reference_audio,
            reference_format: format_from_path(&config.reference_audio),
            transcript: config.transcript.trim().to_string(),
            scene_description: config
                .scene_description
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SCENE_DESCRIPTION)
                .to_string(),
        })
    }
}

/// Lower-cases a persona name and replaces spaces with underscores.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn format_from_path(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "wav".to_string())
}

/// Personas by normalised key, plus the default narrator.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: HashMap<String, Arc<Persona>>,
    default_key: String,
}

impl PersonaRegistry {
    pub fn new(default_key: &str) -> Self {
        Self {
            personas: HashMap::new(),
            default_key: normalize_key(default_key),
        }
    }

    /// Loads every configured persona.
    ///
    /// A persona whose reference audio cannot be read is skipped with an
    /// error log; requests for it resolve to the default persona instead.
    pub fn load(configs: &[PersonaConfig], default_key: &str) -> Self {
        let mut registry = Self::new(default_key);
        for config in configs {
            match Persona::load(config) {
                Ok(persona) => {
                    tracing::info!(
                        persona = %persona.key,
                        format = %persona.reference_format,
                        "persona loaded"
                    );
                    registry.insert(persona);
                }
                Err(e) => tracing::error!(persona = %config.key, error = %e, "skipping persona"),
            }
        }
        if !registry.contains(&registry.default_key) {
            tracing::warn!(
                default_persona = %registry.default_key,
                "default persona is not loaded; synthesis for unknown personas will fail"
            );
        }
        registry
    }

    pub fn insert(&mut self, persona: Persona) {
        self.personas.insert(persona.key.clone(), Arc::new(persona));
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn contains(&self, key: &str) -> bool {
        self.personas.contains_key(&normalize_key(key))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.personas.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Looks up a persona, falling back to the default narrator.
    pub fn resolve(&self, key: &str) -> Result<Arc<Persona>, VoiceError> {
        let normalized = normalize_key(key);
        if let Some(persona) = self.personas.get(&normalized) {
            return Ok(Arc::clone(persona));
        }
        if let Some(persona) = self.personas.get(&self.default_key) {
            if !normalized.is_empty() {
                tracing::debug!(
                    requested = %normalized,
                    fallback = %self.default_key,
                    "unknown persona, using default"
                );
            }
            return Ok(Arc::clone(persona));
        }
        Err(VoiceError::PersonaNotFound(key.to_string()))
    }

    /// The default persona's scene description, if it is loaded.
    pub fn default_scene(&self) -> Option<&str> {
        self.personas
            .get(&self.default_key)
            .map(|p| p.scene_description.as_str())
    }
}

#[cfg(test)]
pub(crate) fn test_persona(key: &str) -> Persona {
    Persona {
        key: key.to_string(),
        reference_audio: vec![82, 73, 70, 70],
        reference_format: "wav".to_string(),
        transcript: format!("this is how {key} sounds"),
        scene_description: format!("{key} is very loud"),
    }
}
