//! Upstream generation for Livecast: script text and persona audio.
//!
//! Both generators talk to an OpenAI-compatible chat completion endpoint
//! through [`UpstreamClient`], which owns the bounded retry loop. Every
//! attempt takes a key from the [`CredentialRotator`]; rate-limited keys
//! cool down, rejected keys are retired, and a pool with no usable key fails
//! fast with [`VoiceError::NoCredentialsAvailable`].
//!
//! [`ScriptGenerator`] and [`AudioSynthesizer`] are traits so the stream
//! coordinator and the HTTP layer can be driven by fakes in tests.

pub mod backend;
pub mod credentials;
pub mod error;
pub mod persona;
pub mod retry;
pub mod script;
pub mod tts;
pub mod wav;

pub use backend::{CompletionBackend, HttpBackend};
pub use credentials::{
    ApiKey, CredentialRotator, CredentialSnapshot, FailureReason, MAX_COOLDOWN,
};
pub use error::{UpstreamError, VoiceError};
pub use persona::{normalize_key, Persona, PersonaConfig, PersonaRegistry};
pub use retry::{RetryPolicy, UpstreamClient};
pub use script::{
    parse_script_line, LlmScriptGenerator, ScriptGenerator, ScriptSettings, DEFAULT_GIFT_PROMPT,
};
pub use tts::{AudioSynthesizer, ReferenceVoiceSynthesizer, SynthesisSettings};
