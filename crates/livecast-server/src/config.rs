//! Server configuration loading from file and environment variables.

use livecast_types::QueuePolicy;
use livecast_voice::PersonaConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Text and voice model endpoint.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Stream loop settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Interrupt queue ordering and bounds.
    #[serde(default)]
    pub queue: QueuePolicy,

    /// Voice references, one entry per persona.
    #[serde(default)]
    pub personas: Vec<PersonaConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// How long a request waits for a pooled connection.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "livecast_stream=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// OpenAI-compatible completion endpoint used for both script and audio.
#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Comma-separated API keys.
    #[serde(default)]
    pub api_keys: String,

    /// Bound on a single upstream attempt.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Cooldown for a rate-limited key when the provider sends no `Retry-After`.
    #[serde(default = "default_cooldown_secs")]
    pub default_cooldown_secs: u64,

    /// How often cooled-down keys are returned to rotation.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Stream loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Persona that narrates when nothing else is speaking.
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// How many recent segments the text model sees.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Lines spoken when the text model cannot produce one.
    #[serde(default)]
    pub filler_lines: Vec<String>,

    /// `[Speaker] text` lines that open the narration.
    #[serde(default = "default_opening_context")]
    pub opening_context: Vec<String>,

    /// Audio returned by `/talk` when synthesis fails.
    #[serde(default)]
    pub fallback_audio_path: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "livecast.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_connection_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://hackathon.boson.ai/v1".to_string()
}

fn default_text_model() -> String {
    "Qwen3-32B-non-thinking-Hackathon".to_string()
}

fn default_tts_model() -> String {
    "higgs-audio-generation-Hackathon".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    5
}

fn default_persona() -> String {
    "speed".to_string()
}

fn default_history_limit() -> usize {
    12
}

fn default_cycle_interval_ms() -> u64 {
    500
}

fn default_opening_context() -> Vec<String> {
    vec![
        "[Speed] Yo yo yo! We are LIVE! What's good, chat! It's your boy, Speed!".to_string(),
        concat!(
            "[Speed] Y'all sent me this paper, \"Attention Is All You Need.\" ",
            "Bro, they finally get it! They wrote a paper about me!"
        )
        .to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            tts_model: default_tts_model(),
            api_keys: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            default_cooldown_secs: default_cooldown_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key_count = self
            .api_keys
            .split(',')
            .filter(|k| !k.trim().is_empty())
            .count();
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("tts_model", &self.tts_model)
            .field("api_keys", &format_args!("<{key_count} redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .field("default_cooldown_secs", &self.default_cooldown_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
            history_limit: default_history_limit(),
            cycle_interval_ms: default_cycle_interval_ms(),
            filler_lines: Vec::new(),
            opening_context: default_opening_context(),
            fallback_audio_path: None,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Rejects values the stream loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.default_persona.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "stream.default_persona must not be empty".to_string(),
            ));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue.capacity must be at least 1".to_string(),
            ));
        }
        if self.upstream.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "upstream.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "upstream.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.database.pool_max_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_max_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `LIVECAST_HOST` overrides `server.host`
/// - `LIVECAST_PORT` overrides `server.port`
/// - `LIVECAST_DB_PATH` overrides `database.path`
/// - `LIVECAST_LOG_LEVEL` overrides `logging.level`
/// - `LIVECAST_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `LIVECAST_API_KEYS` overrides `upstream.api_keys`
/// - `LIVECAST_BASE_URL` overrides `upstream.base_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the merged configuration fails [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("LIVECAST_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("LIVECAST_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("LIVECAST_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("LIVECAST_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("LIVECAST_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(keys) = var("LIVECAST_API_KEYS") {
        config.upstream.api_keys = keys;
    }
    if let Some(base_url) = var("LIVECAST_BASE_URL") {
        config.upstream.base_url = base_url;
    }
}
