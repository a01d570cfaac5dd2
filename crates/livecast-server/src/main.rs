//! Livecast server binary: the stream loop plus its HTTP surface.
//!
//! Starts the stream coordinator and an axum HTTP server with structured
//! logging and database initialization. On SIGTERM/SIGINT the coordinator
//! starts draining and open SSE streams end right away; the server then stops
//! accepting requests, the in-flight cycle finishes, and the process exits.

use livecast_server::{app, background, begin_shutdown, config, AppState, TalkFallback};
use livecast_store::{ChunkStore, InterruptQueue, MessageLog};
use livecast_stream::{Coordinator, CoordinatorConfig, CoordinatorDeps};
use livecast_voice::{
    CredentialRotator, HttpBackend, LlmScriptGenerator, PersonaRegistry,
    ReferenceVoiceSynthesizer, RetryPolicy, ScriptSettings, SynthesisSettings, UpstreamClient,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;

/// Buffered stream events per SSE subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

const FALLBACK_STREAMER_SCENE: &str =
    "The tone is extremely high-energy and excited. The speaker talks fast and loudly.";

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("LIVECAST_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    tracing::debug!(upstream = ?config.upstream, "upstream configuration");

    // Initialize database
    let pool = livecast_db::create_pool(
        &config.database.path,
        livecast_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
            connection_timeout_ms: config.database.connection_timeout_ms,
        },
    )
    .expect("failed to create database pool; check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            livecast_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Voice components
    let personas = Arc::new(PersonaRegistry::load(
        &config.personas,
        &config.stream.default_persona,
    ));

    let rotator = Arc::new(CredentialRotator::from_comma_separated(
        &config.upstream.api_keys,
        Duration::from_secs(config.upstream.default_cooldown_secs),
    ));
    if rotator.is_empty() {
        tracing::warn!("no upstream API keys configured; every cycle will use filler content");
    } else {
        tracing::info!(keys = rotator.len(), "credential pool ready");
    }

    let request_timeout = Duration::from_millis(config.upstream.request_timeout_ms);
    let backend = HttpBackend::new(&config.upstream.base_url, request_timeout)
        .expect("failed to build upstream HTTP client");
    tracing::info!(endpoint = backend.endpoint(), "upstream endpoint configured");

    let upstream = UpstreamClient::new(
        Arc::clone(&rotator),
        Arc::new(backend),
        RetryPolicy {
            max_attempts: config.upstream.max_attempts,
            backoff_base: Duration::from_millis(config.upstream.backoff_base_ms),
            backoff_max: Duration::from_millis(config.upstream.backoff_max_ms),
            attempt_timeout: request_timeout,
        },
    );

    let script = Arc::new(LlmScriptGenerator::new(
        upstream.clone(),
        ScriptSettings {
            model: config.upstream.text_model.clone(),
            default_persona: personas.default_key().to_string(),
            streamer_scene: personas
                .default_scene()
                .unwrap_or(FALLBACK_STREAMER_SCENE)
                .to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        },
    ));
    let synth = Arc::new(ReferenceVoiceSynthesizer::new(
        upstream,
        SynthesisSettings {
            model: config.upstream.tts_model.clone(),
            max_completion_tokens: 1024,
            temperature: 1.0,
            top_p: 0.95,
            top_k: 50,
        },
    ));

    // Coordination store and stream loop
    let queue = InterruptQueue::new(pool.clone(), config.queue.clone());
    let chunks = ChunkStore::new(pool.clone());
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let session_id = uuid::Uuid::new_v4().to_string();

    let coordinator = Coordinator::new(
        CoordinatorDeps {
            queue: queue.clone(),
            chunks: chunks.clone(),
            script: script.clone(),
            synth: synth.clone(),
            personas: Arc::clone(&personas),
            events: events.clone(),
        },
        CoordinatorConfig {
            session_id: session_id.clone(),
            default_persona: personas.default_key().to_string(),
            history_limit: config.stream.history_limit,
            cycle_interval: Duration::from_millis(config.stream.cycle_interval_ms),
            opening_context: config.stream.opening_context.clone(),
            filler_lines: config.stream.filler_lines.clone(),
        },
    );
    let coordinator_status = coordinator.status();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator_task = tokio::spawn(coordinator.run(shutdown_rx.clone()));
    tracing::info!(session_id = %session_id, "stream session started");

    tokio::spawn(background::start_credential_sweep_task(
        Arc::clone(&rotator),
        config.upstream.sweep_interval_secs,
    ));

    let talk_fallback = Arc::new(TalkFallback::load(
        config.stream.filler_lines.clone(),
        config.stream.fallback_audio_path.as_deref().map(Path::new),
        personas.default_key(),
    ));

    // Build application
    let state = AppState {
        queue,
        chunks,
        messages: MessageLog::new(pool),
        script,
        synth,
        personas,
        rotator,
        events,
        coordinator: coordinator_status,
        talk_fallback,
        shutdown: shutdown_rx,
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting livecast server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(begin_shutdown(shutdown_signal(), shutdown_tx))
        .await
        .expect("server error");

    // Let the in-flight cycle finish before exiting.
    match coordinator_task.await {
        Ok(status) => tracing::info!(
            state = %status.state,
            chunks = status.chunks_published,
            degraded_cycles = status.degraded_cycles,
            "stream loop drained"
        ),
        Err(e) => tracing::error!("stream loop task join error: {}", e),
    }

    tracing::info!("livecast server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
