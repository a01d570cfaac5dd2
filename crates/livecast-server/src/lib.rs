//! Livecast server library logic.
//!
//! The HTTP surface only talks to the stream loop through the coordination
//! store (interrupts in, chunks out) and the read-only status and event
//! channels; it never touches narration history or the sequence counter.

pub mod api;
pub mod api_audio;
pub mod api_messages;
pub mod api_sse;
pub mod api_stream;
pub mod api_talk;
pub mod background;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use livecast_store::{ChunkStore, InterruptQueue, MessageLog};
use livecast_stream::CoordinatorStatus;
use livecast_types::StreamEvent;
use livecast_voice::{AudioSynthesizer, CredentialRotator, PersonaRegistry, ScriptGenerator};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use api_talk::TalkFallback;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Pending interrupts, shared with the stream loop.
    pub queue: InterruptQueue,
    /// Published audio, written only by the stream loop.
    pub chunks: ChunkStore,
    /// Viewer chat log.
    pub messages: MessageLog,
    /// Text generation used by `/talk`.
    pub script: Arc<dyn ScriptGenerator>,
    /// Voice synthesis used by `/talk`.
    pub synth: Arc<dyn AudioSynthesizer>,
    pub personas: Arc<PersonaRegistry>,
    /// Credential pool, for status reporting.
    pub rotator: Arc<CredentialRotator>,
    /// Stream events for SSE subscribers.
    pub events: broadcast::Sender<StreamEvent>,
    /// Latest coordinator status.
    pub coordinator: watch::Receiver<CoordinatorStatus>,
    /// What `/talk` says and plays when generation fails.
    pub talk_fallback: Arc<TalkFallback>,
    /// Turns true when the process starts shutting down. SSE streams end on it.
    pub shutdown: watch::Receiver<bool>,
}

/// Waits for `signal`, then flags shutdown to the stream loop and every open
/// SSE stream.
///
/// Meant for `axum::serve(..).with_graceful_shutdown`: the flag goes out
/// before the server starts waiting for connections to close, so a connected
/// playback consumer cannot hold the stream loop open.
pub async fn begin_shutdown<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = ()>,
{
    signal.await;
    if shutdown.send(true).is_err() {
        tracing::debug!("no shutdown listeners left");
    }
}

/// Maximum request body size (64 KiB). Requests carry short text only.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/talk", post(api_talk::talk_handler))
        .route("/talk/stream", post(api_talk::talk_stream_handler))
        .route("/api/v1/audio", get(api_audio::list_audio_handler))
        .route(
            "/api/v1/audio/interrupt",
            post(api_audio::enqueue_interrupt_handler),
        )
        .route(
            "/api/v1/audio/interrupt/{interruptId}",
            get(api_audio::interrupt_status_handler),
        )
        .route("/api/v1/audio/stream", get(api_sse::stream_events_handler))
        .route("/api/v1/audio/{chunkId}", get(api_audio::get_audio_handler))
        .route("/api/v1/stream/status", get(api_stream::stream_status_handler))
        .route(
            "/api/v1/messages",
            get(api_messages::list_messages_handler).post(api_messages::create_message_handler),
        )
        .route("/api/v1/revenue", get(api_messages::revenue_handler))
        .route("/api/v1/view-count", get(api_messages::view_count_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
