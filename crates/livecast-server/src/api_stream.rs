//! Stream loop status.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json};
use livecast_types::CoordinatorState;
use livecast_voice::CredentialSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for `GET /api/v1/stream/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamStatusResponse {
    pub state: CoordinatorState,
    pub session_id: String,
    pub next_sequence: u64,
    pub cycles_completed: u64,
    pub chunks_published: u64,
    pub degraded_cycles: u64,
    /// `None` when the store cannot be reached.
    pub pending_interrupts: Option<usize>,
    pub default_persona: String,
    pub personas: Vec<String>,
    pub credentials: Vec<CredentialSnapshot>,
}

/// Handler for `GET /api/v1/stream/status`.
///
/// Reports an unreachable store as a missing pending count rather than an
/// error, so operators can still see the loop state while it is degraded.
pub async fn stream_status_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<StreamStatusResponse>, ApiError> {
    let status = state.coordinator.borrow().clone();

    let pending_interrupts = match state.queue.pending().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "could not count pending interrupts");
            None
        }
    };

    Ok(Json(StreamStatusResponse {
        state: status.state,
        session_id: status.session_id,
        next_sequence: status.next_sequence,
        cycles_completed: status.cycles_completed,
        chunks_published: status.chunks_published,
        degraded_cycles: status.degraded_cycles,
        pending_interrupts,
        default_persona: state.personas.default_key().to_string(),
        personas: state.personas.keys(),
        credentials: state.rotator.snapshot(),
    }))
}
