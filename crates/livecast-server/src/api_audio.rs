//! Interrupt intake and published audio retrieval.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use base64::Engine as _;
use livecast_store::{ChunkFilter, EnqueueOutcome};
use livecast_types::{AudioKind, ChunkMeta, InterruptEvent, InterruptKind, InterruptStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default page size for chunk listings.
const DEFAULT_LIST_LIMIT: i64 = 100;
/// Largest page a single listing may return.
const MAX_LIST_LIMIT: i64 = 1_000;

/// Request body for `POST /api/v1/audio/interrupt`.
#[derive(Debug, Deserialize)]
pub struct InterruptRequest {
    /// `superchat`, `gift` or `chat`.
    pub kind: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Monetary value of a superchat or gift.
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Acknowledgement for an accepted interrupt. The audio arrives later
/// through the chunk listing and the event stream.
#[derive(Debug, Serialize, Deserialize)]
pub struct InterruptAck {
    pub interrupt_id: String,
    pub kind: InterruptKind,
    /// `queued` or `dropped`.
    pub status: InterruptStatus,
    /// Chat evicted to make room for this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicted: Option<String>,
}

/// Response body for `GET /api/v1/audio/interrupt/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InterruptStatusResponse {
    pub interrupt_id: String,
    pub status: InterruptStatus,
}

/// Query parameters for `GET /api/v1/audio`.
#[derive(Debug, Default, Deserialize)]
pub struct ListAudioParams {
    /// Only chunks with a sequence number greater than this.
    pub after: Option<u64>,
    pub limit: Option<i64>,
    pub kind: Option<String>,
    /// Defaults to the running session.
    pub session_id: Option<String>,
}

/// Response body for `GET /api/v1/audio`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListAudioResponse {
    pub session_id: String,
    pub chunks: Vec<ChunkMeta>,
    /// Cursor for the next page, when this page is not empty.
    pub next_after: Option<u64>,
}

/// Response body for `GET /api/v1/audio/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioChunkResponse {
    #[serde(flatten)]
    pub meta: ChunkMeta,
    pub audio_base64: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Checks the per-kind rules and builds the event.
fn validate_interrupt(
    request: &InterruptRequest,
    state: &AppState,
) -> Result<InterruptEvent, ApiError> {
    let kind: InterruptKind = request
        .kind
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown interrupt kind: {}", request.kind)))?;

    let persona = non_empty(request.persona.as_deref());
    let message = non_empty(request.message.as_deref());

    match kind {
        InterruptKind::Superchat => {
            if persona.is_none() {
                return Err(ApiError::BadRequest(
                    "superchat requires a persona".to_string(),
                ));
            }
            if message.is_none() {
                return Err(ApiError::BadRequest(
                    "superchat requires a message".to_string(),
                ));
            }
        }
        InterruptKind::Chat => {
            if message.is_none() {
                return Err(ApiError::BadRequest("chat requires a message".to_string()));
            }
        }
        // An empty gift message is replaced by the default gift prompt at generation time.
        InterruptKind::Gift => {}
    }

    if let Some(amount) = request.amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ApiError::BadRequest(
                "amount must be a non-negative number".to_string(),
            ));
        }
    }

    Ok(InterruptEvent::new(
        kind,
        persona.unwrap_or_default(),
        message.unwrap_or_default(),
        request.amount,
        &state.queue.policy().weights,
    ))
}

/// Handler for `POST /api/v1/audio/interrupt`.
pub async fn enqueue_interrupt_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<InterruptRequest>,
) -> Result<(StatusCode, Json<InterruptAck>), ApiError> {
    let event = validate_interrupt(&payload, &state)?;
    let interrupt_id = event.id.clone();
    let kind = event.kind;

    let outcome = state.queue.enqueue(event).await?;

    let (status, evicted) = match outcome {
        EnqueueOutcome::Queued => (InterruptStatus::Queued, None),
        EnqueueOutcome::QueuedWithEviction { evicted_id } => {
            (InterruptStatus::Queued, Some(evicted_id))
        }
        EnqueueOutcome::Dropped => (InterruptStatus::Dropped, None),
    };
    tracing::info!(
        interrupt_id = %interrupt_id,
        kind = %kind,
        status = status.as_str(),
        "interrupt received"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(InterruptAck {
            interrupt_id,
            kind,
            status,
            evicted,
        }),
    ))
}

/// Handler for `GET /api/v1/audio/interrupt/{interruptId}`.
pub async fn interrupt_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(interrupt_id): Path<String>,
) -> Result<Json<InterruptStatusResponse>, ApiError> {
    let status = state
        .queue
        .status(&interrupt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("interrupt {interrupt_id}")))?;

    Ok(Json(InterruptStatusResponse {
        interrupt_id,
        status,
    }))
}

/// Handler for `GET /api/v1/audio`.
///
/// Lists published chunk metadata in `sequence_no` order.
pub async fn list_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListAudioParams>,
) -> Result<Json<ListAudioResponse>, ApiError> {
    let kind = params
        .kind
        .as_deref()
        .map(|k| {
            k.parse::<AudioKind>()
                .map_err(|_| ApiError::BadRequest(format!("unknown audio kind: {k}")))
        })
        .transpose()?;

    let session_id = match params.session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => state.coordinator.borrow().session_id.clone(),
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let chunks = state
        .chunks
        .list(ChunkFilter {
            session_id: Some(session_id.clone()),
            after: params.after,
            kind,
            limit: Some(limit),
        })
        .await?;

    let next_after = chunks.last().map(|c| c.sequence_no);
    Ok(Json(ListAudioResponse {
        session_id,
        chunks,
        next_after,
    }))
}

/// Handler for `GET /api/v1/audio/{chunkId}`.
pub async fn get_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(chunk_id): Path<String>,
) -> Result<Json<AudioChunkResponse>, ApiError> {
    let chunk = state
        .chunks
        .get(&chunk_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("audio chunk {chunk_id}")))?;

    Ok(Json(AudioChunkResponse {
        meta: chunk.meta(),
        audio_base64: base64::engine::general_purpose::STANDARD.encode(&chunk.audio_bytes),
    }))
}
