//! Viewer chat log, revenue totals and the estimated view count.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};
use livecast_types::{ChatMessage, Gift, MessageKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Viewers shown before anyone has chatted.
const BASE_VIEWERS: usize = 1_200;
/// Extra viewers estimated per stored chat message.
const VIEWERS_PER_MESSAGE: usize = 5;

/// Request body for `POST /api/v1/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreate {
    pub username: String,
    pub avatar_color: String,
    /// `normal`, `superchat` or `gift`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub gift: Option<Gift>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub superchat: f64,
    pub gifts: f64,
}

/// Response body for `GET /api/v1/revenue`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RevenueResponse {
    pub total: f64,
    pub breakdown: RevenueBreakdown,
}

/// Response body for `GET /api/v1/view-count`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCountResponse {
    pub view_count: usize,
}

fn validate_message(request: MessageCreate) -> Result<ChatMessage, ApiError> {
    let kind: MessageKind = request
        .kind
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown message type: {}", request.kind)))?;

    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    let avatar_color = request.avatar_color.trim();
    if avatar_color.is_empty() {
        return Err(ApiError::BadRequest("avatarColor is required".to_string()));
    }

    if let Some(amount) = request.amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ApiError::BadRequest(
                "amount must be a non-negative number".to_string(),
            ));
        }
    }

    match kind {
        MessageKind::Superchat if request.amount.is_none() => {
            return Err(ApiError::BadRequest(
                "superchat requires an amount".to_string(),
            ));
        }
        MessageKind::Gift => match &request.gift {
            Some(gift) if gift.quantity > 0 && gift.value >= 0 => {}
            Some(_) => {
                return Err(ApiError::BadRequest(
                    "gift needs a positive quantity and a non-negative value".to_string(),
                ));
            }
            None => {
                return Err(ApiError::BadRequest(
                    "gift message requires a gift".to_string(),
                ));
            }
        },
        _ => {}
    }

    let mut message = ChatMessage::new(username, avatar_color, kind);
    message.content = request.content;
    message.amount = request.amount;
    message.pinned = request.pinned;
    message.gift = request.gift;
    Ok(message)
}

/// Handler for `GET /api/v1/messages`.
pub async fn list_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.messages.list().await?))
}

/// Handler for `POST /api/v1/messages`.
///
/// Stores the message for display only. It does not reach the narration;
/// paid events meant for the streamer go through the interrupt endpoint.
pub async fn create_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<MessageCreate>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = validate_message(payload)?;
    state.messages.append(message.clone()).await?;
    tracing::debug!(
        message_id = %message.id,
        kind = message.kind.as_str(),
        "chat message stored"
    );
    Ok((StatusCode::CREATED, Json(message)))
}

/// Handler for `GET /api/v1/revenue`.
pub async fn revenue_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<RevenueResponse>, ApiError> {
    let totals = state.queue.revenue().await?;
    Ok(Json(RevenueResponse {
        total: totals.total(),
        breakdown: RevenueBreakdown {
            superchat: totals.superchat,
            gifts: totals.gifts,
        },
    }))
}

/// Handler for `GET /api/v1/view-count`.
pub async fn view_count_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ViewCountResponse>, ApiError> {
    let messages = state.messages.count().await?;
    Ok(Json(ViewCountResponse {
        view_count: BASE_VIEWERS + messages * VIEWERS_PER_MESSAGE,
    }))
}
