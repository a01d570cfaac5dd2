//! SSE stream of published chunks and degraded-mode signals.

use crate::AppState;
use axum::{
    extract::Extension,
    response::{sse::Event, Sse},
};
use futures_util::Stream;
use livecast_types::StreamEvent;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::ChunkPublished { .. } => "chunk_published",
        StreamEvent::CycleDegraded { .. } => "cycle_degraded",
        StreamEvent::CredentialsExhausted => "credentials_exhausted",
        StreamEvent::StoreUnavailable { .. } => "store_unavailable",
        StreamEvent::StateChanged { .. } => "state_changed",
    }
}

/// Handler for `GET /api/v1/audio/stream`.
///
/// Playback consumers follow this instead of polling the chunk list. A
/// subscriber that falls behind loses the missed events and should re-list
/// from its last `sequence_no`. The stream ends when shutdown begins.
pub async fn stream_events_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx);

    let mut shutdown = state.shutdown.clone();
    let stopping = async move {
        // A dropped sender means the process is going away too.
        let _ = shutdown.wait_for(|stop| *stop).await;
    };

    let mapped_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().event(event_name(&event)).data(data))),
            Err(e) => {
                tracing::error!("failed to serialize stream event: {}", e);
                None
            }
        },
        Err(broadcast_error) => {
            tracing::warn!(
                error = %broadcast_error,
                "audio SSE stream lagged; events were dropped for this subscriber"
            );
            None
        }
    });

    let bounded = futures_util::StreamExt::take_until(mapped_stream, stopping);

    Sse::new(bounded).keep_alive(axum::response::sse::KeepAlive::default())
}
