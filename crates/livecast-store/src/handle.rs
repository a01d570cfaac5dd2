//! Async handles over the pooled store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livecast_db::DbPool;
use livecast_types::{
    AudioChunk, ChatMessage, ChunkMeta, InterruptEvent, InterruptStatus, QueuePolicy,
    RevenueTotals,
};
use rusqlite::Connection;
use tokio::task::{JoinError, JoinHandle};

use crate::chunks::{self, ChunkFilter};
use crate::error::StoreError;
use crate::messages;
use crate::queue::{self, EnqueueOutcome};

/// Starts `f` against a pooled connection on the blocking thread pool.
fn spawn_on_pool<T, F>(
    pool: &DbPool,
    op: &'static str,
    f: F,
) -> JoinHandle<Result<T, StoreError>>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| {
            StoreError::Unavailable(format!("{op}: connection checkout failed: {e}"))
        })?;
        f(&mut conn)
    })
}

fn joined<T>(
    op: &'static str,
    result: Result<Result<T, StoreError>, JoinError>,
) -> Result<T, StoreError> {
    result.map_err(|e| StoreError::Unavailable(format!("{op}: store task failed: {e}")))?
}

/// Runs `f` against a pooled connection on the blocking thread pool.
async fn run_blocking<T, F>(pool: &DbPool, op: &'static str, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
{
    joined(op, spawn_on_pool(pool, op, f).await)
}

/// Shared handle to the priority interrupt queue.
#[derive(Clone)]
pub struct InterruptQueue {
    pool: DbPool,
    policy: Arc<QueuePolicy>,
}

impl InterruptQueue {
    pub fn new(pool: DbPool, policy: QueuePolicy) -> Self {
        Self {
            pool,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Enqueues an event. Safe to call from many tasks concurrently.
    pub async fn enqueue(&self, event: InterruptEvent) -> Result<EnqueueOutcome, StoreError> {
        let policy = Arc::clone(&self.policy);
        run_blocking(&self.pool, "enqueue", move |conn| {
            queue::enqueue_interrupt(conn, &event, &policy)
        })
        .await
    }

    /// Dequeues the highest-priority event, bounded by the policy's dequeue
    /// timeout.
    ///
    /// The blocking call and the deadline race for one claim flag. If the
    /// deadline claims it first, the caller gets `Unavailable` and an event
    /// the call dequeues afterwards is archived as `degraded`. If the call
    /// claims it first, the event is returned even when the deadline fires
    /// a moment later.
    pub async fn try_dequeue_next(&self) -> Result<Option<InterruptEvent>, StoreError> {
        let claimed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&claimed);

        let mut task = spawn_on_pool(&self.pool, "dequeue", move |conn| {
            let Some(event) = queue::dequeue_next(conn)? else {
                return Ok(None);
            };
            if flag.swap(true, Ordering::SeqCst) {
                match queue::mark_interrupt(conn, &event.id, InterruptStatus::Degraded) {
                    Ok(_) => tracing::warn!(
                        interrupt_id = %event.id,
                        "dequeue finished after its deadline, event marked degraded"
                    ),
                    Err(e) => tracing::error!(
                        interrupt_id = %event.id,
                        error = %e,
                        "failed to mark late dequeue as degraded"
                    ),
                }
                return Ok(None);
            }
            Ok(Some(event))
        });

        let bound = Duration::from_millis(self.policy.dequeue_timeout_ms);
        match tokio::time::timeout(bound, &mut task).await {
            Ok(result) => joined("dequeue", result),
            Err(_) => {
                if claimed.swap(true, Ordering::SeqCst) {
                    // The call already owns an event for this caller and has
                    // no database work left.
                    return joined("dequeue", task.await);
                }
                Err(StoreError::Unavailable(format!(
                    "dequeue: no response within {}ms",
                    self.policy.dequeue_timeout_ms
                )))
            }
        }
    }

    /// Like [`try_dequeue_next`](Self::try_dequeue_next), but treats an
    /// unavailable store as an empty queue.
    pub async fn dequeue_next(&self) -> Option<InterruptEvent> {
        match self.try_dequeue_next().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "interrupt queue unavailable, treating as empty");
                None
            }
        }
    }

    /// Records the final disposition of an in-service event.
    pub async fn mark(
        &self,
        interrupt_id: &str,
        status: InterruptStatus,
    ) -> Result<bool, StoreError> {
        let id = interrupt_id.to_string();
        run_blocking(&self.pool, "mark", move |conn| {
            queue::mark_interrupt(conn, &id, status)
        })
        .await
    }

    pub async fn status(&self, interrupt_id: &str) -> Result<Option<InterruptStatus>, StoreError> {
        let id = interrupt_id.to_string();
        run_blocking(&self.pool, "status", move |conn| {
            queue::interrupt_status(conn, &id)
        })
        .await
    }

    pub async fn pending(&self) -> Result<usize, StoreError> {
        run_blocking(&self.pool, "pending", |conn| queue::pending_count(conn)).await
    }

    /// Marks events stranded `in_service` by a previous run as `degraded`.
    pub async fn recover_in_service(&self) -> Result<usize, StoreError> {
        run_blocking(&self.pool, "recover", |conn| queue::recover_in_service(conn)).await
    }

    /// Money received through superchats and gifts, wherever they are in
    /// their lifecycle.
    pub async fn revenue(&self) -> Result<RevenueTotals, StoreError> {
        run_blocking(&self.pool, "revenue", |conn| messages::revenue_totals(conn)).await
    }
}

/// Shared handle to the append-only audio chunk store.
#[derive(Clone)]
pub struct ChunkStore {
    pool: DbPool,
}

impl ChunkStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, chunk: AudioChunk) -> Result<(), StoreError> {
        run_blocking(&self.pool, "append_chunk", move |conn| {
            chunks::append_chunk(conn, &chunk)
        })
        .await
    }

    pub async fn list(&self, filter: ChunkFilter) -> Result<Vec<ChunkMeta>, StoreError> {
        run_blocking(&self.pool, "list_chunks", move |conn| {
            chunks::list_chunks(conn, &filter)
        })
        .await
    }

    pub async fn get(&self, chunk_id: &str) -> Result<Option<AudioChunk>, StoreError> {
        let id = chunk_id.to_string();
        run_blocking(&self.pool, "get_chunk", move |conn| chunks::get_chunk(conn, &id)).await
    }

    pub async fn last_sequence(&self, session_id: &str) -> Result<Option<u64>, StoreError> {
        let session_id = session_id.to_string();
        run_blocking(&self.pool, "last_sequence", move |conn| {
            chunks::last_sequence(conn, &session_id)
        })
        .await
    }
}

/// Shared handle to the viewer chat log.
#[derive(Clone)]
pub struct MessageLog {
    pool: DbPool,
}

impl MessageLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, message: ChatMessage) -> Result<(), StoreError> {
        run_blocking(&self.pool, "append_message", move |conn| {
            messages::insert_message(conn, &message)
        })
        .await
    }

    pub async fn list(&self) -> Result<Vec<ChatMessage>, StoreError> {
        run_blocking(&self.pool, "list_messages", |conn| messages::list_messages(conn)).await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        run_blocking(&self.pool, "count_messages", |conn| messages::message_count(conn)).await
    }
}
