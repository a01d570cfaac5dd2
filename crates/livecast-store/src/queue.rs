//! Priority interrupt queue over the `interrupt_queue` table.
//!
//! Ordering is `weight DESC, tiebreak DESC, seq ASC`: the heaviest event
//! first, then the largest amount when amount ordering is enabled, then
//! strict arrival order. Dequeue removes the row and archives it as
//! `in_service` inside one immediate transaction, so two consumers can never
//! receive the same event.

use chrono::{DateTime, Utc};
use livecast_types::{InterruptEvent, InterruptKind, InterruptStatus, QueuePolicy};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::StoreError;

/// What happened to an event handed to [`enqueue_interrupt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The queue was full; the oldest pending chat was dropped to make room.
    QueuedWithEviction { evicted_id: String },
    /// The queue was full of superchats and gifts; the incoming chat was dropped.
    Dropped,
}

const EVENT_COLUMNS: &str = "id, kind, persona, message, amount, weight, arrival_time";

/// Adds an event to the queue, applying the overflow policy.
///
/// Superchats and gifts are never dropped. When the queue is at capacity the
/// oldest pending chat is evicted; if there is none, an incoming chat is
/// dropped and an incoming superchat or gift is admitted over capacity.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn enqueue_interrupt(
    conn: &mut Connection,
    event: &InterruptEvent,
    policy: &QueuePolicy,
) -> Result<EnqueueOutcome, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let pending: i64 = tx.query_row("SELECT COUNT(*) FROM interrupt_queue", [], |row| {
        row.get(0)
    })?;

    let mut outcome = EnqueueOutcome::Queued;

    if pending as usize >= policy.capacity {
        let oldest_chat: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, id FROM interrupt_queue WHERE kind = 'chat' ORDER BY seq ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match oldest_chat {
            Some((seq, evicted_id)) => {
                tx.execute(
                    &format!(
                        "INSERT INTO interrupt_archive ({EVENT_COLUMNS}, status)
                         SELECT {EVENT_COLUMNS}, 'dropped' FROM interrupt_queue WHERE seq = ?1"
                    ),
                    [seq],
                )?;
                tx.execute("DELETE FROM interrupt_queue WHERE seq = ?1", [seq])?;
                tracing::warn!(
                    evicted_id = %evicted_id,
                    capacity = policy.capacity,
                    "interrupt queue full, evicted oldest chat"
                );
                outcome = EnqueueOutcome::QueuedWithEviction { evicted_id };
            }
            None if event.kind == InterruptKind::Chat => {
                archive_event(&tx, event, InterruptStatus::Dropped)?;
                tx.commit()?;
                tracing::warn!(
                    interrupt_id = %event.id,
                    capacity = policy.capacity,
                    "interrupt queue full of priority events, dropped incoming chat"
                );
                return Ok(EnqueueOutcome::Dropped);
            }
            None => {
                tracing::warn!(
                    interrupt_id = %event.id,
                    kind = %event.kind,
                    pending,
                    capacity = policy.capacity,
                    "interrupt queue over capacity, admitting priority event"
                );
            }
        }
    }

    let tiebreak = if policy.amount_tiebreak {
        event.amount.unwrap_or(0.0)
    } else {
        0.0
    };

    tx.execute(
        "INSERT INTO interrupt_queue
            (id, kind, persona, message, amount, weight, tiebreak, arrival_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.id,
            event.kind.as_str(),
            event.persona,
            event.message,
            event.amount,
            event.weight,
            tiebreak,
            event.arrival_time.to_rfc3339(),
        ],
    )?;

    tx.commit()?;
    Ok(outcome)
}

/// Removes and returns the highest-priority pending event, or `None` when
/// the queue is empty. The event is archived as `in_service`.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn dequeue_next(conn: &mut Connection) -> Result<Option<InterruptEvent>, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let event = tx
        .query_row(
            &format!(
                "DELETE FROM interrupt_queue
                 WHERE seq = (
                    SELECT seq FROM interrupt_queue
                    ORDER BY weight DESC, tiebreak DESC, seq ASC
                    LIMIT 1
                 )
                 RETURNING {EVENT_COLUMNS}"
            ),
            [],
            event_from_row,
        )
        .optional()?;

    if let Some(ref event) = event {
        archive_event(&tx, event, InterruptStatus::InService)?;
    }

    tx.commit()?;
    Ok(event)
}

/// Records the final disposition of an event that was in service.
///
/// Returns `false` if the event was not in service.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn mark_interrupt(
    conn: &Connection,
    interrupt_id: &str,
    status: InterruptStatus,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE interrupt_archive
         SET status = ?2, updated_at = datetime('now')
         WHERE id = ?1 AND status = 'in_service'",
        params![interrupt_id, status.as_str()],
    )?;
    Ok(updated > 0)
}

/// Looks up where an event currently is: still queued, or archived with a status.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn interrupt_status(
    conn: &Connection,
    interrupt_id: &str,
) -> Result<Option<InterruptStatus>, StoreError> {
    let queued: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM interrupt_queue WHERE id = ?1)",
        [interrupt_id],
        |row| row.get(0),
    )?;
    if queued {
        return Ok(Some(InterruptStatus::Queued));
    }

    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM interrupt_archive WHERE id = ?1",
            [interrupt_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(status.and_then(|s| s.parse().ok()))
}

/// Returns the number of events waiting in the queue.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn pending_count(conn: &Connection) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM interrupt_queue", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

/// Marks events left `in_service` by an earlier session as `degraded`.
///
/// They are not re-enqueued: a cycle that died mid-flight counts as
/// serviced-with-degradation.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn recover_in_service(conn: &Connection) -> Result<usize, StoreError> {
    let updated = conn.execute(
        "UPDATE interrupt_archive
         SET status = 'degraded', updated_at = datetime('now')
         WHERE status = 'in_service'",
        [],
    )?;
    Ok(updated)
}

fn archive_event(
    conn: &Connection,
    event: &InterruptEvent,
    status: InterruptStatus,
) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO interrupt_archive ({EVENT_COLUMNS}, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            event.id,
            event.kind.as_str(),
            event.persona,
            event.message,
            event.amount,
            event.weight,
            event.arrival_time.to_rfc3339(),
            status.as_str(),
        ],
    )?;
    Ok(())
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<InterruptEvent> {
    let kind: String = row.get(1)?;
    let kind = kind.parse::<InterruptKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let arrival_time: String = row.get(6)?;

    Ok(InterruptEvent {
        id: row.get(0)?,
        kind,
        persona: row.get(2)?,
        message: row.get(3)?,
        amount: row.get(4)?,
        weight: row.get(5)?,
        arrival_time: parse_timestamp(6, &arrival_time)?,
    })
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
