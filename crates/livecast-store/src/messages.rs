//! Viewer chat log over the `chat_messages` table, and revenue totals
//! over the interrupt tables.

use livecast_types::{ChatMessage, Gift, MessageKind, RevenueTotals};
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;
use crate::queue::parse_timestamp;

const MESSAGE_COLUMNS: &str = "id, username, avatar_color, kind, content, amount, pinned, \
     gift_key, gift_name, gift_value, gift_quantity, created_at";

/// Stores a chat log entry.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure, including a duplicate id.
pub fn insert_message(conn: &Connection, message: &ChatMessage) -> Result<(), StoreError> {
    let gift = message.gift.as_ref();
    conn.execute(
        &format!(
            "INSERT INTO chat_messages ({MESSAGE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            message.id,
            message.username,
            message.avatar_color,
            message.kind.as_str(),
            message.content,
            message.amount,
            message.pinned,
            gift.map(|g| g.gift_key.as_str()),
            gift.map(|g| g.gift_name.as_str()),
            gift.map(|g| g.value),
            gift.map(|g| g.quantity),
            message.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Returns every chat log entry, oldest first.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn list_messages(conn: &Connection) -> Result<Vec<ChatMessage>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages ORDER BY created_at ASC, seq ASC"
    ))?;
    let rows = stmt.query_map([], message_from_row)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Returns the number of stored chat log entries.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn message_count(conn: &Connection) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

/// Sums the amounts of superchat and gift interrupts, queued or archived.
///
/// An event lives in exactly one of the two tables at any time, so each
/// paid event is counted once.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn revenue_totals(conn: &Connection) -> Result<RevenueTotals, StoreError> {
    let (superchat, gifts) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN kind = 'superchat' THEN amount END), 0.0),
            COALESCE(SUM(CASE WHEN kind = 'gift' THEN amount END), 0.0)
         FROM (
            SELECT kind, amount FROM interrupt_queue
            UNION ALL
            SELECT kind, amount FROM interrupt_archive
         )",
        [],
        |row| Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?)),
    )?;
    Ok(RevenueTotals { superchat, gifts })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let kind: String = row.get(3)?;
    let kind = kind.parse::<MessageKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let gift_key: Option<String> = row.get(7)?;
    let gift = match gift_key {
        Some(gift_key) => Some(Gift {
            gift_key,
            gift_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            value: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
            quantity: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        }),
        None => None,
    };

    let created_at: String = row.get(11)?;

    Ok(ChatMessage {
        id: row.get(0)?,
        username: row.get(1)?,
        avatar_color: row.get(2)?,
        kind,
        content: row.get(4)?,
        amount: row.get(5)?,
        pinned: row.get(6)?,
        gift,
        created_at: parse_timestamp(11, &created_at)?,
    })
}
