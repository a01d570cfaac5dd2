//! Append-only audio chunk log over the `audio_chunks` table.
//!
//! Rows are never updated or deleted (triggers reject both). Iteration is
//! by `sequence_no` within a session, which the coordinator assigns.

use livecast_types::{AudioChunk, AudioKind, ChunkMeta};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::queue::parse_timestamp;

/// Filter criteria for listing published chunks.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    /// Restrict to one stream session.
    pub session_id: Option<String>,
    /// Return chunks with a sequence number strictly greater than this.
    pub after: Option<u64>,
    pub kind: Option<AudioKind>,
    /// Maximum number of chunks to return (default: 100).
    pub limit: Option<i64>,
}

/// Appends a chunk.
///
/// # Errors
///
/// Returns `StoreError::Database` if the sequence number is already taken
/// in the chunk's session, or on any other SQL failure.
pub fn append_chunk(conn: &Connection, chunk: &AudioChunk) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO audio_chunks
            (id, session_id, sequence_no, persona, mime_type, kind, transcript,
             source_event_id, audio, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            chunk.id,
            chunk.session_id,
            chunk.sequence_no as i64,
            chunk.persona,
            chunk.mime_type,
            chunk.kind.as_str(),
            chunk.transcript,
            chunk.source_event_id,
            chunk.audio_bytes,
            chunk.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Lists chunk metadata in `sequence_no` order.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn list_chunks(conn: &Connection, filter: &ChunkFilter) -> Result<Vec<ChunkMeta>, StoreError> {
    // WHERE clauses and bind parameters are collected separately so nothing
    // is interpolated into the SQL text.
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref session_id) = filter.session_id {
        param_values.push(Box::new(session_id.clone()));
        clauses.push(format!("session_id = ?{}", param_values.len()));
    }

    if let Some(after) = filter.after {
        param_values.push(Box::new(after as i64));
        clauses.push(format!("sequence_no > ?{}", param_values.len()));
    }

    if let Some(kind) = filter.kind {
        param_values.push(Box::new(kind.as_str().to_string()));
        clauses.push(format!("kind = ?{}", param_values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    param_values.push(Box::new(filter.limit.unwrap_or(100)));
    let sql = format!(
        "SELECT id, session_id, sequence_no, persona, mime_type, kind, transcript,
                source_event_id, length(audio), created_at
         FROM audio_chunks
         {where_clause}
         ORDER BY sequence_no ASC, created_at ASC
         LIMIT ?{}",
        param_values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), meta_from_row)?;

    let mut chunks = Vec::new();
    for row in rows {
        chunks.push(row?);
    }
    Ok(chunks)
}

/// Fetches one chunk including its audio payload.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn get_chunk(conn: &Connection, chunk_id: &str) -> Result<Option<AudioChunk>, StoreError> {
    let chunk = conn
        .query_row(
            "SELECT id, session_id, sequence_no, persona, mime_type, kind, transcript,
                    source_event_id, audio, created_at
             FROM audio_chunks WHERE id = ?1",
            [chunk_id],
            |row| {
                let created_at: String = row.get(9)?;
                Ok(AudioChunk {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    sequence_no: row.get::<_, i64>(2)? as u64,
                    persona: row.get(3)?,
                    mime_type: row.get(4)?,
                    kind: kind_from_row(row, 5)?,
                    transcript: row.get(6)?,
                    source_event_id: row.get(7)?,
                    audio_bytes: row.get(8)?,
                    created_at: parse_timestamp(9, &created_at)?,
                })
            },
        )
        .optional()?;
    Ok(chunk)
}

/// Returns the highest sequence number published in a session.
///
/// # Errors
///
/// Returns `StoreError` on SQL failure.
pub fn last_sequence(conn: &Connection, session_id: &str) -> Result<Option<u64>, StoreError> {
    let max_seq: Option<i64> = conn.query_row(
        "SELECT MAX(sequence_no) FROM audio_chunks WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;
    Ok(max_seq.map(|s| s as u64))
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<ChunkMeta> {
    let created_at: String = row.get(9)?;
    Ok(ChunkMeta {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sequence_no: row.get::<_, i64>(2)? as u64,
        persona: row.get(3)?,
        mime_type: row.get(4)?,
        kind: kind_from_row(row, 5)?,
        transcript: row.get(6)?,
        source_event_id: row.get(7)?,
        byte_len: row.get::<_, i64>(8)? as usize,
        created_at: parse_timestamp(9, &created_at)?,
    })
}

fn kind_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<AudioKind> {
    let kind: String = row.get(idx)?;
    kind.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
