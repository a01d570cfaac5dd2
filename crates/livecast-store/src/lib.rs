//! Coordination store for the stream loop.
//!
//! Three structures live here, all persisted in SQLite:
//!
//! | Structure | Table(s) | Guarantees |
//! |-----------|----------|------------|
//! | Interrupt queue | `interrupt_queue`, `interrupt_archive` | priority + FIFO dequeue, at most one consumer per event, bounded with chat-first eviction |
//! | Audio chunk store | `audio_chunks` | append-only, unique `sequence_no` per session, stable iteration order |
//! | Viewer chat log | `chat_messages` | insertion-stable ordering by creation time |
//!
//! The query functions in [`queue`], [`chunks`] and [`messages`] take a
//! plain `rusqlite::Connection`. [`InterruptQueue`], [`ChunkStore`] and
//! [`MessageLog`] wrap them for async callers: each call checks a connection out of the pool on the
//! blocking thread pool and is bounded in time, so an unreachable database
//! surfaces as [`StoreError::Unavailable`] instead of stalling the caller.

pub mod chunks;
mod error;
mod handle;
pub mod messages;
pub mod queue;

pub use chunks::ChunkFilter;
pub use error::StoreError;
pub use handle::{ChunkStore, InterruptQueue, MessageLog};
pub use queue::EnqueueOutcome;

#[cfg(test)]
mod tests;
