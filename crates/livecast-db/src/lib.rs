//! Database layer for Livecast.
//!
//! Provides the SQLite connection pool (via `r2d2`), WAL-mode initialization
//! and the embedded migrations that create the coordination store: the
//! pending interrupt queue, the interrupt archive, the append-only audio
//! chunk log and the viewer chat log.
//!
//! Migrations are compiled into the binary with `include_str!` so the schema
//! always ships with the code that queries it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_lazy_pool, create_pool, DbPool, DbRuntimeSettings, PoolError};
