//! Error types for the coordination store.

use rusqlite::ErrorCode;

/// Errors that can occur during queue and chunk store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached in time: pool checkout failed, the
    /// database file could not be opened, or it stayed locked.
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure.
    #[error("store database error: {0}")]
    Database(#[source] rusqlite::Error),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure,
            ) => Self::Unavailable(e.to_string()),
            _ => Self::Database(e),
        }
    }
}
