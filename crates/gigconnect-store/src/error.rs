use gigconnect_shared::MessagingError;
use thiserror::Error;

/// Errors produced by the SQLite layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// An id does not fit in a SQLite INTEGER.
    #[error("Value out of range for SQLite INTEGER: {0}")]
    OutOfRange(u64),

    /// A thread panicked while holding the connection.
    #[error("Connection lock poisoned")]
    Poisoned,
}

/// Everything except a missing row means the backend cannot serve the call.
/// Missing rows are mapped by the caller, which knows which id was asked for.
impl From<StoreError> for MessagingError {
    fn from(e: StoreError) -> Self {
        MessagingError::StorageUnavailable(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
