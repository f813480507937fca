//! Storage-specific error type wrapping sqlx errors.

use macrobot_domain::error::MacrobotError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A task's actions or the stored settings could not be (de)serialized.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for MacrobotError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
