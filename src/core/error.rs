use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Backup '{0}' not found")]
    BackupNotFound(String),

    #[error("Rollback of backup '{backup_id}' completed with {error_count} record error(s)")]
    RollbackPartialFailure {
        backup_id: String,
        error_count: usize,
    },

    #[error("Rollback of backup '{0}' failed: {1}")]
    RollbackFatalFailure(String, String),

    #[error("Conflict resolution could not be applied: {0}")]
    ConflictApplication(String),

    #[error("Consistency check error: {0}")]
    ConsistencyCheck(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Task error: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl<T> From<std::sync::PoisonError<T>> for MigrationError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Store(err.to_string())
    }
}
