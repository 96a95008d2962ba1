use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lock could not be acquired in time, a deadlock was detected, or the
    /// transaction could not be serialized. Nothing was persisted; the whole
    /// unit of work may be retried.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist (foreign key violation).
    #[error("Referential integrity violated: {0}")]
    ReferentialIntegrity(String),

    /// A check constraint rejected the row (e.g. negative stock).
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A row was written without first being locked by the writing transaction.
    #[error("{table} row {id} must be locked before it is written")]
    Unlocked { table: &'static str, id: i64 },

    /// A stored row could not be decoded into a record.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the failed unit of work can safely be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// PostgreSQL error codes that mean "retry the transaction".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
];

const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && let Some(code) = db_err.code()
        {
            if RETRYABLE_SQLSTATES.contains(&code.as_ref()) {
                return StoreError::Conflict(db_err.message().to_string());
            }
            if code.as_ref() == FOREIGN_KEY_VIOLATION {
                return StoreError::ReferentialIntegrity(db_err.message().to_string());
            }
            if code.as_ref() == CHECK_VIOLATION {
                return StoreError::Constraint(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
