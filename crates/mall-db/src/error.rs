//! # Storage Errors
//!
//! Every repository and the in-memory store report failures as [`DbError`].
//! SQLite constraint failures are classified here so callers can branch on
//! them (the payment insert relies on the `order_payments.order_id`
//! uniqueness to detect a concurrent intent) without parsing messages.
//!
//! ```text
//! sqlx::Error ──► DbError ──► ServiceError (mall-server) ──► ApiError
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The addressed row does not exist.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write.
    ///
    /// `field` is `table.column` as SQLite names it, e.g. `orders.order_no`
    /// or `order_payments.order_id` (at most one pending/successful payment
    /// per order).
    #[error("{field} already holds '{value}'")]
    UniqueViolation { field: String, value: String },

    /// A referenced user, order or product is missing.
    #[error("Dangling reference: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the row (negative stock, zero quantity).
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    /// The pool could not be opened, or has been closed.
    #[error("Database unavailable: {0}")]
    ConnectionFailed(String),

    /// No connection became free within the acquire timeout.
    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// Any other statement failure reported by SQLite.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored data contradicts what the caller expected.
    #[error("Storage invariant broken: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for a UNIQUE failure on exactly `table.column`.
    pub fn is_unique_violation_on(&self, field: &str) -> bool {
        match self {
            DbError::UniqueViolation { field: f, .. } => f == field,
            _ => false,
        }
    }
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";
const CHECK_PREFIX: &str = "CHECK constraint failed";
const FOREIGN_KEY_PREFIX: &str = "FOREIGN KEY constraint failed";

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Database(db_err) => classify(db_err.message()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

/// Maps an SQLite error message onto a constraint category.
fn classify(message: &str) -> DbError {
    if let Some(field) = message.strip_prefix(UNIQUE_PREFIX) {
        // Composite indexes list every column; the first names the index.
        let field = field.split(',').next().unwrap_or(field).trim();
        DbError::duplicate(field, "?")
    } else if message.starts_with(CHECK_PREFIX) {
        DbError::CheckViolation(message.to_string())
    } else if message.starts_with(FOREIGN_KEY_PREFIX) {
        DbError::ForeignKeyViolation {
            message: message.to_string(),
        }
    } else {
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
