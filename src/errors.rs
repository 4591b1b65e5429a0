use sea_orm::error::DbErr;
use serde::Serialize;

/// Error taxonomy for the ledger engine.
///
/// `NotFound` and `InsufficientStock` are expected business outcomes and are
/// returned as typed results. `ConcurrencyConflict` surfaces lock-wait or
/// serialization failures from the store; callers retry with backoff, the
/// engine itself never does.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Maps a database error raised while holding a row lock, surfacing
    /// lock-wait and serialization failures as `ConcurrencyConflict`.
    pub fn from_locked_db_err(error: DbErr) -> Self {
        let msg = error.to_string();
        let lowered = msg.to_lowercase();
        if lowered.contains("deadlock")
            || lowered.contains("lock timeout")
            || lowered.contains("lock wait")
            || lowered.contains("could not serialize")
        {
            ServiceError::ConcurrencyConflict(msg)
        } else {
            ServiceError::DatabaseError(error)
        }
    }

    /// Whether the caller should retry the operation (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_db_err_classification() {
        let conflict = ServiceError::from_locked_db_err(DbErr::Custom(
            "ERROR: deadlock detected".to_string(),
        ));
        assert!(matches!(conflict, ServiceError::ConcurrencyConflict(_)));
        assert!(conflict.is_retryable());

        let serialization = ServiceError::from_locked_db_err(DbErr::Custom(
            "ERROR: could not serialize access due to concurrent update".to_string(),
        ));
        assert!(matches!(
            serialization,
            ServiceError::ConcurrencyConflict(_)
        ));

        let plain = ServiceError::from_locked_db_err(DbErr::Custom("syntax error".to_string()));
        assert!(matches!(plain, ServiceError::DatabaseError(_)));
        assert!(!plain.is_retryable());
    }

    #[test]
    fn business_errors_are_not_retryable() {
        assert!(!ServiceError::NotFound("batch 7".into()).is_retryable());
        assert!(!ServiceError::InsufficientStock("short by 3".into()).is_retryable());
    }
}
