//! Mapping from sqlx errors to the domain taxonomy.

use parley_core::error::DomainError;

const UNIQUE_VIOLATION: &str = "23505";

/// Wraps a storage failure as `DomainError::Infrastructure`, naming the
/// operation that failed.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => DomainError::Infrastructure(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            DomainError::Infrastructure(format!("connection pool closed in {operation}"))
        }
        other => DomainError::Infrastructure(format!("sqlx error in {operation}: {other}")),
    }
}

/// Whether `err` is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| code.as_ref() == UNIQUE_VIOLATION),
        _ => false,
    }
}
