//! Database error types
//!
//! Maps SQLx and PostgreSQL failures onto a small set of variants, and from
//! there onto the port and domain errors the bill service understands.

use core_kernel::PortError;
use domain_bills::BillError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock reported by PostgreSQL
    #[error("Transaction conflict: {0}")]
    SerializationConflict(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped back to a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The bill domain rejected the data inside a transaction
    #[error(transparent)]
    Rejected(BillError),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Bill", "BILL-123");
    /// assert!(error.to_string().contains("Bill"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn corrupt(column: &str, detail: impl std::fmt::Display) -> Self {
        DatabaseError::CorruptRow(format!("{}: {}", column, detail))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_)
                | DatabaseError::PoolExhausted
                | DatabaseError::SerializationConflict(_)
                | DatabaseError::TransactionFailed(_)
        )
    }

    /// Re-classifies a raw SQLx error by its PostgreSQL error code
    pub fn classify(self) -> Self {
        match self {
            DatabaseError::SqlError(ref e) => DatabaseError::from(e),
            other => other,
        }
    }
}

/// Maps SQLx errors to specific variants by PostgreSQL error code
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    Some("40001") | Some("40P01") => DatabaseError::SerializationConflict(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        let error = error.classify();
        match error {
            DatabaseError::NotFound { entity, id } => PortError::NotFound {
                entity_type: entity,
                id,
            },
            DatabaseError::Rejected(BillError::NotFound { entity, id }) => PortError::NotFound {
                entity_type: entity,
                id,
            },
            DatabaseError::Rejected(BillError::Validation { field, message }) => {
                PortError::validation_field(message, field)
            }
            DatabaseError::Rejected(rejection) => PortError::validation(rejection.to_string()),
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::ForeignKeyViolation(message)
            | DatabaseError::ConstraintViolation(message) => PortError::validation(message),
            e if e.is_transient() => PortError::connection(e.to_string()),
            e => PortError::internal(e.to_string()),
        }
    }
}

/// Storage failures surface to the bill domain as port errors
///
/// A domain rejection passes through unchanged. Everything except a missing
/// row or a rejected constraint becomes a retryable `BillError::Transaction`.
impl From<DatabaseError> for BillError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Rejected(rejection) => rejection,
            other => BillError::from(PortError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_through_to_bill_error() {
        let err: BillError = DatabaseError::not_found("Bill", "BILL-1").into();
        assert!(matches!(err, BillError::NotFound { .. }));
    }

    #[test]
    fn test_outage_is_retryable() {
        let err: BillError = DatabaseError::PoolExhausted.into();
        assert!(err.is_retryable());

        let err: BillError = DatabaseError::SerializationConflict("40001".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_corrupt_row_is_internal() {
        let err: PortError = DatabaseError::corrupt("currency", "XYZ").into();
        assert!(matches!(err, PortError::Internal { .. }));
    }

    #[test]
    fn test_split_mismatch_survives_the_transaction_boundary() {
        let mismatch = BillError::SplitMismatch {
            item: core_kernel::TempItemId::new("t1"),
            submitted_sum: rust_decimal_macros::dec!(19.99),
            expected_total: rust_decimal_macros::dec!(20.00),
        };
        let err: BillError = DatabaseError::Rejected(mismatch).into();
        assert!(matches!(err, BillError::SplitMismatch { .. }));
        assert_eq!(err.split_delta(), Some(rust_decimal_macros::dec!(-0.01)));
    }

    #[test]
    fn test_row_not_found_is_classified() {
        let err = DatabaseError::SqlError(sqlx::Error::RowNotFound).classify();
        assert!(err.is_not_found());
    }
}
