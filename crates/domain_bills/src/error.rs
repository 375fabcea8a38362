//! Bill domain errors
//!
//! Every failure of the reconciliation engine is reported as a value of
//! [`BillError`]; nothing is retried inside the domain.

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{MoneyError, PortError, TempItemId};

/// Errors that can occur in the bill domain
#[derive(Debug, Error)]
pub enum BillError {
    /// Malformed input, rejected before any computation
    #[error("Validation error on {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// The splits of one item do not add up to the item total
    #[error("Split mismatch on item {item}: splits sum to {submitted_sum}, item total is {expected_total}")]
    SplitMismatch {
        item: TempItemId,
        submitted_sum: Decimal,
        expected_total: Decimal,
    },

    /// Referenced bill, trip or item does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Caller is not allowed to see or change the trip
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The storage transaction failed and was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Money arithmetic failed (currency mismatch, division by zero)
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl BillError {
    /// Creates a validation error for a field path such as `items[2].quantity`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        BillError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Signed difference between what the splits add up to and the item total
    pub fn split_delta(&self) -> Option<Decimal> {
        match self {
            BillError::SplitMismatch { submitted_sum, expected_total, .. } => {
                Some(*submitted_sum - *expected_total)
            }
            _ => None,
        }
    }

    /// Returns true if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillError::Transaction(_))
    }
}

impl From<PortError> for BillError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => BillError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => BillError::Validation {
                field: field.unwrap_or_else(|| "request".to_string()),
                message,
            },
            PortError::Unauthorized { message } => BillError::Forbidden(message),
            other => BillError::Transaction(other.to_string()),
        }
    }
}
