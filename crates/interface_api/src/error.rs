//! API error handling
//!
//! Every failure leaves the API as an [`ErrorResponse`] with a stable
//! `error` code. Bodies of a rejected confirm carry enough detail for the
//! editor to highlight the offending field or item.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::{MoneyError, TempItemId};
use domain_bills::BillError;

/// One invalid request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Details of a split mismatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitMismatchDetails {
    pub item: TempItemId,
    pub submitted_sum: Decimal,
    pub expected_total: Decimal,
    /// `submitted_sum - expected_total`
    pub delta: Decimal,
}

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        violations: Vec<FieldViolation>,
    },

    #[error("Splits of item {} do not add up", .0.item)]
    SplitMismatch(SplitMismatchDetails),

    /// The persistence layer failed; the request may be retried
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Creates a single-field validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError::Validation {
            violations: vec![FieldViolation {
                field: field.into(),
                message: message.clone(),
            }],
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } | ApiError::SplitMismatch(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::TransactionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation { .. } => "validation_error",
            ApiError::SplitMismatch(_) => "split_mismatch",
            ApiError::TransactionFailed(_) => "transaction_failed",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Set when the same request may succeed if retried
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let details = match &self {
            ApiError::Validation { violations, .. } => serde_json::to_value(violations).ok(),
            ApiError::SplitMismatch(details) => serde_json::to_value(details).ok(),
            _ => None,
        };
        let message = match &self {
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
            details,
            retryable: matches!(self, ApiError::TransactionFailed(_)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillError> for ApiError {
    fn from(err: BillError) -> Self {
        match err {
            BillError::Validation { field, message } => ApiError::validation(field, message),
            BillError::SplitMismatch {
                item,
                submitted_sum,
                expected_total,
            } => ApiError::SplitMismatch(SplitMismatchDetails {
                item,
                submitted_sum,
                expected_total,
                delta: submitted_sum - expected_total,
            }),
            BillError::NotFound { entity, id } => ApiError::NotFound(format!("{} {}", entity, id)),
            BillError::Forbidden(message) => ApiError::Forbidden(message),
            BillError::Transaction(message) => ApiError::TransactionFailed(message),
            BillError::Money(e @ MoneyError::Overflow) => ApiError::validation("amount", e.to_string()),
            BillError::Money(e) => ApiError::validation("currency", e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldViolation {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::Validation {
            message: "request validation failed".to_string(),
            violations,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
