//! Ports and Adapters Infrastructure
//!
//! Shared vocabulary for the persistence boundary. A domain crate declares
//! its port traits on top of [`DomainPort`] and [`HealthCheckable`]; adapter
//! crates implement them and report failures as [`PortError`].
//!
//! ```text
//!        BillService
//!             │
//!             ▼
//!   BillStore / TripDirectory        (domain_bills::ports)
//!        ▲                 ▲
//!        │                 │
//!   PostgreSQL         in-memory
//!   (infra_db)     (feature = "mock")
//! ```

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Failure reported by an adapter
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// The backing store refused the data
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// The backing system could not be reached; the call may be retried
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation error pinned to one request field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }
}

/// Marker trait for all domain ports
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    /// Responding, but slowly or partially
    Degraded,
    Unhealthy,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

/// Who asked for a port operation, for adapter audit logs
#[derive(Debug, Clone, Default)]
pub struct OperationMetadata {
    pub initiated_by: Option<String>,
}

impl OperationMetadata {
    pub fn initiated_by(actor: impl fmt::Display) -> Self {
        Self {
            initiated_by: Some(actor.to_string()),
        }
    }

    /// The initiating actor, `system` when unknown
    pub fn actor(&self) -> &str {
        self.initiated_by.as_deref().unwrap_or("system")
    }
}
