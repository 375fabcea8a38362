//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! split ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built trips, users and money amounts
//! - `builders`: Builder for confirm requests with sensible defaults
//! - `database`: PostgreSQL test containers with the schema migrated
//! - `assertions`: Assertion helpers for money, splits and balances
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
