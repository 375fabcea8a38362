//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the bill reconciliation engine using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories own the SQL and
//! the row mapping; adapters implement the `domain_bills` ports on top of
//! them so the domain never sees a connection or a row.
//!
//! # Confirm Transaction
//!
//! Confirming a bill replaces its entire financial state. The repository
//! locks the bill row, rewrites the header, deletes the previous splits,
//! participants and items, inserts the new items while building the
//! client-to-server item id map, inserts the participant snapshot, verifies
//! every item's splits through that map and only then inserts the splits
//! and commits. Any failure rolls the whole transaction back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig};
//! use infra_db::adapters::PostgresBillStore;
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/splitledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresBillStore, PostgresTripDirectory};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{BillRepository, TripRepository};
