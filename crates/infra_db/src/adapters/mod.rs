//! Domain Adapters
//!
//! Implementations of the `domain_bills` ports on top of the repositories.
//! Each adapter holds its repository plus the pool for health checks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresBillStore, PostgresTripDirectory};
//! use domain_bills::BillService;
//!
//! let service = BillService::new(
//!     Arc::new(PostgresBillStore::new(pool.clone())),
//!     Arc::new(PostgresTripDirectory::new(pool)),
//!     Currency::MYR,
//! );
//! ```

pub mod bills;
pub mod trips;

pub use bills::PostgresBillStore;
pub use trips::PostgresTripDirectory;
