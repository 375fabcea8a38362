//! Repository implementations
//!
//! Repositories encapsulate SQL and return plain row structs. Multi-row
//! writes run inside a single transaction.

pub mod bills;
pub mod trips;

pub use bills::{BillItemRow, BillRepository, BillRow, BillRows, ParticipantRow, ReceiptRow, SplitRow};
pub use trips::{TripMemberRow, TripRepository};
