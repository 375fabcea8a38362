//! Core Kernel - Foundational types for the bill-splitting ledger
//!
//! This crate provides the building blocks used across every other crate:
//! - Money types with precise decimal arithmetic and a single rounding rule
//! - Strongly typed identifiers for trips, bills, items, participants and users
//! - Port infrastructure for the hexagonal persistence boundary

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate, MONEY_ROUNDING, round_money};
pub use identifiers::{
    TripId, UserId, BillId, BillItemId, ParticipantId, SplitId, ReceiptId, TempItemId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth, OperationMetadata,
};
