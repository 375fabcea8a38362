//! Bill Reconciliation Domain
//!
//! This crate implements the bill reconciliation and allocation engine: it
//! turns a receipt's line items, tax, discount and rounding adjustments and
//! per-item participant assignments into a consistent ledger of who owes
//! what, down to the cent.
//!
//! # Components
//!
//! - **Pricing**: per-item tax and total from quantity, unit price, discount
//!   and the bill tax rate
//! - **Aggregate**: bill-level subtotal, discount, tax and total
//! - **Allocation**: per-item splits keyed by stable client item ids
//! - **Draft**: the editable state of an unconfirmed bill
//! - **Reconciliation**: validation of a confirm request into a replacement plan
//! - **Balance**: net per-user balances over a trip's bills
//!
//! # Confirm Lifecycle
//!
//! ```text
//! DRAFT --confirm--> VALIDATING --ok----> CONFIRMED
//!                              \--fail--> DRAFT (unchanged, error surfaced)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_bills::{BillDraft, ItemInput, reconcile};
//!
//! let mut draft = BillDraft::new(trip_id, "Dinner", alice, Currency::MYR);
//! draft.add_participant(Some(alice), "Alice")?;
//! draft.add_participant(Some(bob), "Bob")?;
//! draft.set_tax_rate(dec!(6))?;
//!
//! let ramen = draft.add_item(ItemInput { name: "Ramen".into(), quantity: dec!(2), unit_price: dec!(10.00), .. })?;
//! draft.assign(&ramen, alice)?;
//! draft.assign(&ramen, bob)?;
//! draft.split_evenly(&ramen)?;
//!
//! let plan = reconcile(bill_id, &draft.into_confirm_request()?, Currency::MYR)?;
//! ```

pub mod aggregate;
pub mod allocation;
pub mod balance;
pub mod bill;
pub mod draft;
pub mod error;
pub mod ports;
pub mod pricing;
pub mod reconciliation;
pub mod services;

pub use aggregate::{aggregate, recompute, Recomputation};
pub use allocation::{Allocation, SplitAllocator};
pub use balance::{calculate_balances, BalanceSheet};
pub use bill::{Bill, BillItem, BillRecord, BillSummary, BillTotals, NewBill, Participant, Receipt, Split};
pub use draft::{BillDraft, DraftItem, DraftParticipant, ItemInput, ParsedLine, ParsedReceipt};
pub use error::BillError;
pub use ports::{BillStore, Membership, TripDirectory};
pub use pricing::{price_item, price_items, ItemPricing, PricedItem};
pub use reconciliation::{
    reconcile, ConfirmBillRequest, ConfirmItem, ConfirmParticipant, ConfirmSplit, ConfirmTotals,
    ItemIdMap, PlannedItem, PlannedParticipant, PlannedSplit, ReconciliationPlan,
};
pub use services::{BillService, ReceiptUpload};
