//! Persisted bill model
//!
//! A bill owns its items, its participant snapshot and its splits. The
//! whole financial state is replaced by each confirm, so these types are
//! plain records rather than aggregates with mutation methods.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillId, BillItemId, Currency, Money, ParticipantId, ReceiptId, SplitId, TempItemId, TripId,
    UserId,
};
use crate::draft::ParsedReceipt;

/// Bill-level monetary aggregates
///
/// Invariant: `total_amount = subtotal - total_discount + tax + rounding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTotals {
    pub subtotal: Money,
    pub tax: Money,
    /// Tax rate as a percentage (6 means 6%)
    pub tax_percentage: Decimal,
    pub total_discount: Money,
    /// Signed adjustment applied after tax
    pub rounding: Money,
    pub total_amount: Money,
}

impl BillTotals {
    /// All-zero totals, as held by a freshly uploaded bill shell
    pub fn zero(currency: Currency) -> Self {
        Self {
            subtotal: Money::zero(currency),
            tax: Money::zero(currency),
            tax_percentage: Decimal::ZERO,
            total_discount: Money::zero(currency),
            rounding: Money::zero(currency),
            total_amount: Money::zero(currency),
        }
    }

    /// Returns true if the stored total matches its components
    pub fn is_consistent(&self) -> bool {
        let expected = self.subtotal.amount() - self.total_discount.amount()
            + self.tax.amount()
            + self.rounding.amount();
        Money::new(expected, self.total_amount.currency()) == self.total_amount
    }
}

/// One reconciled expense event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub trip_id: TripId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub paid_by: UserId,
    pub currency: Currency,
    pub totals: BillTotals,
    pub created_at: DateTime<Utc>,
}

/// One line item of a bill
///
/// Invariant: `total_price = quantity * unit_price - discount + tax`,
/// rounded once at currency precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub id: BillItemId,
    pub bill_id: BillId,
    /// Client id the item was confirmed under
    pub temp_item_id: TempItemId,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub description: Option<String>,
}

/// Point-in-time record of a person assigned to a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub bill_id: BillId,
    pub user_id: Option<UserId>,
    pub display_name: String,
}

/// Allocation of part of one item's cost to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub id: SplitId,
    pub bill_id: BillId,
    pub bill_item_id: BillItemId,
    pub user_id: UserId,
    pub amount: Money,
}

/// The full persisted state of a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub bill: Bill,
    pub items: Vec<BillItem>,
    pub participants: Vec<Participant>,
    pub splits: Vec<Split>,
}

impl BillRecord {
    /// Returns the splits belonging to one item
    pub fn splits_for(&self, item_id: BillItemId) -> impl Iterator<Item = &Split> {
        self.splits.iter().filter(move |s| s.bill_item_id == item_id)
    }

    /// Returns true if the bill has never been confirmed
    pub fn is_shell(&self) -> bool {
        self.items.is_empty() && self.splits.is_empty()
    }
}

/// Row of a trip's bill listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSummary {
    pub id: BillId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl From<&Bill> for BillSummary {
    fn from(bill: &Bill) -> Self {
        Self {
            id: bill.id,
            title: bill.title.clone(),
            merchant_name: bill.merchant_name.clone(),
            total_amount: bill.totals.total_amount,
            created_at: bill.created_at,
        }
    }
}

/// The near-empty shell created when a receipt is uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBill {
    pub trip_id: TripId,
    pub title: String,
    pub paid_by: UserId,
    pub currency: Currency,
}

impl NewBill {
    /// Materializes the shell with zero totals
    pub fn into_bill(self, id: BillId, created_at: DateTime<Utc>) -> Bill {
        Bill {
            id,
            trip_id: self.trip_id,
            title: self.title,
            merchant_name: None,
            paid_by: self.paid_by,
            currency: self.currency,
            totals: BillTotals::zero(self.currency),
            created_at,
        }
    }
}

/// Uploaded receipt attached to a bill
///
/// A bill holds at most one receipt; attaching a new one replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub bill_id: BillId,
    pub image_url: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub parsed: ParsedReceipt,
    pub created_at: DateTime<Utc>,
}
