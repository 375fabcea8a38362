//! Bill reconciliation ("confirm")
//!
//! A confirm replaces a bill's entire financial state. This module holds the
//! wire shape of a confirm request and the validation that turns it into a
//! [`ReconciliationPlan`]. Persistence adapters apply the plan inside one
//! transaction:
//!
//! 1. lock and update the bill row from the plan's totals
//! 2. delete the bill's splits, participants and items
//! 3. insert the items, building an [`ItemIdMap`] from client ids to server ids
//! 4. insert the participant snapshot
//! 5. re-run [`ReconciliationPlan::verify_splits`] against the map
//! 6. insert the splits under their resolved server item ids
//! 7. commit
//!
//! Any error after step 1 rolls the whole transaction back.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillId, BillItemId, Currency, Money, ParticipantId, SplitId, TempItemId, TripId, UserId,
};
use crate::aggregate::aggregate;
use crate::allocation::SplitAllocator;
use crate::bill::{Bill, BillItem, BillRecord, BillTotals, Participant, Split};
use crate::error::BillError;
use crate::pricing::{price_item, validate_tax_rate, ItemPricing};

/// Bill-level aggregates as submitted by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percentage: Decimal,
    pub total_discount: Decimal,
    pub rounding: Decimal,
    pub total_amount: Decimal,
}

/// One submitted line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmItem {
    pub temp_item_id: TempItemId,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// One submitted participant snapshot entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmParticipant {
    /// Client-side id, ignored; a fresh snapshot row is always created
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bill_id: Option<BillId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub display_name: String,
}

/// One submitted split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSplit {
    pub temp_item_id: TempItemId,
    #[serde(default)]
    pub bill_id: Option<BillId>,
    pub user_id: UserId,
    pub amount: Decimal,
}

/// Confirm request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBillRequest {
    pub trip_id: TripId,
    pub title: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub paid_by_id: UserId,
    pub bill: ConfirmTotals,
    pub items: Vec<ConfirmItem>,
    #[serde(default)]
    pub participants: Vec<ConfirmParticipant>,
    #[serde(default)]
    pub splits: Vec<ConfirmSplit>,
}

/// A validated line item, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub temp_item_id: TempItemId,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub description: Option<String>,
}

/// A validated participant snapshot entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedParticipant {
    pub user_id: Option<UserId>,
    pub display_name: String,
}

/// A validated split, still keyed by the client item id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSplit {
    pub temp_item_id: TempItemId,
    pub user_id: UserId,
    pub amount: Money,
}

/// The validated replacement state of one bill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub bill_id: BillId,
    pub trip_id: TripId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub paid_by: UserId,
    pub currency: Currency,
    pub totals: BillTotals,
    pub items: Vec<PlannedItem>,
    pub participants: Vec<PlannedParticipant>,
    pub splits: Vec<PlannedSplit>,
}

/// Mapping from client item ids to the server ids assigned at insert time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIdMap {
    ids: HashMap<TempItemId, BillItemId>,
}

impl ItemIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the server id of an inserted item
    pub fn insert(&mut self, temp: TempItemId, id: BillItemId) {
        self.ids.insert(temp, id);
    }

    /// Resolves a client item id to its server id
    pub fn resolve(&self, temp: &TempItemId) -> Result<BillItemId, BillError> {
        self.ids.get(temp).copied().ok_or_else(|| {
            BillError::validation(
                "splits.tempItemId",
                format!("split references unknown item {temp}"),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Magnitude bound of every persisted amount and quantity (`NUMERIC(18, 4)`)
pub const MAX_STORED_VALUE: Decimal = dec!(100000000000000);

fn storable(value: Decimal, field: &str) -> Result<(), BillError> {
    if value.abs() >= MAX_STORED_VALUE {
        return Err(BillError::validation(
            field,
            format!("{value} exceeds the largest storable value"),
        ));
    }
    Ok(())
}

/// Converts a submitted amount, rejecting values finer than currency precision
pub(crate) fn exact_money(value: Decimal, currency: Currency, field: &str) -> Result<Money, BillError> {
    storable(value, field)?;
    let money = Money::new(value, currency);
    if money.amount() != value {
        return Err(BillError::validation(
            field,
            format!(
                "{} has more than {} decimal places",
                value,
                currency.decimal_places()
            ),
        ));
    }
    Ok(money)
}

fn non_negative(value: Decimal, field: &str) -> Result<(), BillError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(BillError::validation(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(())
}

fn check_aggregate(field: &str, submitted: Decimal, derived: Money) -> Result<(), BillError> {
    if submitted != derived.amount() {
        return Err(BillError::validation(
            format!("bill.{field}"),
            format!(
                "submitted {field} {submitted} does not match items, expected {}",
                derived.amount()
            ),
        ));
    }
    Ok(())
}

/// Validates a confirm request and builds the replacement plan
///
/// Checks run in a fixed order: field validation, the item formula, the
/// bill aggregates, then split reconciliation for every item in submission
/// order. The first failure is returned.
pub fn reconcile(
    bill_id: BillId,
    request: &ConfirmBillRequest,
    currency: Currency,
) -> Result<ReconciliationPlan, BillError> {
    // 1. Field validation
    if request.title.trim().is_empty() {
        return Err(BillError::validation("title", "title must not be empty"));
    }
    let rate = validate_tax_rate(request.bill.tax_percentage)?;
    let rounding = exact_money(request.bill.rounding, currency, "bill.rounding")?;

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(request.items.len());
    let mut pricings = Vec::with_capacity(request.items.len());
    for (index, item) in request.items.iter().enumerate() {
        let field = format!("items[{index}]");
        if item.temp_item_id.is_blank() {
            return Err(BillError::validation(
                format!("{field}.tempItemId"),
                "tempItemId must not be empty",
            ));
        }
        if !seen.insert(item.temp_item_id.clone()) {
            return Err(BillError::validation(
                format!("{field}.tempItemId"),
                format!("duplicate tempItemId {}", item.temp_item_id),
            ));
        }
        if item.name.trim().is_empty() {
            return Err(BillError::validation(
                format!("{field}.name"),
                "item name must not be empty",
            ));
        }

        storable(item.quantity, &format!("{field}.quantity"))?;
        let pricing = ItemPricing::new(item.quantity, item.unit_price)
            .with_discount(item.discount)
            .with_tax_override(item.tax);
        pricing.validate(&field)?;

        items.push(PlannedItem {
            temp_item_id: item.temp_item_id.clone(),
            name: item.name.trim().to_string(),
            quantity: item.quantity,
            unit_price: exact_money(item.unit_price, currency, &format!("{field}.unitPrice"))?,
            discount: exact_money(item.discount, currency, &format!("{field}.discount"))?,
            tax: exact_money(item.tax, currency, &format!("{field}.tax"))?,
            total_price: exact_money(item.total_price, currency, &format!("{field}.totalPrice"))?,
            description: item.description.clone(),
        });
        pricings.push(pricing);
    }

    let mut roster = HashSet::new();
    let mut participants = Vec::with_capacity(request.participants.len());
    for (index, participant) in request.participants.iter().enumerate() {
        if participant.display_name.trim().is_empty() {
            return Err(BillError::validation(
                format!("participants[{index}].displayName"),
                "display name must not be empty",
            ));
        }
        if let Some(user_id) = participant.user_id {
            roster.insert(user_id);
        }
        participants.push(PlannedParticipant {
            user_id: participant.user_id,
            display_name: participant.display_name.trim().to_string(),
        });
    }

    let mut pairs = HashSet::new();
    let mut splits = Vec::with_capacity(request.splits.len());
    for (index, split) in request.splits.iter().enumerate() {
        let field = format!("splits[{index}]");
        non_negative(split.amount, &format!("{field}.amount"))?;
        let amount = exact_money(split.amount, currency, &format!("{field}.amount"))?;
        if !seen.contains(&split.temp_item_id) {
            return Err(BillError::validation(
                format!("{field}.tempItemId"),
                format!("split references unknown item {}", split.temp_item_id),
            ));
        }
        if !roster.contains(&split.user_id) {
            return Err(BillError::validation(
                format!("{field}.userId"),
                format!("user {} is not a participant of this bill", split.user_id),
            ));
        }
        if !pairs.insert((split.temp_item_id.clone(), split.user_id)) {
            return Err(BillError::validation(
                format!("{field}.userId"),
                format!(
                    "user {} already has a split on item {}",
                    split.user_id, split.temp_item_id
                ),
            ));
        }
        splits.push(PlannedSplit {
            temp_item_id: split.temp_item_id.clone(),
            user_id: split.user_id,
            amount,
        });
    }

    // 2. Item formula, using the submitted tax as an explicit override
    let mut priced = Vec::with_capacity(pricings.len());
    for (index, (pricing, item)) in pricings.iter().zip(&items).enumerate() {
        let field = format!("items[{index}]");
        let derived = price_item(pricing, rate, currency, &field)?;
        if derived.total_price != item.total_price {
            return Err(BillError::validation(
                format!("{field}.totalPrice"),
                format!(
                    "total price {} does not match quantity * unit price - discount + tax = {}",
                    item.total_price.amount(),
                    derived.total_price.amount()
                ),
            ));
        }
        priced.push(derived);
    }

    // 3. Aggregates
    let totals = aggregate(&priced, request.bill.tax_percentage, rounding.amount(), currency)?;
    storable(totals.subtotal.amount(), "bill.subtotal")?;
    storable(totals.total_amount.amount(), "bill.totalAmount")?;
    check_aggregate("subtotal", request.bill.subtotal, totals.subtotal)?;
    check_aggregate("totalDiscount", request.bill.total_discount, totals.total_discount)?;
    check_aggregate("tax", request.bill.tax, totals.tax)?;
    check_aggregate("totalAmount", request.bill.total_amount, totals.total_amount)?;

    let plan = ReconciliationPlan {
        bill_id,
        trip_id: request.trip_id,
        title: request.title.trim().to_string(),
        merchant_name: request
            .merchant_name
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        paid_by: request.paid_by_id,
        currency,
        totals,
        items,
        participants,
        splits,
    };

    // 4. Splits, every item in submission order
    let allocator = plan.allocator()?;
    for item in &plan.items {
        allocator.validate(&item.temp_item_id, item.total_price)?;
    }
    Ok(plan)
}

impl ReconciliationPlan {
    /// Builds a split allocator from the plan's splits
    pub fn allocator(&self) -> Result<SplitAllocator, BillError> {
        let mut allocator = SplitAllocator::new();
        for split in &self.splits {
            allocator.set_amount(&split.temp_item_id, split.user_id, split.amount)?;
        }
        Ok(allocator)
    }

    /// Verifies split reconciliation through resolved server item ids
    ///
    /// Run inside the confirm transaction once every item has been inserted.
    /// Items are checked in submission order and the first mismatch wins.
    pub fn verify_splits(&self, ids: &ItemIdMap) -> Result<(), BillError> {
        let mut sums: HashMap<BillItemId, Money> = HashMap::new();
        for split in &self.splits {
            let item_id = ids.resolve(&split.temp_item_id)?;
            let entry = sums
                .entry(item_id)
                .or_insert_with(|| Money::zero(self.currency));
            *entry = entry.checked_add(&split.amount)?;
        }

        for item in &self.items {
            let item_id = ids.resolve(&item.temp_item_id)?;
            let submitted = sums
                .get(&item_id)
                .copied()
                .unwrap_or_else(|| Money::zero(self.currency));
            if submitted != item.total_price {
                return Err(BillError::SplitMismatch {
                    item: item.temp_item_id.clone(),
                    submitted_sum: submitted.amount(),
                    expected_total: item.total_price.amount(),
                });
            }
        }
        Ok(())
    }

    /// Materializes the plan into a full bill record
    ///
    /// Used by adapters that hold whole records; assigns fresh server ids to
    /// items, participants and splits and re-verifies the splits through the
    /// resulting id map.
    pub fn into_record(self, created_at: DateTime<Utc>) -> Result<(BillRecord, ItemIdMap), BillError> {
        let mut ids = ItemIdMap::new();
        let items: Vec<BillItem> = self
            .items
            .iter()
            .map(|item| {
                let id = BillItemId::new_v7();
                ids.insert(item.temp_item_id.clone(), id);
                BillItem {
                    id,
                    bill_id: self.bill_id,
                    temp_item_id: item.temp_item_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount: item.discount,
                    tax: item.tax,
                    total_price: item.total_price,
                    description: item.description.clone(),
                }
            })
            .collect();

        self.verify_splits(&ids)?;

        let participants = self
            .participants
            .iter()
            .map(|p| Participant {
                id: ParticipantId::new_v7(),
                bill_id: self.bill_id,
                user_id: p.user_id,
                display_name: p.display_name.clone(),
            })
            .collect();

        let splits = self
            .splits
            .iter()
            .map(|s| {
                Ok(Split {
                    id: SplitId::new_v7(),
                    bill_id: self.bill_id,
                    bill_item_id: ids.resolve(&s.temp_item_id)?,
                    user_id: s.user_id,
                    amount: s.amount,
                })
            })
            .collect::<Result<Vec<_>, BillError>>()?;

        let bill = Bill {
            id: self.bill_id,
            trip_id: self.trip_id,
            title: self.title,
            merchant_name: self.merchant_name,
            paid_by: self.paid_by,
            currency: self.currency,
            totals: self.totals,
            created_at,
        };

        Ok((
            BillRecord {
                bill,
                items,
                participants,
                splits,
            },
            ids,
        ))
    }
}
