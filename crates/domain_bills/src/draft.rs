//! Editable bill draft
//!
//! The state a client edits before confirming: ordered items keyed by
//! stable client ids, bill-level tax and rounding, the participant roster
//! and the split allocator. All derived figures come from [`BillDraft::recompute`];
//! nothing derived is stored on the draft itself.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{Currency, Money, TempItemId, TripId, UserId};
use crate::aggregate::{recompute, Recomputation};
use crate::allocation::{Allocation, SplitAllocator};
use crate::bill::BillRecord;
use crate::error::BillError;
use crate::pricing::{price_item, validate_tax_rate, ItemPricing, PricedItem, MAX_FRACTION_DIGITS};
use crate::reconciliation::{
    exact_money, ConfirmBillRequest, ConfirmItem, ConfirmParticipant, ConfirmSplit, ConfirmTotals,
};

/// Editable fields of one line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// One item of a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    pub temp_item_id: TempItemId,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// Explicit manual tax; `None` means the bill rate applies
    pub tax_override: Option<Decimal>,
    pub description: Option<String>,
}

impl DraftItem {
    fn pricing(&self) -> ItemPricing {
        ItemPricing {
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
            tax_override: self.tax_override,
        }
    }
}

/// One person on a draft's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftParticipant {
    pub user_id: Option<UserId>,
    pub display_name: String,
}

/// One line of a parsed receipt; `price` is the line total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    pub price: Decimal,
}

/// Best-effort receipt parse produced by the external OCR/AI parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<ParsedLine>,
}

/// Editable, unconfirmed state of a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillDraft {
    pub trip_id: TripId,
    pub title: String,
    pub merchant_name: Option<String>,
    pub paid_by: UserId,
    pub currency: Currency,
    tax_rate_percent: Decimal,
    rounding: Decimal,
    items: Vec<DraftItem>,
    participants: Vec<DraftParticipant>,
    allocator: SplitAllocator,
}

impl BillDraft {
    /// Creates an empty draft
    pub fn new(trip_id: TripId, title: impl Into<String>, paid_by: UserId, currency: Currency) -> Self {
        Self {
            trip_id,
            title: title.into(),
            merchant_name: None,
            paid_by,
            currency,
            tax_rate_percent: Decimal::ZERO,
            rounding: Decimal::ZERO,
            items: Vec::new(),
            participants: Vec::new(),
            allocator: SplitAllocator::new(),
        }
    }

    /// Re-opens a confirmed bill for editing
    ///
    /// Persisted items keep their client ids so the splits re-attach. An
    /// item whose stored tax differs from the rate-derived tax comes back
    /// with that tax as an explicit override.
    pub fn from_record(record: &BillRecord) -> Result<Self, BillError> {
        let bill = &record.bill;
        let mut draft = Self::new(bill.trip_id, bill.title.clone(), bill.paid_by, bill.currency);
        draft.merchant_name = bill.merchant_name.clone();
        draft.tax_rate_percent = bill.totals.tax_percentage;
        draft.rounding = bill.totals.rounding.amount();
        let rate = validate_tax_rate(draft.tax_rate_percent)?;

        let mut temp_ids = HashMap::with_capacity(record.items.len());
        for item in &record.items {
            let pricing = ItemPricing::new(item.quantity, item.unit_price.amount())
                .with_discount(item.discount.amount());
            let derived = price_item(&pricing, rate, bill.currency, "items")?;
            let tax_override = (derived.tax != item.tax).then(|| item.tax.amount());

            temp_ids.insert(item.id, item.temp_item_id.clone());
            draft.items.push(DraftItem {
                temp_item_id: item.temp_item_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.amount(),
                discount: item.discount.amount(),
                tax_override,
                description: item.description.clone(),
            });
        }

        for participant in &record.participants {
            draft.participants.push(DraftParticipant {
                user_id: participant.user_id,
                display_name: participant.display_name.clone(),
            });
        }

        for split in &record.splits {
            let temp = temp_ids
                .get(&split.bill_item_id)
                .ok_or_else(|| BillError::not_found("BillItem", split.bill_item_id))?;
            draft.allocator.set_amount(temp, split.user_id, split.amount)?;
        }

        Ok(draft)
    }

    /// Seeds a draft from a parsed receipt
    ///
    /// Each line's `price` is its line total, so the unit price is
    /// `round(price / quantity)` with a missing or zero quantity read as 1.
    /// The receipt currency wins over `default_currency` when it parses.
    pub fn from_parsed_receipt(
        receipt: &ParsedReceipt,
        trip_id: TripId,
        paid_by: UserId,
        default_currency: Currency,
    ) -> Result<Self, BillError> {
        let currency = receipt
            .currency
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(default_currency);
        let merchant = receipt
            .merchant
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        let title = merchant.clone().unwrap_or_else(|| "Receipt".to_string());

        let mut draft = Self::new(trip_id, title, paid_by, currency);
        draft.merchant_name = merchant;

        for line in &receipt.items {
            let quantity = match line.quantity.map(|q| q.round_dp(MAX_FRACTION_DIGITS)) {
                Some(q) if !q.is_zero() => q,
                _ => Decimal::ONE,
            };
            let unit_price = Money::round_half_up(line.price / quantity, currency).amount();
            draft.add_item(ItemInput {
                name: line.name.clone(),
                quantity,
                unit_price,
                discount: Decimal::ZERO,
                description: None,
            })?;
        }

        if let Some(total) = receipt.total {
            let computed = draft.recompute()?.totals.total_amount;
            if computed.amount() != total {
                debug!(
                    parsed_total = %total,
                    computed_total = %computed.amount(),
                    "Parsed receipt total differs from its items"
                );
            }
        }

        Ok(draft)
    }

    pub fn tax_rate_percent(&self) -> Decimal {
        self.tax_rate_percent
    }

    pub fn rounding(&self) -> Decimal {
        self.rounding
    }

    pub fn items(&self) -> &[DraftItem] {
        &self.items
    }

    pub fn participants(&self) -> &[DraftParticipant] {
        &self.participants
    }

    pub fn allocator(&self) -> &SplitAllocator {
        &self.allocator
    }

    fn index_of(&self, id: &TempItemId) -> Result<usize, BillError> {
        self.items
            .iter()
            .position(|i| &i.temp_item_id == id)
            .ok_or_else(|| BillError::not_found("BillItem", id))
    }

    /// Applies the same input rules a confirm applies, so that a draft
    /// which validates also confirms
    fn check_item(&self, item: &DraftItem) -> Result<(), BillError> {
        if item.name.trim().is_empty() {
            return Err(BillError::validation("name", "item name must not be empty"));
        }
        item.pricing().validate("item")?;
        exact_money(item.unit_price, self.currency, "item.unitPrice")?;
        exact_money(item.discount, self.currency, "item.discount")?;
        if let Some(tax) = item.tax_override {
            exact_money(tax, self.currency, "item.tax")?;
        }
        Ok(())
    }

    /// Appends an item under a fresh client id
    pub fn add_item(&mut self, input: ItemInput) -> Result<TempItemId, BillError> {
        let item = DraftItem {
            temp_item_id: TempItemId::generate(),
            name: input.name,
            quantity: input.quantity,
            unit_price: input.unit_price,
            discount: input.discount,
            tax_override: None,
            description: input.description,
        };
        self.check_item(&item)?;
        let id = item.temp_item_id.clone();
        self.items.push(item);
        Ok(id)
    }

    /// Replaces an item's editable fields, keeping its splits and override
    pub fn update_item(&mut self, id: &TempItemId, input: ItemInput) -> Result<(), BillError> {
        let index = self.index_of(id)?;
        let updated = DraftItem {
            temp_item_id: id.clone(),
            name: input.name,
            quantity: input.quantity,
            unit_price: input.unit_price,
            discount: input.discount,
            tax_override: self.items[index].tax_override,
            description: input.description,
        };
        self.check_item(&updated)?;
        self.items[index] = updated;
        Ok(())
    }

    /// Removes an item and only that item's splits
    pub fn remove_item(&mut self, id: &TempItemId) -> Result<DraftItem, BillError> {
        let index = self.index_of(id)?;
        self.allocator.remove_item(id);
        Ok(self.items.remove(index))
    }

    /// Moves an item to a new position; splits are unaffected
    pub fn move_item(&mut self, id: &TempItemId, position: usize) -> Result<(), BillError> {
        let index = self.index_of(id)?;
        let item = self.items.remove(index);
        let position = position.min(self.items.len());
        self.items.insert(position, item);
        Ok(())
    }

    pub fn set_tax_rate(&mut self, percent: Decimal) -> Result<(), BillError> {
        validate_tax_rate(percent)?;
        self.tax_rate_percent = percent;
        Ok(())
    }

    pub fn set_rounding(&mut self, rounding: Decimal) {
        self.rounding = rounding;
    }

    /// Sets an explicit manual tax on one item
    pub fn override_item_tax(&mut self, id: &TempItemId, tax: Decimal) -> Result<(), BillError> {
        let index = self.index_of(id)?;
        let mut item = self.items[index].clone();
        item.tax_override = Some(tax);
        self.check_item(&item)?;
        self.items[index] = item;
        Ok(())
    }

    /// Returns an item to the bill-level tax rate
    pub fn clear_tax_override(&mut self, id: &TempItemId) -> Result<(), BillError> {
        let index = self.index_of(id)?;
        self.items[index].tax_override = None;
        Ok(())
    }

    /// Adds a person to the roster
    pub fn add_participant(&mut self, user_id: Option<UserId>, display_name: impl Into<String>) -> Result<(), BillError> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(BillError::validation("displayName", "display name must not be empty"));
        }
        if let Some(user) = user_id {
            if self.participants.iter().any(|p| p.user_id == Some(user)) {
                return Ok(());
            }
        }
        self.participants.push(DraftParticipant { user_id, display_name });
        Ok(())
    }

    /// Removes a user from the roster and from every item
    pub fn remove_participant(&mut self, user_id: UserId) {
        self.participants.retain(|p| p.user_id != Some(user_id));
        self.allocator.remove_user(user_id);
    }

    fn check_participant(&self, user_id: UserId) -> Result<(), BillError> {
        if self.participants.iter().any(|p| p.user_id == Some(user_id)) {
            Ok(())
        } else {
            Err(BillError::validation(
                "userId",
                format!("user {user_id} is not a participant of this bill"),
            ))
        }
    }

    pub fn assign(&mut self, id: &TempItemId, user_id: UserId) -> Result<bool, BillError> {
        self.index_of(id)?;
        self.check_participant(user_id)?;
        Ok(self.allocator.assign(id, user_id, self.currency))
    }

    pub fn unassign(&mut self, id: &TempItemId, user_id: UserId) -> Result<bool, BillError> {
        self.index_of(id)?;
        Ok(self.allocator.unassign(id, user_id))
    }

    pub fn set_amount(&mut self, id: &TempItemId, user_id: UserId, amount: Decimal) -> Result<(), BillError> {
        self.index_of(id)?;
        self.check_participant(user_id)?;
        self.allocator
            .set_amount(id, user_id, Money::round_half_up(amount, self.currency))
    }

    /// Prices one item at the current tax rate
    pub fn price_of(&self, id: &TempItemId) -> Result<PricedItem, BillError> {
        let index = self.index_of(id)?;
        let rate = validate_tax_rate(self.tax_rate_percent)?;
        price_item(&self.items[index].pricing(), rate, self.currency, &format!("items[{index}]"))
    }

    /// Splits one item's current total evenly among its assigned users
    pub fn split_evenly(&mut self, id: &TempItemId) -> Result<Vec<Allocation>, BillError> {
        let total = self.price_of(id)?.total_price;
        Ok(self.allocator.split_evenly(id, total)?.to_vec())
    }

    /// Checks one item's splits against its current total
    pub fn validate(&self, id: &TempItemId) -> Result<(), BillError> {
        let total = self.price_of(id)?.total_price;
        self.allocator.validate(id, total)
    }

    /// Checks every item in display order, stopping at the first mismatch
    pub fn validate_all(&self) -> Result<(), BillError> {
        self.items
            .iter()
            .try_for_each(|item| self.validate(&item.temp_item_id))
    }

    /// Re-derives every item and the bill aggregates
    pub fn recompute(&self) -> Result<Recomputation, BillError> {
        let pricings: Vec<ItemPricing> = self.items.iter().map(DraftItem::pricing).collect();
        recompute(&pricings, self.tax_rate_percent, self.rounding, self.currency)
    }

    /// Builds the confirm payload from the current draft state
    pub fn into_confirm_request(&self) -> Result<ConfirmBillRequest, BillError> {
        let Recomputation { items: priced, totals } = self.recompute()?;

        let items = self
            .items
            .iter()
            .zip(&priced)
            .map(|(item, p)| ConfirmItem {
                temp_item_id: item.temp_item_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: p.unit_price.amount(),
                discount: p.discount.amount(),
                tax: p.tax.amount(),
                total_price: p.total_price.amount(),
                description: item.description.clone(),
            })
            .collect();

        let participants = self
            .participants
            .iter()
            .map(|p| ConfirmParticipant {
                id: None,
                bill_id: None,
                user_id: p.user_id,
                display_name: p.display_name.clone(),
            })
            .collect();

        let splits = self
            .items
            .iter()
            .flat_map(|item| {
                self.allocator
                    .allocations(&item.temp_item_id)
                    .iter()
                    .map(move |a| ConfirmSplit {
                        temp_item_id: item.temp_item_id.clone(),
                        bill_id: None,
                        user_id: a.user_id,
                        amount: a.amount.amount(),
                    })
            })
            .collect();

        Ok(ConfirmBillRequest {
            trip_id: self.trip_id,
            title: self.title.clone(),
            merchant_name: self.merchant_name.clone(),
            paid_by_id: self.paid_by,
            bill: ConfirmTotals {
                subtotal: totals.subtotal.amount(),
                tax: totals.tax.amount(),
                tax_percentage: totals.tax_percentage,
                total_discount: totals.total_discount.amount(),
                rounding: totals.rounding.amount(),
                total_amount: totals.total_amount.amount(),
            },
            items,
            participants,
            splits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::reconcile;
    use chrono::Utc;
    use core_kernel::BillId;
    use rust_decimal_macros::dec;

    fn input(name: &str, quantity: Decimal, unit_price: Decimal) -> ItemInput {
        ItemInput {
            name: name.to_string(),
            quantity,
            unit_price,
            discount: Decimal::ZERO,
            description: None,
        }
    }

    fn draft_with_roster() -> (BillDraft, UserId, UserId) {
        let alice = UserId::new();
        let bob = UserId::new();
        let mut draft = BillDraft::new(TripId::new(), "Dinner", alice, Currency::USD);
        draft.add_participant(Some(alice), "Alice").unwrap();
        draft.add_participant(Some(bob), "Bob").unwrap();
        (draft, alice, bob)
    }

    #[test]
    fn test_remove_item_keeps_other_splits() {
        let (mut draft, alice, bob) = draft_with_roster();
        let a = draft.add_item(input("Ramen", dec!(1), dec!(12.00))).unwrap();
        let b = draft.add_item(input("Gyoza", dec!(1), dec!(6.00))).unwrap();
        let c = draft.add_item(input("Tea", dec!(2), dec!(1.50))).unwrap();

        for id in [&a, &b, &c] {
            draft.assign(id, alice).unwrap();
            draft.assign(id, bob).unwrap();
            draft.split_evenly(id).unwrap();
        }
        let before_c = draft.allocator().allocations(&c).to_vec();

        draft.remove_item(&b).unwrap();

        assert_eq!(draft.items().len(), 2);
        assert!(draft.allocator().allocations(&b).is_empty());
        assert_eq!(draft.allocator().allocations(&c), before_c.as_slice());
        assert!(draft.validate_all().is_ok());
    }

    #[test]
    fn test_reordering_keeps_splits() {
        let (mut draft, alice, _) = draft_with_roster();
        let a = draft.add_item(input("A", dec!(1), dec!(5.00))).unwrap();
        let b = draft.add_item(input("B", dec!(1), dec!(7.00))).unwrap();
        draft.set_amount(&a, alice, dec!(5.00)).unwrap();
        draft.set_amount(&b, alice, dec!(7.00)).unwrap();

        draft.move_item(&b, 0).unwrap();

        assert_eq!(draft.items()[0].temp_item_id, b);
        assert!(draft.validate(&a).is_ok());
        assert!(draft.validate(&b).is_ok());
    }

    #[test]
    fn test_tax_rate_change_invalidates_old_split() {
        let (mut draft, alice, _) = draft_with_roster();
        let a = draft.add_item(input("A", dec!(2), dec!(10.00))).unwrap();
        draft.set_amount(&a, alice, dec!(20.00)).unwrap();
        assert!(draft.validate(&a).is_ok());

        draft.set_tax_rate(dec!(6)).unwrap();
        match draft.validate(&a) {
            Err(BillError::SplitMismatch { expected_total, .. }) => {
                assert_eq!(expected_total, dec!(21.20))
            }
            other => panic!("expected split mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_tax_override_is_explicit() {
        let (mut draft, _, _) = draft_with_roster();
        let a = draft.add_item(input("A", dec!(2), dec!(10.00))).unwrap();
        draft.set_tax_rate(dec!(6)).unwrap();
        draft.override_item_tax(&a, dec!(2.00)).unwrap();

        let priced = draft.price_of(&a).unwrap();
        assert_eq!(priced.tax.amount(), dec!(2.00));
        assert_eq!(priced.total_price.amount(), dec!(22.00));

        draft.clear_tax_override(&a).unwrap();
        assert_eq!(draft.price_of(&a).unwrap().tax.amount(), dec!(1.20));
    }

    #[test]
    fn test_assign_requires_participant() {
        let (mut draft, _, _) = draft_with_roster();
        let a = draft.add_item(input("A", dec!(1), dec!(1.00))).unwrap();
        assert!(matches!(
            draft.assign(&a, UserId::new()),
            Err(BillError::Validation { .. })
        ));
        assert!(matches!(
            draft.assign(&TempItemId::new("missing"), UserId::new()),
            Err(BillError::NotFound { .. })
        ));
    }

    #[test]
    fn test_parsed_receipt_seeds_unit_prices() {
        let receipt = ParsedReceipt {
            merchant: Some("Sushi World".to_string()),
            currency: Some("MYR".to_string()),
            total: Some(dec!(180)),
            items: vec![
                ParsedLine {
                    name: "Salmon Sushi".to_string(),
                    quantity: Some(dec!(4)),
                    price: dec!(80.00),
                },
                ParsedLine {
                    name: "Tuna Roll".to_string(),
                    quantity: Some(dec!(8)),
                    price: dec!(100.00),
                },
                ParsedLine {
                    name: "Green Tea".to_string(),
                    quantity: None,
                    price: dec!(3.50),
                },
            ],
        };
        let draft =
            BillDraft::from_parsed_receipt(&receipt, TripId::new(), UserId::new(), Currency::USD)
                .unwrap();

        assert_eq!(draft.currency, Currency::MYR);
        assert_eq!(draft.title, "Sushi World");
        assert_eq!(draft.items()[0].unit_price, dec!(20.00));
        assert_eq!(draft.items()[1].unit_price, dec!(12.50));
        assert_eq!(draft.items()[2].quantity, dec!(1));

        let result = draft.recompute().unwrap();
        assert_eq!(result.items[0].total_price.amount(), dec!(80.00));
        assert_eq!(result.totals.total_amount.amount(), dec!(183.50));
    }

    #[test]
    fn test_confirm_request_round_trips_through_reconcile() {
        let (mut draft, alice, bob) = draft_with_roster();
        draft.set_tax_rate(dec!(6)).unwrap();
        let a = draft.add_item(input("Ramen", dec!(2), dec!(10.00))).unwrap();
        let b = draft.add_item(input("Tea", dec!(3), dec!(1.11))).unwrap();
        for id in [&a, &b] {
            draft.assign(id, alice).unwrap();
            draft.assign(id, bob).unwrap();
            draft.split_evenly(id).unwrap();
        }

        let request = draft.into_confirm_request().unwrap();
        let plan = reconcile(BillId::new(), &request, Currency::USD).unwrap();
        let (record, _) = plan.into_record(Utc::now()).unwrap();

        let reopened = BillDraft::from_record(&record).unwrap();
        assert_eq!(reopened.items().len(), 2);
        assert!(reopened.items().iter().all(|i| i.tax_override.is_none()));
        assert!(reopened.validate_all().is_ok());
        assert_eq!(reopened.into_confirm_request().unwrap(), request);
    }

    #[test]
    fn test_sub_cent_prices_rejected_on_edit() {
        let (mut draft, _, _) = draft_with_roster();
        match draft.add_item(input("Tea", dec!(3), dec!(3.333))) {
            Err(BillError::Validation { field, .. }) => assert_eq!(field, "item.unitPrice"),
            other => panic!("expected validation error, got {:?}", other),
        }

        let id = draft.add_item(input("Tea", dec!(3), dec!(3.33))).unwrap();
        let mut discounted = input("Tea", dec!(3), dec!(3.33));
        discounted.discount = dec!(0.005);
        assert!(matches!(
            draft.update_item(&id, discounted),
            Err(BillError::Validation { .. })
        ));
        assert!(matches!(
            draft.override_item_tax(&id, dec!(0.125)),
            Err(BillError::Validation { .. })
        ));
        assert!(draft.items()[0].tax_override.is_none());
    }

    #[test]
    fn test_validated_draft_confirms_with_fractional_quantity() {
        let (mut draft, alice, _) = draft_with_roster();
        let id = draft.add_item(input("Fuel", dec!(12.345), dec!(1.99))).unwrap();
        draft.assign(&id, alice).unwrap();
        draft.split_evenly(&id).unwrap();
        assert!(draft.validate_all().is_ok());

        let request = draft.into_confirm_request().unwrap();
        assert!(reconcile(BillId::new(), &request, Currency::USD).is_ok());
    }

    #[test]
    fn test_parsed_quantity_is_kept_to_four_places() {
        let receipt = ParsedReceipt {
            merchant: None,
            currency: None,
            total: None,
            items: vec![ParsedLine {
                name: "Petrol".to_string(),
                quantity: Some(dec!(10.123456)),
                price: dec!(20.25),
            }],
        };
        let draft =
            BillDraft::from_parsed_receipt(&receipt, TripId::new(), UserId::new(), Currency::USD)
                .unwrap();
        assert_eq!(draft.items()[0].quantity, dec!(10.1235));
    }

    #[test]
    fn test_negative_quantity_rejected_on_add() {
        let (mut draft, _, _) = draft_with_roster();
        assert!(matches!(
            draft.add_item(input("A", dec!(-1), dec!(1.00))),
            Err(BillError::Validation { .. })
        ));
    }
}
