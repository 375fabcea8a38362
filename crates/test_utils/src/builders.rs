//! Test Data Builders
//!
//! Builders let tests state only the fields that matter and take defaults
//! for everything else. Confirm requests are assembled through a real
//! [`BillDraft`], so the totals they carry are the ones the editor would
//! submit.

use rust_decimal::Decimal;

use core_kernel::{Currency, TempItemId, TripId, UserId};
use domain_bills::{BillDraft, ConfirmBillRequest, ItemInput, NewBill};

use crate::fixtures::{StringFixtures, TripFixture};

/// Builder for bill shells
pub struct NewBillBuilder {
    trip_id: TripId,
    title: String,
    paid_by: UserId,
    currency: Currency,
}

impl NewBillBuilder {
    pub fn new(trip_id: TripId, paid_by: UserId) -> Self {
        Self {
            trip_id,
            title: StringFixtures::bill_title().to_string(),
            paid_by,
            currency: Currency::USD,
        }
    }

    pub fn for_trip(trip: &TripFixture) -> Self {
        Self::new(trip.trip_id, trip.alice)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn build(self) -> NewBill {
        NewBill {
            trip_id: self.trip_id,
            title: self.title,
            paid_by: self.paid_by,
            currency: self.currency,
        }
    }
}

/// Builder for confirm requests
///
/// Panics on invalid input; it is meant for tests only.
pub struct ConfirmRequestBuilder {
    draft: BillDraft,
}

impl ConfirmRequestBuilder {
    /// Empty USD draft titled "Dinner"
    pub fn new(trip_id: TripId, paid_by: UserId) -> Self {
        Self {
            draft: BillDraft::new(trip_id, StringFixtures::bill_title(), paid_by, Currency::USD),
        }
    }

    /// Draft paid by Alice with every member of the trip on the roster
    pub fn for_trip(trip: &TripFixture) -> Self {
        trip.members()
            .into_iter()
            .fold(Self::new(trip.trip_id, trip.alice), |builder, (user, name)| {
                builder.with_participant(user, name)
            })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.draft.title = title.into();
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.draft.merchant_name = Some(merchant.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.draft.currency = currency;
        self
    }

    pub fn paid_by(mut self, user: UserId) -> Self {
        self.draft.paid_by = user;
        self
    }

    pub fn with_participant(mut self, user: UserId, name: &str) -> Self {
        self.draft
            .add_participant(Some(user), name)
            .expect("valid participant");
        self
    }

    /// Adds a participant without an account
    pub fn with_guest(mut self, name: &str) -> Self {
        self.draft.add_participant(None, name).expect("valid guest");
        self
    }

    /// Bill tax rate in percent
    pub fn with_tax_rate(mut self, percent: Decimal) -> Self {
        self.draft.set_tax_rate(percent).expect("valid tax rate");
        self
    }

    pub fn with_rounding(mut self, rounding: Decimal) -> Self {
        self.draft.set_rounding(rounding);
        self
    }

    fn add_item(&mut self, name: &str, quantity: Decimal, unit_price: Decimal, discount: Decimal) -> TempItemId {
        self.draft
            .add_item(ItemInput {
                name: name.to_string(),
                quantity,
                unit_price,
                discount,
                description: None,
            })
            .expect("valid item")
    }

    /// Adds an item split evenly among `users`
    pub fn with_even_item(mut self, name: &str, quantity: Decimal, unit_price: Decimal, users: &[UserId]) -> Self {
        let id = self.add_item(name, quantity, unit_price, Decimal::ZERO);
        for user in users {
            self.draft.assign(&id, *user).expect("participant");
        }
        if !users.is_empty() {
            self.draft.split_evenly(&id).expect("even split");
        }
        self
    }

    /// Adds a discounted item split evenly among `users`
    pub fn with_discounted_item(
        mut self,
        name: &str,
        quantity: Decimal,
        unit_price: Decimal,
        discount: Decimal,
        users: &[UserId],
    ) -> Self {
        let id = self.add_item(name, quantity, unit_price, discount);
        for user in users {
            self.draft.assign(&id, *user).expect("participant");
        }
        self.draft.split_evenly(&id).expect("even split");
        self
    }

    /// Adds an item with explicit shares, which need not add up
    pub fn with_shared_item(
        mut self,
        name: &str,
        quantity: Decimal,
        unit_price: Decimal,
        shares: &[(UserId, Decimal)],
    ) -> Self {
        let id = self.add_item(name, quantity, unit_price, Decimal::ZERO);
        for (user, amount) in shares {
            self.draft.set_amount(&id, *user, *amount).expect("participant");
        }
        self
    }

    /// Overrides the tax of the most recently added item
    pub fn with_last_item_tax(mut self, tax: Decimal) -> Self {
        let id = self
            .draft
            .items()
            .last()
            .map(|i| i.temp_item_id.clone())
            .expect("an item to override");
        self.draft.override_item_tax(&id, tax).expect("valid tax");
        self
    }

    pub fn draft(&self) -> &BillDraft {
        &self.draft
    }

    pub fn into_draft(self) -> BillDraft {
        self.draft
    }

    pub fn build(self) -> ConfirmBillRequest {
        self.draft.into_confirm_request().expect("consistent draft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_even_item_carries_draft_totals() {
        let trip = TripFixture::new();
        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_tax_rate(dec!(6))
            .with_even_item("Ramen", dec!(2), dec!(10.00), &[trip.alice, trip.bob])
            .build();

        assert_eq!(request.participants.len(), 3);
        assert_eq!(request.items[0].total_price, dec!(21.20));
        assert_eq!(request.bill.total_amount, dec!(21.20));
        let shares: Decimal = request.splits.iter().map(|s| s.amount).sum();
        assert_eq!(shares, dec!(21.20));
    }

    #[test]
    fn test_shared_item_keeps_submitted_amounts() {
        let trip = TripFixture::new();
        let request = ConfirmRequestBuilder::for_trip(&trip)
            .with_shared_item("Set meal", dec!(1), dec!(20.00), &[(trip.alice, dec!(19.99))])
            .build();

        assert_eq!(request.splits.len(), 1);
        assert_eq!(request.splits[0].amount, dec!(19.99));
        assert_eq!(request.items[0].total_price, dec!(20.00));
    }

    #[test]
    fn test_new_bill_defaults() {
        let trip = TripFixture::new();
        let bill = NewBillBuilder::for_trip(&trip).with_currency(Currency::MYR).build();
        assert_eq!(bill.paid_by, trip.alice);
        assert_eq!(bill.currency, Currency::MYR);
        assert_eq!(bill.title, "Dinner");
    }
}
