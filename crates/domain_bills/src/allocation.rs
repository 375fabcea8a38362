//! Split allocator
//!
//! Maps each line item, keyed by its stable client id, to the users sharing
//! it and the amount each one owes. Item reordering and removal never
//! disturb another item's allocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, TempItemId, UserId};
use crate::error::BillError;

/// One user's share of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub user_id: UserId,
    pub amount: Money,
}

/// Per-item split assignments of a draft bill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAllocator {
    items: BTreeMap<TempItemId, Vec<Allocation>>,
}

impl SplitAllocator {
    /// Creates an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a user to an item with a zero share
    ///
    /// Assigning an already-assigned user leaves the existing share alone.
    /// Returns true if the user was newly assigned.
    pub fn assign(&mut self, item: &TempItemId, user_id: UserId, currency: Currency) -> bool {
        let shares = self.items.entry(item.clone()).or_default();
        if shares.iter().any(|a| a.user_id == user_id) {
            return false;
        }
        shares.push(Allocation {
            user_id,
            amount: Money::zero(currency),
        });
        true
    }

    /// Removes a user from an item
    ///
    /// Returns true if the user had been assigned.
    pub fn unassign(&mut self, item: &TempItemId, user_id: UserId) -> bool {
        let Some(shares) = self.items.get_mut(item) else {
            return false;
        };
        let before = shares.len();
        shares.retain(|a| a.user_id != user_id);
        let removed = shares.len() != before;
        if shares.is_empty() {
            self.items.remove(item);
        }
        removed
    }

    /// Sets a user's share of an item, assigning the user if needed
    pub fn set_amount(
        &mut self,
        item: &TempItemId,
        user_id: UserId,
        amount: Money,
    ) -> Result<(), BillError> {
        if amount.is_negative() {
            return Err(BillError::validation(
                format!("splits[{item}].amount"),
                format!("split amount must not be negative, got {}", amount.amount()),
            ));
        }

        let shares = self.items.entry(item.clone()).or_default();
        match shares.iter_mut().find(|a| a.user_id == user_id) {
            Some(existing) => existing.amount = amount,
            None => shares.push(Allocation { user_id, amount }),
        }
        Ok(())
    }

    /// Divides `total` evenly among the item's assigned users
    ///
    /// Every share but the last is `round(total / n)`; the last user absorbs
    /// the residual so the shares sum exactly to `total`.
    ///
    /// # Errors
    ///
    /// Returns `BillError::Validation` when no user is assigned, or when the
    /// residual would leave the last user a negative share (a total of a few
    /// cents over many users). The existing shares are left untouched.
    pub fn split_evenly(
        &mut self,
        item: &TempItemId,
        total: Money,
    ) -> Result<&[Allocation], BillError> {
        let shares = match self.items.get_mut(item) {
            Some(shares) if !shares.is_empty() => shares,
            _ => {
                return Err(BillError::validation(
                    format!("splits[{item}]"),
                    "no users are assigned to this item",
                ))
            }
        };

        let amounts = total.split_evenly(shares.len())?;
        if let Some(last) = amounts.last().filter(|a| a.is_negative()) {
            return Err(BillError::validation(
                format!("splits[{item}]"),
                format!(
                    "{} cannot be split evenly among {} users, the last share would be {}",
                    total.amount(),
                    amounts.len(),
                    last.amount()
                ),
            ));
        }
        for (share, amount) in shares.iter_mut().zip(amounts) {
            share.amount = amount;
        }
        Ok(shares.as_slice())
    }

    /// Checks that the item's shares sum exactly to `total`
    ///
    /// An item with a zero total may have no shares at all.
    ///
    /// # Errors
    ///
    /// Returns `BillError::SplitMismatch` with the submitted sum and the
    /// expected total when they differ.
    pub fn validate(&self, item: &TempItemId, total: Money) -> Result<(), BillError> {
        let submitted = Money::checked_sum(
            total.currency(),
            self.allocations(item).iter().map(|a| &a.amount),
        )?;

        if submitted != total {
            return Err(BillError::SplitMismatch {
                item: item.clone(),
                submitted_sum: submitted.amount(),
                expected_total: total.amount(),
            });
        }
        Ok(())
    }

    /// Drops every share of one item
    pub fn remove_item(&mut self, item: &TempItemId) -> Option<Vec<Allocation>> {
        self.items.remove(item)
    }

    /// Returns the shares of one item in assignment order
    pub fn allocations(&self, item: &TempItemId) -> &[Allocation] {
        self.items.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the users assigned to one item
    pub fn assignees(&self, item: &TempItemId) -> Vec<UserId> {
        self.allocations(item).iter().map(|a| a.user_id).collect()
    }

    /// Iterates over every item that has at least one share
    pub fn iter(&self) -> impl Iterator<Item = (&TempItemId, &[Allocation])> {
        self.items.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Total number of shares across all items
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// Returns true if no item has any share
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes a user from every item
    pub fn remove_user(&mut self, user_id: UserId) {
        for shares in self.items.values_mut() {
            shares.retain(|a| a.user_id != user_id);
        }
        self.items.retain(|_, shares| !shares.is_empty());
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn total_cents() -> impl Strategy<Value = i64> {
        prop_oneof![0i64..200, 0i64..10_000_000]
    }

    proptest! {
        #[test]
        fn even_split_validates_or_is_refused(
            total_cents in total_cents(),
            users in 1usize..60,
        ) {
            let item = TempItemId::generate();
            let total = Money::from_minor(total_cents, Currency::USD);
            let mut allocator = SplitAllocator::new();
            for _ in 0..users {
                allocator.assign(&item, UserId::new(), Currency::USD);
            }

            let outcome = allocator.split_evenly(&item, total).map(<[Allocation]>::to_vec);
            match outcome {
                Ok(shares) => {
                    let expected = Money::new(total.amount() / Decimal::from(users as u64), Currency::USD);
                    for share in &shares[..users - 1] {
                        prop_assert_eq!(share.amount, expected);
                    }
                    prop_assert!(shares.iter().all(|s| !s.amount.is_negative()));
                    prop_assert!(allocator.validate(&item, total).is_ok());
                }
                Err(BillError::Validation { .. }) => {
                    prop_assert!(expected_share_rounds_up(total, users));
                    prop_assert!(allocator.allocations(&item).iter().all(|a| a.amount.is_zero()));
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }

    fn expected_share_rounds_up(total: Money, users: usize) -> bool {
        let share = Money::new(total.amount() / Decimal::from(users as u64), Currency::USD);
        share.amount() * Decimal::from(users as u64) > total.amount()
    }
}
