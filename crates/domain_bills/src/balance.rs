//! Balance calculator
//!
//! Net balances are derived from a trip's persisted bills on every request
//! and never stored. The payer of a bill is credited with its total amount;
//! every split debits its user by the split amount. Positive balances are
//! owed money, negative balances owe money.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, UserId};
use crate::bill::BillRecord;
use crate::error::BillError;

/// Net signed balance per user across a set of bills
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub currency: Currency,
    pub balances: BTreeMap<UserId, Money>,
}

impl BalanceSheet {
    /// An empty sheet
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            balances: BTreeMap::new(),
        }
    }

    /// Returns one user's balance, zero if the user never appears
    pub fn balance_of(&self, user_id: UserId) -> Money {
        self.balances
            .get(&user_id)
            .copied()
            .unwrap_or_else(|| Money::zero(self.currency))
    }

    /// Sum of every balance
    ///
    /// Zero whenever each bill's total equals the sum of its splits. A bill
    /// with a non-zero rounding adjustment leaves that adjustment here.
    pub fn net(&self) -> Money {
        let sum: Decimal = self.balances.values().map(|m| m.amount()).sum();
        Money::new(sum, self.currency)
    }

    /// Signed amounts keyed by user, the wire shape of a balance query
    pub fn amounts(&self) -> BTreeMap<UserId, Decimal> {
        self.balances
            .iter()
            .map(|(user, money)| (*user, money.amount()))
            .collect()
    }

    fn post(&mut self, user_id: UserId, delta: Money) -> Result<(), BillError> {
        let current = self.balance_of(user_id);
        self.balances.insert(user_id, current.checked_add(&delta)?);
        Ok(())
    }
}

/// Computes net balances over all bills of a trip
///
/// # Errors
///
/// Returns `BillError::Money` if a bill is in a different currency than
/// the sheet.
pub fn calculate_balances<'a>(
    currency: Currency,
    bills: impl IntoIterator<Item = &'a BillRecord>,
) -> Result<BalanceSheet, BillError> {
    let mut sheet = BalanceSheet::empty(currency);
    for record in bills {
        sheet.post(record.bill.paid_by, record.bill.totals.total_amount)?;
        for split in &record.splits {
            sheet.post(split.user_id, -split.amount)?;
        }
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::{Bill, BillTotals, Split};
    use chrono::Utc;
    use core_kernel::{BillId, BillItemId, SplitId, TripId};
    use rust_decimal_macros::dec;

    fn record(paid_by: UserId, total: Decimal, shares: &[(UserId, Decimal)]) -> BillRecord {
        let bill_id = BillId::new();
        let item_id = BillItemId::new();
        let usd = |d| Money::new(d, Currency::USD);
        BillRecord {
            bill: Bill {
                id: bill_id,
                trip_id: TripId::new(),
                title: "Bill".to_string(),
                merchant_name: None,
                paid_by,
                currency: Currency::USD,
                totals: BillTotals {
                    subtotal: usd(total),
                    total_amount: usd(total),
                    ..BillTotals::zero(Currency::USD)
                },
                created_at: Utc::now(),
            },
            items: vec![],
            participants: vec![],
            splits: shares
                .iter()
                .map(|(user, amount)| Split {
                    id: SplitId::new(),
                    bill_id,
                    bill_item_id: item_id,
                    user_id: *user,
                    amount: usd(*amount),
                })
                .collect(),
        }
    }

    #[test]
    fn test_payer_is_owed_others_owe() {
        let alice = UserId::new();
        let bob = UserId::new();
        let bills = [record(alice, dec!(30.00), &[(alice, dec!(15.00)), (bob, dec!(15.00))])];

        let sheet = calculate_balances(Currency::USD, &bills).unwrap();
        assert_eq!(sheet.balance_of(alice).amount(), dec!(15.00));
        assert_eq!(sheet.balance_of(bob).amount(), dec!(-15.00));
        assert!(sheet.net().is_zero());
    }

    #[test]
    fn test_balances_offset_across_bills() {
        let alice = UserId::new();
        let bob = UserId::new();
        let bills = [
            record(alice, dec!(20.00), &[(bob, dec!(20.00))]),
            record(bob, dec!(20.00), &[(alice, dec!(20.00))]),
        ];

        let sheet = calculate_balances(Currency::USD, &bills).unwrap();
        assert!(sheet.balance_of(alice).is_zero());
        assert!(sheet.balance_of(bob).is_zero());
    }

    #[test]
    fn test_no_bills_is_empty() {
        let sheet = calculate_balances(Currency::USD, &Vec::<BillRecord>::new()).unwrap();
        assert!(sheet.balances.is_empty());
        assert!(sheet.balance_of(UserId::new()).is_zero());
    }

    #[test]
    fn test_currency_mismatch_is_an_error() {
        let alice = UserId::new();
        let bills = [record(alice, dec!(5.00), &[(alice, dec!(5.00))])];
        assert!(matches!(
            calculate_balances(Currency::MYR, &bills),
            Err(BillError::Money(_))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::bill::{Bill, BillTotals, Split};
    use chrono::Utc;
    use core_kernel::{BillId, BillItemId, SplitId, TripId};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn balances_sum_to_zero(
            bills in prop::collection::vec((0usize..4, 0i64..1_000_000, 1usize..5), 0..10)
        ) {
            let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
            let records: Vec<BillRecord> = bills
                .iter()
                .map(|(payer, cents, n)| {
                    let total = Money::from_minor(*cents, Currency::USD);
                    let bill_id = BillId::new();
                    let item_id = BillItemId::new();
                    let shares = total.split_evenly(*n).unwrap();
                    BillRecord {
                        bill: Bill {
                            id: bill_id,
                            trip_id: TripId::new(),
                            title: "Bill".to_string(),
                            merchant_name: None,
                            paid_by: users[*payer],
                            currency: Currency::USD,
                            totals: BillTotals {
                                subtotal: total,
                                total_amount: total,
                                ..BillTotals::zero(Currency::USD)
                            },
                            created_at: Utc::now(),
                        },
                        items: vec![],
                        participants: vec![],
                        splits: shares
                            .into_iter()
                            .enumerate()
                            .map(|(i, amount)| Split {
                                id: SplitId::new(),
                                bill_id,
                                bill_item_id: item_id,
                                user_id: users[i % users.len()],
                                amount,
                            })
                            .collect(),
                    }
                })
                .collect();

            let sheet = calculate_balances(Currency::USD, &records).unwrap();
            prop_assert!(sheet.net().is_zero());
        }
    }
}
