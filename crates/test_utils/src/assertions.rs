//! Custom Test Assertions
//!
//! Assertion helpers for money, splits and balances that print the amounts
//! involved when they fail.

use rust_decimal::Decimal;

use core_kernel::{Currency, Money};
use domain_bills::{BalanceSheet, BillError, BillRecord};

/// Asserts that a Money value has exactly the given amount and currency
pub fn assert_money_eq(actual: &Money, amount: Decimal, currency: Currency) {
    assert_eq!(
        actual.currency(),
        currency,
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        currency
    );
    assert_eq!(
        actual.amount(),
        amount,
        "Amount mismatch: actual={}, expected={}",
        actual.amount(),
        amount
    );
}

/// Asserts that an amount carries no digits beyond the currency's precision
pub fn assert_currency_precision(amount: Decimal, currency: Currency) {
    assert_eq!(
        amount.round_dp(currency.decimal_places()),
        amount,
        "{} has more than {} decimal places",
        amount,
        currency.decimal_places()
    );
}

/// Asserts that every item's splits sum exactly to its total
///
/// Items with a zero total may have no splits.
pub fn assert_splits_match_items(record: &BillRecord) {
    for item in &record.items {
        let splits: Vec<&Money> = record.splits_for(item.id).map(|s| &s.amount).collect();
        if splits.is_empty() && item.total_price.is_zero() {
            continue;
        }
        let sum: Decimal = splits.iter().map(|m| m.amount()).sum();
        assert_eq!(
            sum,
            item.total_price.amount(),
            "Splits of item {} ({}) sum to {}, expected {}",
            item.temp_item_id,
            item.name,
            sum,
            item.total_price.amount()
        );
    }
}

/// Asserts that the bill total equals subtotal - discount + tax + rounding
pub fn assert_totals_consistent(record: &BillRecord) {
    let totals = &record.bill.totals;
    assert!(
        totals.is_consistent(),
        "Inconsistent totals: subtotal={} discount={} tax={} rounding={} total={}",
        totals.subtotal.amount(),
        totals.total_discount.amount(),
        totals.tax.amount(),
        totals.rounding.amount(),
        totals.total_amount.amount()
    );
}

/// Asserts that a sheet's balances sum to `expected_net`
pub fn assert_net_balance(sheet: &BalanceSheet, expected_net: Decimal) {
    assert_eq!(
        sheet.net().amount(),
        expected_net,
        "Balances sum to {}, expected {}: {:?}",
        sheet.net().amount(),
        expected_net,
        sheet.amounts()
    );
}

/// Asserts a split mismatch with the given signed delta
pub fn assert_split_mismatch<T: std::fmt::Debug>(result: Result<T, BillError>, delta: Decimal) {
    match result {
        Err(err) => assert_eq!(
            err.split_delta(),
            Some(delta),
            "Expected split mismatch of {}, got {:?}",
            delta,
            err
        ),
        Ok(value) => panic!("Expected split mismatch of {}, got Ok({:?})", delta, value),
    }
}
