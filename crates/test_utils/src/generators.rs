//! Property-Based Test Generators
//!
//! Proptest strategies producing inputs the bill editor would accept.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, UserId};
use domain_bills::ItemPricing;

/// Currencies with two decimal places
pub fn cent_currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::SGD),
        Just(Currency::MYR),
    ]
}

/// Any supported currency, including zero-decimal JPY
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![cent_currency_strategy(), Just(Currency::JPY)]
}

/// Unit prices from 0.01 to 9,999.99
pub fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Whole quantities from 1 to 20
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=20i64).prop_map(Decimal::from)
}

/// Tax rates from 0.00% to 30.00%
pub fn tax_rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=3_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

/// Rounding adjustments from -0.05 to 0.05
pub fn rounding_strategy() -> impl Strategy<Value = Decimal> {
    (-5i64..=5i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// An item whose discount never exceeds its subtotal
pub fn item_pricing_strategy() -> impl Strategy<Value = ItemPricing> {
    (quantity_strategy(), unit_price_strategy(), 0u32..=100u32).prop_map(
        |(quantity, unit_price, discount_pct)| {
            let discount = (quantity * unit_price * Decimal::from(discount_pct) / Decimal::ONE_HUNDRED)
                .round_dp(2);
            ItemPricing::new(quantity, unit_price).with_discount(discount)
        },
    )
}

/// Between one and `max` items
pub fn items_strategy(max: usize) -> impl Strategy<Value = Vec<ItemPricing>> {
    prop::collection::vec(item_pricing_strategy(), 1..=max)
}

/// Positive USD amounts up to 100,000.00
pub fn usd_total_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(|cents| Money::from_minor(cents, Currency::USD))
}

/// Between one and `max` distinct users
pub fn users_strategy(max: usize) -> impl Strategy<Value = Vec<UserId>> {
    (1..=max).prop_map(|n| (0..n).map(|_| UserId::new()).collect())
}
