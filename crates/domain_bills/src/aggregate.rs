//! Bill aggregator
//!
//! Rolls priced items up into bill-level totals. Totals are always
//! re-derived from their inputs and never cached on their own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};
use crate::bill::BillTotals;
use crate::error::BillError;
use crate::pricing::{price_items, ItemPricing, PricedItem};

/// Result of a full editor recomputation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recomputation {
    pub items: Vec<PricedItem>,
    pub totals: BillTotals,
}

/// Aggregates already-priced items into bill totals
///
/// ```text
/// subtotal      = sum(quantity * unit_price)
/// totalDiscount = sum(discount)
/// tax           = sum(item.tax)
/// totalAmount   = round(subtotal - totalDiscount + tax + rounding)
/// ```
///
/// # Errors
///
/// Returns `BillError::Validation` on the `bill.*` field whose sum does not
/// fit a decimal.
pub fn aggregate(
    items: &[PricedItem],
    tax_rate_percent: Decimal,
    rounding: Decimal,
    currency: Currency,
) -> Result<BillTotals, BillError> {
    let raw_subtotal = checked_sum("subtotal", items.iter().map(|i| i.raw_subtotal))?;
    let discount = checked_sum("totalDiscount", items.iter().map(|i| i.discount.amount()))?;
    let tax = checked_sum("tax", items.iter().map(|i| i.tax.amount()))?;

    let subtotal = Money::round_half_up(raw_subtotal, currency);
    let total_discount = Money::round_half_up(discount, currency);
    let tax = Money::round_half_up(tax, currency);
    let rounding = Money::round_half_up(rounding, currency);
    let total_amount = checked_sum(
        "totalAmount",
        [subtotal.amount(), -total_discount.amount(), tax.amount(), rounding.amount()],
    )?;

    Ok(BillTotals {
        subtotal,
        tax,
        tax_percentage: tax_rate_percent,
        total_discount,
        rounding,
        total_amount: Money::round_half_up(total_amount, currency),
    })
}

fn checked_sum(field: &str, values: impl IntoIterator<Item = Decimal>) -> Result<Decimal, BillError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .ok_or_else(|| BillError::validation(format!("bill.{field}"), format!("{field} is too large to compute")))
}

/// Prices every item and aggregates the bill in one step
///
/// This is the editor's single "recompute" operation.
pub fn recompute(
    items: &[ItemPricing],
    tax_rate_percent: Decimal,
    rounding: Decimal,
    currency: Currency,
) -> Result<Recomputation, BillError> {
    let priced = price_items(items, tax_rate_percent, currency)?;
    let totals = aggregate(&priced, tax_rate_percent, rounding, currency)?;
    Ok(Recomputation {
        items: priced,
        totals,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn item_strategy() -> impl Strategy<Value = ItemPricing> {
        (1i64..20, 0i64..100_000, 0i64..=100).prop_map(|(q, cents, pct)| {
            let unit_price = Decimal::new(cents, 2);
            let subtotal = Decimal::from(q) * unit_price;
            let discount = (subtotal * Decimal::new(pct, 2)).round_dp(2).min(subtotal);
            ItemPricing::new(Decimal::from(q), unit_price).with_discount(discount)
        })
    }

    proptest! {
        #[test]
        fn total_matches_aggregate_formula(
            items in prop::collection::vec(item_strategy(), 0..12),
            rate_bp in 0i64..2500,
            rounding_cents in -50i64..50,
        ) {
            let result = recompute(
                &items,
                Decimal::new(rate_bp, 2),
                Decimal::new(rounding_cents, 2),
                Currency::USD,
            ).unwrap();
            prop_assert!(result.totals.is_consistent());

            let item_tax: Decimal = result.items.iter().map(|i| i.tax.amount()).sum();
            prop_assert_eq!(result.totals.tax.amount(), item_tax);
        }
    }
}
