//! Item tax and discount calculator
//!
//! Derives each line item's tax and total from its quantity, unit price,
//! discount and the bill-level tax rate:
//!
//! ```text
//! item_subtotal  = quantity * unit_price
//! taxable_amount = item_subtotal - discount
//! tax            = round(taxable_amount * tax_rate / 100)
//! total_price    = round(taxable_amount + tax)
//! ```
//!
//! Rounding is half away from zero at currency precision, applied once per
//! derived field. The calculator is a pure function.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, Rate};
use crate::error::BillError;

/// Decimal places kept for quantities and tax rates
pub const MAX_FRACTION_DIGITS: u32 = 4;

/// Highest accepted tax rate, in percent
pub const MAX_TAX_RATE_PERCENT: Decimal = Decimal::ONE_THOUSAND;

fn too_large(field: String, what: &str) -> BillError {
    BillError::validation(field, format!("{what} is too large to compute"))
}

/// Rejects values with more than [`MAX_FRACTION_DIGITS`] decimal places
fn check_fraction_digits(value: Decimal, field: String, what: &str) -> Result<(), BillError> {
    if value.normalize().scale() > MAX_FRACTION_DIGITS {
        return Err(BillError::validation(
            field,
            format!("{what} {value} has more than {MAX_FRACTION_DIGITS} decimal places"),
        ));
    }
    Ok(())
}

/// Pricing inputs of one line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPricing {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// Explicit manual tax that replaces the rate-derived tax
    #[serde(default)]
    pub tax_override: Option<Decimal>,
}

impl ItemPricing {
    /// Pricing with no discount and no override
    pub fn new(quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
            discount: Decimal::ZERO,
            tax_override: None,
        }
    }

    /// Sets the discount
    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Sets an explicit manual tax
    pub fn with_tax_override(mut self, tax: Decimal) -> Self {
        self.tax_override = Some(tax);
        self
    }

    /// Raw, unrounded `quantity * unit_price`
    ///
    /// # Errors
    ///
    /// Returns `BillError::Validation` on `{field}.quantity` when the
    /// product does not fit a decimal.
    pub fn raw_subtotal(&self, field: &str) -> Result<Decimal, BillError> {
        self.quantity
            .checked_mul(self.unit_price)
            .ok_or_else(|| too_large(format!("{field}.quantity"), "quantity * unit price"))
    }

    /// Validates the inputs, using `field` as the path prefix in errors
    pub fn validate(&self, field: &str) -> Result<(), BillError> {
        if self.quantity.is_sign_negative() && !self.quantity.is_zero() {
            return Err(BillError::validation(
                format!("{field}.quantity"),
                format!("quantity must not be negative, got {}", self.quantity),
            ));
        }
        check_fraction_digits(self.quantity, format!("{field}.quantity"), "quantity")?;
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(BillError::validation(
                format!("{field}.unitPrice"),
                format!("unit price must not be negative, got {}", self.unit_price),
            ));
        }
        if self.discount.is_sign_negative() && !self.discount.is_zero() {
            return Err(BillError::validation(
                format!("{field}.discount"),
                format!("discount must not be negative, got {}", self.discount),
            ));
        }
        let subtotal = self.raw_subtotal(field)?;
        if self.discount > subtotal {
            return Err(BillError::validation(
                format!("{field}.discount"),
                format!("discount {} exceeds item subtotal {}", self.discount, subtotal),
            ));
        }
        if let Some(tax) = self.tax_override {
            if tax.is_sign_negative() && !tax.is_zero() {
                return Err(BillError::validation(
                    format!("{field}.tax"),
                    format!("tax must not be negative, got {}", tax),
                ));
            }
        }
        Ok(())
    }
}

/// Derived fields of one line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    /// Raw `quantity * unit_price`, kept unrounded for the bill aggregate
    pub raw_subtotal: Decimal,
}

/// Validates a tax rate percentage
pub fn validate_tax_rate(tax_rate_percent: Decimal) -> Result<Rate, BillError> {
    if tax_rate_percent.is_sign_negative() && !tax_rate_percent.is_zero() {
        return Err(BillError::validation(
            "taxPercentage",
            format!("tax rate must not be negative, got {}", tax_rate_percent),
        ));
    }
    if tax_rate_percent > MAX_TAX_RATE_PERCENT {
        return Err(BillError::validation(
            "taxPercentage",
            format!("tax rate must not exceed {MAX_TAX_RATE_PERCENT}%, got {tax_rate_percent}"),
        ));
    }
    check_fraction_digits(tax_rate_percent, "taxPercentage".to_string(), "tax rate")?;
    Ok(Rate::from_percentage(tax_rate_percent))
}

/// Computes `total_price` for an item whose tax is already known
pub fn total_for(
    pricing: &ItemPricing,
    tax: Decimal,
    currency: Currency,
    field: &str,
) -> Result<Money, BillError> {
    let taxable = pricing.raw_subtotal(field)? - pricing.discount;
    let total = taxable
        .checked_add(tax)
        .ok_or_else(|| too_large(format!("{field}.totalPrice"), "item total"))?;
    Ok(Money::round_half_up(total, currency))
}

/// Prices a single item
///
/// # Errors
///
/// Returns `BillError::Validation` for negative quantity, unit price,
/// discount or tax override, a discount larger than the item subtotal, or
/// figures too large to multiply out.
pub fn price_item(
    pricing: &ItemPricing,
    tax_rate: Rate,
    currency: Currency,
    field: &str,
) -> Result<PricedItem, BillError> {
    pricing.validate(field)?;

    let raw_subtotal = pricing.raw_subtotal(field)?;
    let tax = match pricing.tax_override {
        Some(manual) => Money::round_half_up(manual, currency),
        None => tax_rate
            .apply(raw_subtotal - pricing.discount, currency)
            .map_err(|_| too_large(format!("{field}.tax"), "tax"))?,
    };
    let total_price = total_for(pricing, tax.amount(), currency, field)?;

    Ok(PricedItem {
        quantity: pricing.quantity,
        unit_price: Money::new(pricing.unit_price, currency),
        discount: Money::new(pricing.discount, currency),
        tax,
        total_price,
        raw_subtotal,
    })
}

/// Prices an ordered sequence of items against one tax rate
///
/// Output order matches input order. The first invalid item aborts the
/// whole computation; its index appears in the error's field path.
pub fn price_items(
    items: &[ItemPricing],
    tax_rate_percent: Decimal,
    currency: Currency,
) -> Result<Vec<PricedItem>, BillError> {
    let rate = validate_tax_rate(tax_rate_percent)?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| price_item(item, rate, currency, &format!("items[{index}]")))
        .collect()
}
