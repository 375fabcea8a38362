//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal so that bill arithmetic never touches binary
//! floating point.
//!
//! # Rounding
//!
//! All engine rounding is **round half away from zero** ("round half up"
//! for positive amounts) at the currency's precision. Intermediate products
//! are kept as raw `Decimal` and rounded exactly once.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// The rounding strategy used for every persisted monetary value
pub const MONEY_ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Rounds a raw decimal to `dp` places using [`MONEY_ROUNDING`]
pub fn round_money(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, MONEY_ROUNDING)
}

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    INR,
    AUD,
    CAD,
    SGD,
    HKD,
    MYR,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF",
            Currency::INR => "₹",
            Currency::AUD => "A$",
            Currency::CAD => "C$",
            Currency::SGD => "S$",
            Currency::HKD => "HK$",
            Currency::MYR => "RM",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::INR => "INR",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::SGD => "SGD",
            Currency::HKD => "HKD",
            Currency::MYR => "MYR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CHF" => Ok(Currency::CHF),
            "INR" => Ok(Currency::INR),
            "AUD" => Ok(Currency::AUD),
            "CAD" => Ok(Currency::CAD),
            "SGD" => Ok(Currency::SGD),
            "HKD" => Ok(Currency::HKD),
            "MYR" => Ok(Currency::MYR),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,
}

/// A monetary amount with associated currency
///
/// Amounts are always held at the currency's precision (cents for most
/// currencies), so two `Money` values compare equal exactly when they
/// would be persisted identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value, rounding half-up to currency precision
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self::round_half_up(amount, currency)
    }

    /// Rounds a raw decimal half-up to the currency's precision
    pub fn round_half_up(amount: Decimal, currency: Currency) -> Self {
        let dp = currency.decimal_places();
        let mut amount = round_money(amount, dp);
        amount.rescale(dp);
        Self { amount, currency }
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns the amount in minor units (e.g., cents)
    pub fn minor_units(&self) -> i128 {
        let mut amount = self.amount;
        amount.rescale(self.currency.decimal_places());
        amount.mantissa()
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    /// Rounds using banker's rounding (round half to even)
    ///
    /// Not used by the allocation engine; kept for callers that need it
    /// explicitly.
    pub fn round_bankers(amount: Decimal, currency: Currency) -> Self {
        let dp = currency.decimal_places();
        let mut amount = amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
        amount.rescale(dp);
        Self { amount, currency }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        let sum = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Self::new(sum, self.currency))
    }

    /// Checked subtraction that returns an error on currency mismatch
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        let difference = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Self::new(difference, self.currency))
    }

    /// Sums an iterator of amounts, failing on the first currency mismatch
    pub fn checked_sum<'a>(
        currency: Currency,
        values: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        values
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Splits the amount into `n` shares at currency precision
    ///
    /// The first `n - 1` shares are `round(total / n)`; the last share is
    /// whatever remains, so the shares always sum exactly to the original.
    /// When `round(total / n)` rounds up, the last share is the smallest and
    /// can drop below zero for small totals (0.15 over 9 leaves -0.01).
    pub fn split_evenly(&self, n: usize) -> Result<Vec<Money>, MoneyError> {
        if n == 0 {
            return Err(MoneyError::DivisionByZero);
        }

        let share = Self::new(self.amount / Decimal::from(n as u64), self.currency);
        let mut shares = vec![share; n - 1];
        let allocated = share.amount * Decimal::from((n - 1) as u64);
        shares.push(Self::new(self.amount - allocated, self.currency));

        Ok(shares)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

// Operator impls are only used where both sides are known to share a
// currency (e.g. within a single bill); mixed-currency paths use the
// checked variants.
impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Self::new(self.amount + other.amount, self.currency)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Self::new(self.amount - other.amount, self.currency)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// Represents a percentage rate (e.g., a tax rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a decimal (e.g., 0.06 for 6%)
    value: Decimal,
}

impl Rate {
    /// Creates a rate from a decimal value (e.g., 0.06 for 6%)
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a rate from a percentage (e.g., 6 for 6%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    /// Zero rate
    pub fn zero() -> Self {
        Self { value: dec!(0) }
    }

    /// Returns the rate as a decimal
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        (self.value * dec!(100)).normalize()
    }

    /// Applies this rate to a raw amount, rounding once at currency precision
    pub fn apply(&self, amount: Decimal, currency: Currency) -> Result<Money, MoneyError> {
        let raw = amount.checked_mul(self.value).ok_or(MoneyError::Overflow)?;
        Ok(Money::round_half_up(raw, currency))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().round_dp(4))
    }
}
