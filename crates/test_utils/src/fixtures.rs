//! Pre-built Test Fixtures
//!
//! Ready-to-use trips, users, amounts and receipts. Fixtures are consistent
//! and predictable unless their name says otherwise.

use fake::faker::company::en::CompanyName;
use fake::faker::name::en::FirstName;
use fake::Fake;
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, TripId, UserId};
use domain_bills::{ParsedLine, ParsedReceipt};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// 20.00 USD, the set meal of the mismatch scenario
    pub fn usd_20() -> Money {
        Money::new(dec!(20.00), Currency::USD)
    }

    /// 10.01 USD, which does not divide evenly three ways
    pub fn usd_10_01() -> Money {
        Money::new(dec!(10.01), Currency::USD)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// 10.00 MYR
    pub fn myr_10() -> Money {
        Money::new(dec!(10.00), Currency::MYR)
    }

    /// JPY amount (zero decimal places)
    pub fn jpy_1000() -> Money {
        Money::new(dec!(1000), Currency::JPY)
    }
}

/// A trip with three members
#[derive(Debug, Clone, Copy)]
pub struct TripFixture {
    pub trip_id: TripId,
    /// Owner of the trip and default payer
    pub alice: UserId,
    pub bob: UserId,
    pub carol: UserId,
}

impl Default for TripFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TripFixture {
    /// Fresh ids for the trip and every member
    pub fn new() -> Self {
        Self {
            trip_id: TripId::new(),
            alice: UserId::new(),
            bob: UserId::new(),
            carol: UserId::new(),
        }
    }

    /// Members with their display names, owner first
    pub fn members(&self) -> [(UserId, &'static str); 3] {
        [(self.alice, "Alice"), (self.bob, "Bob"), (self.carol, "Carol")]
    }

    pub fn member_ids(&self) -> [UserId; 3] {
        [self.alice, self.bob, self.carol]
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn bill_title() -> &'static str {
        "Dinner"
    }

    pub fn merchant_name() -> &'static str {
        "Sushi World"
    }

    /// Random display name
    pub fn fake_display_name() -> String {
        FirstName().fake()
    }

    /// Random merchant name
    pub fn fake_merchant_name() -> String {
        CompanyName().fake()
    }
}

/// Fixture for parsed receipts
pub struct ReceiptFixtures;

impl ReceiptFixtures {
    /// Two-line receipt in MYR with a declared total
    pub fn sushi_receipt() -> ParsedReceipt {
        ParsedReceipt {
            merchant: Some(StringFixtures::merchant_name().to_string()),
            currency: Some("MYR".to_string()),
            total: Some(dec!(33.00)),
            items: vec![
                ParsedLine {
                    name: "Salmon set".to_string(),
                    quantity: Some(dec!(1)),
                    price: dec!(25.00),
                },
                ParsedLine {
                    name: "Green tea".to_string(),
                    quantity: Some(dec!(2)),
                    price: dec!(8.00),
                },
            ],
        }
    }

    /// A receipt the parser could not read anything from
    pub fn empty_receipt() -> ParsedReceipt {
        ParsedReceipt {
            merchant: None,
            currency: None,
            total: None,
            items: Vec::new(),
        }
    }
}
