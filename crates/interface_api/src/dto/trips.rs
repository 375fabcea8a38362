//! Trip DTOs

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, TripId, UserId};
use domain_bills::BalanceSheet;

/// Net balances of a trip
///
/// Positive amounts are owed to the user, negative amounts are owed by
/// the user. `net` is zero unless a bill carries a rounding adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub trip_id: TripId,
    pub currency: Currency,
    pub balances: BTreeMap<UserId, Decimal>,
    pub net: Decimal,
}

impl BalancesResponse {
    pub fn new(trip_id: TripId, sheet: &BalanceSheet) -> Self {
        Self {
            trip_id,
            currency: sheet.currency,
            balances: sheet.amounts(),
            net: sheet.net().amount(),
        }
    }
}
