//! Trip handlers

use axum::{
    extract::{Path, State},
    Json,
};

use core_kernel::TripId;

use crate::auth::AuthUser;
use crate::dto::bills::BillSummaryResponse;
use crate::dto::trips::BalancesResponse;
use crate::error::ApiError;
use crate::AppState;

/// Lists a trip's bills, newest first
pub async fn list_bills(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(trip_id): Path<TripId>,
) -> Result<Json<Vec<BillSummaryResponse>>, ApiError> {
    let bills = state.bills.list_trip_bills(caller, trip_id).await?;
    Ok(Json(bills.iter().map(BillSummaryResponse::from).collect()))
}

/// Net balance of every user across the trip's bills
pub async fn balances(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(trip_id): Path<TripId>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let sheet = state.bills.trip_balances(caller, trip_id).await?;
    Ok(Json(BalancesResponse::new(trip_id, &sheet)))
}
