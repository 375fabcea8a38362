//! Bill handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use core_kernel::BillId;
use domain_bills::{recompute as recompute_bill, BillDraft, ConfirmBillRequest, ItemPricing};

use crate::auth::AuthUser;
use crate::dto::bills::*;
use crate::error::ApiError;
use crate::extract::{ApiJson, ValidatedJson};
use crate::AppState;

fn draft_response(bill_id: BillId, draft: &BillDraft) -> Result<DraftResponse, ApiError> {
    Ok(DraftResponse {
        bill_id,
        currency: draft.currency,
        draft: draft.into_confirm_request()?,
    })
}

/// Creates the shell of a new bill
#[instrument(skip_all, fields(user = %caller))]
pub async fn create_bill(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(request): ValidatedJson<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), ApiError> {
    let bill = state
        .bills
        .create_bill_shell(
            caller,
            request.trip_id,
            request.title,
            request.paid_by_id,
            request.currency,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(BillResponse::from(&bill))))
}

/// Loads a bill with its items, participants and splits
pub async fn get_bill(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<BillId>,
) -> Result<Json<BillDetailResponse>, ApiError> {
    let record = state.bills.get_bill(caller, id).await?;
    Ok(Json(BillDetailResponse::from(&record)))
}

/// Deletes a bill and everything hanging off it
pub async fn delete_bill(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<BillId>,
) -> Result<StatusCode, ApiError> {
    state.bills.delete_bill(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-opens a bill as an editable draft
pub async fn get_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<BillId>,
) -> Result<Json<DraftResponse>, ApiError> {
    let draft = state.bills.open_draft(caller, id).await?;
    Ok(Json(draft_response(id, &draft)?))
}

/// Confirms a bill, replacing its whole financial state
#[instrument(skip_all, fields(bill_id = %id, user = %caller))]
pub async fn confirm_bill(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<BillId>,
    ApiJson(request): ApiJson<ConfirmBillRequest>,
) -> Result<Json<ConfirmBillResponse>, ApiError> {
    let bill_id = state.bills.confirm_bill(caller, id, request).await?;
    Ok(Json(ConfirmBillResponse { bill_id }))
}

/// Attaches a parsed receipt and returns the draft seeded from it
pub async fn attach_receipt(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<BillId>,
    ValidatedJson(request): ValidatedJson<AttachReceiptRequest>,
) -> Result<(StatusCode, Json<AttachReceiptResponse>), ApiError> {
    let (receipt_id, draft) = state.bills.attach_receipt(caller, id, request.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(AttachReceiptResponse {
            receipt_id,
            draft: draft_response(id, &draft)?,
        }),
    ))
}

/// Stateless recomputation of item and bill totals for the editor
pub async fn recompute(
    State(state): State<AppState>,
    _caller: AuthUser,
    ValidatedJson(request): ValidatedJson<RecomputeRequest>,
) -> Result<Json<RecomputeResponse>, ApiError> {
    let items: Vec<ItemPricing> = request.items.iter().map(ItemPricing::from).collect();
    let currency = request
        .currency
        .unwrap_or_else(|| state.bills.default_currency());
    let result = recompute_bill(&items, request.tax_percentage, request.rounding, currency)?;
    Ok(Json(RecomputeResponse::from(&result)))
}
