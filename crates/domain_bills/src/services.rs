//! Bill domain services
//!
//! [`BillService`] is the application-facing entry point of the bill domain.
//! It checks trip membership through the [`TripDirectory`] port, runs the
//! pure reconciliation and balance logic, and persists through [`BillStore`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use core_kernel::{
    BillId, Currency, HealthCheckResult, HealthCheckable, OperationMetadata, ReceiptId, TripId,
    UserId,
};
use crate::balance::{calculate_balances, BalanceSheet};
use crate::bill::{Bill, BillRecord, BillSummary, NewBill, Receipt};
use crate::draft::{BillDraft, ParsedReceipt};
use crate::error::BillError;
use crate::ports::{BillStore, Membership, TripDirectory};
use crate::reconciliation::{reconcile, ConfirmBillRequest};

/// An uploaded receipt, as handed over by the upload and OCR glue
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub image_url: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub parsed: ParsedReceipt,
}

/// Orchestrates bill operations on behalf of an authenticated user
#[derive(Clone)]
pub struct BillService {
    store: Arc<dyn BillStore>,
    trips: Arc<dyn TripDirectory>,
    default_currency: Currency,
}

impl BillService {
    /// Creates a new service over the given ports
    ///
    /// `default_currency` is used for new bills and for the balances of a
    /// trip that has no bills yet.
    pub fn new(
        store: Arc<dyn BillStore>,
        trips: Arc<dyn TripDirectory>,
        default_currency: Currency,
    ) -> Self {
        Self {
            store,
            trips,
            default_currency,
        }
    }

    pub fn default_currency(&self) -> Currency {
        self.default_currency
    }

    /// Health of the bill store and the trip directory, in that order
    pub async fn health(&self) -> Vec<HealthCheckResult> {
        vec![self.store.health_check().await, self.trips.health_check().await]
    }

    fn metadata(caller: UserId) -> Option<OperationMetadata> {
        Some(OperationMetadata::initiated_by(caller))
    }

    /// Fails with `Forbidden` unless the caller belongs to the trip
    async fn require_member(&self, trip_id: TripId, caller: UserId) -> Result<Membership, BillError> {
        self.trips
            .membership(trip_id, caller)
            .await?
            .ok_or_else(|| BillError::Forbidden(format!("user {caller} is not a member of trip {trip_id}")))
    }

    /// Loads a bill the caller is allowed to see
    async fn visible_bill(&self, bill_id: BillId, caller: UserId) -> Result<BillRecord, BillError> {
        let record = self.store.get_bill(bill_id, Self::metadata(caller)).await?;
        self.require_member(record.bill.trip_id, caller).await?;
        Ok(record)
    }

    /// Currency of the trip's existing bills, if it has any
    async fn trip_currency(&self, trip_id: TripId, caller: UserId) -> Result<Option<Currency>, BillError> {
        let bills = self.store.list_trip_bills(trip_id, Self::metadata(caller)).await?;
        Ok(bills.first().map(|b| b.total_amount.currency()))
    }

    /// Creates the shell of a freshly uploaded bill
    ///
    /// A trip keeps all of its bills in one currency. Without an explicit
    /// currency the shell takes the trip's, or the service default for a
    /// trip's first bill; an explicit currency that differs from the trip's
    /// is rejected.
    #[instrument(skip_all, fields(trip_id = %trip_id))]
    pub async fn create_bill_shell(
        &self,
        caller: UserId,
        trip_id: TripId,
        title: String,
        paid_by: Option<UserId>,
        currency: Option<Currency>,
    ) -> Result<Bill, BillError> {
        if title.trim().is_empty() {
            return Err(BillError::validation("title", "title must not be empty"));
        }
        self.require_member(trip_id, caller).await?;

        let paid_by = paid_by.unwrap_or(caller);
        if paid_by != caller {
            self.trips
                .membership(trip_id, paid_by)
                .await?
                .ok_or_else(|| BillError::validation("paidById", "payer is not a member of the trip"))?;
        }

        let currency = match (currency, self.trip_currency(trip_id, caller).await?) {
            (Some(requested), Some(existing)) if requested != existing => {
                return Err(BillError::validation(
                    "currency",
                    format!("trip {trip_id} keeps its bills in {existing}, got {requested}"),
                ))
            }
            (Some(requested), _) => requested,
            (None, existing) => existing.unwrap_or(self.default_currency),
        };

        let bill = self
            .store
            .create_bill(
                NewBill {
                    trip_id,
                    title: title.trim().to_string(),
                    paid_by,
                    currency,
                },
                Self::metadata(caller),
            )
            .await?;
        info!(bill_id = %bill.id, "Bill shell created");
        Ok(bill)
    }

    /// Loads a bill with its items, participants and splits
    pub async fn get_bill(&self, caller: UserId, bill_id: BillId) -> Result<BillRecord, BillError> {
        self.visible_bill(bill_id, caller).await
    }

    /// Re-opens a bill as an editable draft
    pub async fn open_draft(&self, caller: UserId, bill_id: BillId) -> Result<BillDraft, BillError> {
        let record = self.visible_bill(bill_id, caller).await?;
        BillDraft::from_record(&record)
    }

    /// Confirms a bill, atomically replacing its financial state
    ///
    /// The request is fully validated before storage is touched; the store
    /// re-verifies splits inside its transaction.
    #[instrument(skip_all, fields(bill_id = %bill_id, items = request.items.len(), splits = request.splits.len()))]
    pub async fn confirm_bill(
        &self,
        caller: UserId,
        bill_id: BillId,
        request: ConfirmBillRequest,
    ) -> Result<BillId, BillError> {
        let record = self.visible_bill(bill_id, caller).await?;
        if request.trip_id != record.bill.trip_id {
            return Err(BillError::validation(
                "tripId",
                format!("bill {bill_id} does not belong to trip {}", request.trip_id),
            ));
        }
        self.trips
            .membership(request.trip_id, request.paid_by_id)
            .await?
            .ok_or_else(|| BillError::validation("paidById", "payer is not a member of the trip"))?;

        info!("Confirming bill");
        let plan = match reconcile(bill_id, &request, record.bill.currency) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "Confirm rejected");
                return Err(err);
            }
        };

        match self.store.apply_reconciliation(&plan, Self::metadata(caller)).await {
            Ok(id) => {
                info!(total = %plan.totals.total_amount, "Bill confirmed");
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, "Confirm aborted, previous state kept");
                Err(err)
            }
        }
    }

    /// Deletes a bill and everything it owns
    #[instrument(skip_all, fields(bill_id = %bill_id))]
    pub async fn delete_bill(&self, caller: UserId, bill_id: BillId) -> Result<(), BillError> {
        self.visible_bill(bill_id, caller).await?;
        self.store.delete_bill(bill_id, Self::metadata(caller)).await?;
        info!("Bill deleted");
        Ok(())
    }

    /// Lists a trip's bills, newest first
    pub async fn list_trip_bills(
        &self,
        caller: UserId,
        trip_id: TripId,
    ) -> Result<Vec<BillSummary>, BillError> {
        self.require_member(trip_id, caller).await?;
        self.store.list_trip_bills(trip_id, Self::metadata(caller)).await
    }

    /// Computes net balances over every bill of a trip
    #[instrument(skip_all, fields(trip_id = %trip_id))]
    pub async fn trip_balances(&self, caller: UserId, trip_id: TripId) -> Result<BalanceSheet, BillError> {
        self.require_member(trip_id, caller).await?;
        let records = self.store.trip_bill_records(trip_id, Self::metadata(caller)).await?;
        let currency = records
            .first()
            .map(|r| r.bill.currency)
            .unwrap_or(self.default_currency);
        calculate_balances(currency, &records)
    }

    /// Stores a bill's receipt and seeds a draft from its parsed content
    ///
    /// The draft is always priced in the bill's currency so that it can be
    /// confirmed; a differing receipt currency is logged and ignored.
    #[instrument(skip_all, fields(bill_id = %bill_id, lines = upload.parsed.items.len()))]
    pub async fn attach_receipt(
        &self,
        caller: UserId,
        bill_id: BillId,
        upload: ReceiptUpload,
    ) -> Result<(ReceiptId, BillDraft), BillError> {
        let record = self.visible_bill(bill_id, caller).await?;
        let currency = record.bill.currency;
        let mut parsed = upload.parsed.clone();
        if let Some(code) = parsed.currency.take() {
            if code.parse::<Currency>().ok() != Some(currency) {
                warn!(receipt_currency = %code, bill_currency = %currency, "Receipt currency differs from bill");
            }
        }
        let mut draft =
            BillDraft::from_parsed_receipt(&parsed, record.bill.trip_id, record.bill.paid_by, currency)?;
        if draft.merchant_name.is_none() {
            draft.title = record.bill.title.clone();
        }

        let receipt = Receipt {
            id: ReceiptId::new_v7(),
            bill_id,
            image_url: upload.image_url,
            raw_ocr_text: upload.raw_ocr_text,
            parsed: upload.parsed,
            created_at: Utc::now(),
        };
        let receipt_id = self.store.attach_receipt(receipt, Self::metadata(caller)).await?;
        info!(receipt_id = %receipt_id, "Receipt attached");
        Ok((receipt_id, draft))
    }
}
