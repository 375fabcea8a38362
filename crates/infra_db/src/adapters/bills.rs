//! PostgreSQL Bill Store Adapter
//!
//! Implements the `BillStore` port on top of [`BillRepository`], mapping
//! row structs back onto domain types.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBillStore;
//! use domain_bills::BillStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn BillStore> = Arc::new(PostgresBillStore::new(pool));
//! let record = store.get_bill(bill_id, None).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use core_kernel::{
    AdapterHealth, BillId, BillItemId, Currency, DomainPort, HealthCheckResult, HealthCheckable,
    Money, OperationMetadata, ParticipantId, ReceiptId, SplitId, TempItemId, TripId, UserId,
};
use domain_bills::{
    Bill, BillError, BillItem, BillRecord, BillStore, BillSummary, BillTotals, NewBill,
    Participant, Receipt, ReconciliationPlan, Split,
};

use crate::error::DatabaseError;
use crate::repositories::bills::{BillRepository, BillRow, BillRows, ReceiptRow};

/// PostgreSQL-backed implementation of the `BillStore` port
///
/// Database errors reach the domain through `From<DatabaseError> for
/// BillError`: missing rows become `NotFound`, rejected splits come back
/// unchanged, and outages become retryable `Transaction` errors.
#[derive(Debug, Clone)]
pub struct PostgresBillStore {
    repository: BillRepository,
    pool: PgPool,
}

impl PostgresBillStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns the underlying repository
    pub fn repository(&self) -> &BillRepository {
        &self.repository
    }

    /// Loads the receipt attached to a bill, if any
    #[instrument(skip(self), fields(bill_id = %bill_id))]
    pub async fn receipt(&self, bill_id: BillId) -> Result<Option<Receipt>, BillError> {
        let row = self.repository.find_receipt(bill_id).await?;
        Ok(row.map(row_to_receipt))
    }
}

impl DomainPort for PostgresBillStore {}

#[async_trait]
impl HealthCheckable for PostgresBillStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-bill-store").await
    }
}

#[async_trait]
impl BillStore for PostgresBillStore {
    #[instrument(skip(self, bill, metadata), fields(trip_id = %bill.trip_id))]
    async fn create_bill(
        &self,
        bill: NewBill,
        metadata: Option<OperationMetadata>,
    ) -> Result<Bill, BillError> {
        let id = BillId::new_v7();
        let row = self.repository.insert_shell(id, &bill).await?;
        debug!(bill_id = %id, initiated_by = actor(&metadata), "Created bill shell");
        Ok(row_to_bill(&row)?)
    }

    #[instrument(skip(self, _metadata), fields(bill_id = %id))]
    async fn get_bill(
        &self,
        id: BillId,
        _metadata: Option<OperationMetadata>,
    ) -> Result<BillRecord, BillError> {
        let rows = self.repository.get_with_children(id).await?;
        Ok(rows_to_record(rows)?)
    }

    #[instrument(skip(self, _metadata), fields(trip_id = %trip_id))]
    async fn list_trip_bills(
        &self,
        trip_id: TripId,
        _metadata: Option<OperationMetadata>,
    ) -> Result<Vec<BillSummary>, BillError> {
        let rows = self.repository.list_for_trip(trip_id).await?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            summaries.push(BillSummary::from(&row_to_bill(row)?));
        }
        Ok(summaries)
    }

    #[instrument(skip(self, _metadata), fields(trip_id = %trip_id))]
    async fn trip_bill_records(
        &self,
        trip_id: TripId,
        _metadata: Option<OperationMetadata>,
    ) -> Result<Vec<BillRecord>, BillError> {
        let rows = self.repository.trip_records(trip_id).await?;
        debug!(bills = rows.len(), "Loaded trip bill records");
        rows.into_iter()
            .map(|r| rows_to_record(r).map_err(BillError::from))
            .collect()
    }

    #[instrument(
        skip(self, plan, metadata),
        fields(bill_id = %plan.bill_id, items = plan.items.len(), splits = plan.splits.len())
    )]
    async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
        metadata: Option<OperationMetadata>,
    ) -> Result<BillId, BillError> {
        let ids = self.repository.apply_reconciliation(plan).await?;
        info!(items = ids.len(), initiated_by = actor(&metadata), "Bill state replaced");
        Ok(plan.bill_id)
    }

    #[instrument(skip(self, metadata), fields(bill_id = %id))]
    async fn delete_bill(
        &self,
        id: BillId,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), BillError> {
        self.repository.delete(id).await?;
        info!(initiated_by = actor(&metadata), "Bill deleted");
        Ok(())
    }

    #[instrument(skip(self, receipt, metadata), fields(bill_id = %receipt.bill_id))]
    async fn attach_receipt(
        &self,
        receipt: Receipt,
        metadata: Option<OperationMetadata>,
    ) -> Result<ReceiptId, BillError> {
        let id = self.repository.upsert_receipt(&receipt).await?;
        debug!(receipt_id = %id, initiated_by = actor(&metadata), "Receipt stored");
        Ok(ReceiptId::from_uuid(id))
    }
}

fn actor(metadata: &Option<OperationMetadata>) -> &str {
    metadata.as_ref().map_or("system", OperationMetadata::actor)
}

/// Runs `SELECT 1` and reports latency
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message) = match result {
        Ok(_) => (AdapterHealth::Healthy, None),
        Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
    };
    HealthCheckResult {
        adapter_id: adapter_id.to_string(),
        status,
        latency_ms,
        message,
        checked_at: Utc::now(),
    }
}

fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    code.parse::<Currency>()
        .map_err(|e| DatabaseError::corrupt("bills.currency", e))
}

fn row_to_bill(row: &BillRow) -> Result<Bill, DatabaseError> {
    let currency = parse_currency(&row.currency)?;
    let money = |amount| Money::new(amount, currency);
    Ok(Bill {
        id: BillId::from_uuid(row.id),
        trip_id: TripId::from_uuid(row.trip_id),
        title: row.title.clone(),
        merchant_name: row.merchant_name.clone(),
        paid_by: UserId::from_uuid(row.paid_by),
        currency,
        totals: BillTotals {
            subtotal: money(row.subtotal),
            tax: money(row.tax),
            tax_percentage: row.tax_percentage.normalize(),
            total_discount: money(row.total_discount),
            rounding: money(row.rounding),
            total_amount: money(row.total_amount),
        },
        created_at: row.created_at,
    })
}

fn rows_to_record(rows: BillRows) -> Result<BillRecord, DatabaseError> {
    let bill = row_to_bill(&rows.bill)?;
    let currency = bill.currency;
    let money = |amount| Money::new(amount, currency);

    let items = rows
        .items
        .into_iter()
        .map(|row| BillItem {
            id: BillItemId::from_uuid(row.id),
            bill_id: bill.id,
            temp_item_id: TempItemId::new(row.temp_item_id),
            name: row.name,
            quantity: row.quantity.normalize(),
            unit_price: money(row.unit_price),
            discount: money(row.discount),
            tax: money(row.tax),
            total_price: money(row.total_price),
            description: row.description,
        })
        .collect();

    let participants = rows
        .participants
        .into_iter()
        .map(|row| Participant {
            id: ParticipantId::from_uuid(row.id),
            bill_id: bill.id,
            user_id: row.user_id.map(UserId::from_uuid),
            display_name: row.display_name,
        })
        .collect();

    let splits = rows
        .splits
        .into_iter()
        .map(|row| Split {
            id: SplitId::from_uuid(row.id),
            bill_id: bill.id,
            bill_item_id: BillItemId::from_uuid(row.bill_item_id),
            user_id: UserId::from_uuid(row.user_id),
            amount: money(row.amount),
        })
        .collect();

    Ok(BillRecord {
        bill,
        items,
        participants,
        splits,
    })
}

fn row_to_receipt(row: ReceiptRow) -> Receipt {
    Receipt {
        id: ReceiptId::from_uuid(row.id),
        bill_id: BillId::from_uuid(row.bill_id),
        image_url: row.image_url,
        raw_ocr_text: row.raw_ocr_text,
        parsed: row.parsed.0,
        created_at: row.created_at,
    }
}
