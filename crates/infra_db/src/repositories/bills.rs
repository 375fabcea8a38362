//! Bill repository implementation
//!
//! Database access for bills and everything hanging off them: items,
//! participants, splits and the uploaded receipt. Reads return row structs;
//! the adapter maps them onto domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use core_kernel::{BillId, BillItemId, TripId};
use domain_bills::{BillError, ItemIdMap, NewBill, ParsedReceipt, Receipt, ReconciliationPlan};

use crate::error::DatabaseError;

const BILL_COLUMNS: &str = r#"
    id, trip_id, title, merchant_name, paid_by, currency,
    subtotal, tax, tax_percentage, total_discount, rounding, total_amount,
    created_at
"#;

/// Repository for bills and their financial state
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: PgPool,
}

impl BillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the near-empty shell of a bill with zero aggregates
    pub async fn insert_shell(&self, id: BillId, bill: &NewBill) -> Result<BillRow, DatabaseError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            INSERT INTO bills (id, trip_id, title, paid_by, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(bill.trip_id.as_uuid())
        .bind(&bill.title)
        .bind(bill.paid_by.as_uuid())
        .bind(bill.currency.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Opens a read-only transaction whose queries all see one committed
    /// snapshot, so a confirm committing mid-read is either fully visible
    /// or not at all
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Loads a bill header with its items, participants and splits
    pub async fn get_with_children(&self, id: BillId) -> Result<BillRows, DatabaseError> {
        let mut tx = self.begin_snapshot().await?;
        let bill = fetch_bill(&mut *tx, id).await?;

        let items = sqlx::query_as::<_, BillItemRow>(
            r#"
            SELECT id, bill_id, temp_item_id, name, quantity, unit_price,
                   discount, tax, total_price, description
            FROM bill_items
            WHERE bill_id = $1
            ORDER BY position
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let participants = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT id, bill_id, user_id, display_name
            FROM participants
            WHERE bill_id = $1
            ORDER BY position
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let splits = sqlx::query_as::<_, SplitRow>(
            r#"
            SELECT s.id, s.bill_id, s.bill_item_id, s.user_id, s.amount
            FROM splits s
            JOIN bill_items i ON i.id = s.bill_item_id
            WHERE s.bill_id = $1
            ORDER BY i.position, s.position
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(BillRows {
            bill,
            items,
            participants,
            splits,
        })
    }

    /// Lists a trip's bill headers, newest first
    pub async fn list_for_trip(&self, trip_id: TripId) -> Result<Vec<BillRow>, DatabaseError> {
        fetch_trip_bills(&self.pool, trip_id).await
    }

    /// Loads every bill of a trip with its children from one snapshot
    ///
    /// Bills come back oldest first.
    pub async fn trip_records(&self, trip_id: TripId) -> Result<Vec<BillRows>, DatabaseError> {
        let mut tx = self.begin_snapshot().await?;
        let mut bills = fetch_trip_bills(&mut *tx, trip_id).await?;
        bills.reverse();

        let items = sqlx::query_as::<_, BillItemRow>(
            r#"
            SELECT i.id, i.bill_id, i.temp_item_id, i.name, i.quantity, i.unit_price,
                   i.discount, i.tax, i.total_price, i.description
            FROM bill_items i
            JOIN bills b ON b.id = i.bill_id
            WHERE b.trip_id = $1
            ORDER BY i.bill_id, i.position
            "#,
        )
        .bind(trip_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let participants = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT p.id, p.bill_id, p.user_id, p.display_name
            FROM participants p
            JOIN bills b ON b.id = p.bill_id
            WHERE b.trip_id = $1
            ORDER BY p.bill_id, p.position
            "#,
        )
        .bind(trip_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        let splits = sqlx::query_as::<_, SplitRow>(
            r#"
            SELECT s.id, s.bill_id, s.bill_item_id, s.user_id, s.amount
            FROM splits s
            JOIN bills b ON b.id = s.bill_id
            JOIN bill_items i ON i.id = s.bill_item_id
            WHERE b.trip_id = $1
            ORDER BY s.bill_id, i.position, s.position
            "#,
        )
        .bind(trip_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut records: Vec<BillRows> = bills
            .into_iter()
            .map(|bill| BillRows {
                bill,
                items: Vec::new(),
                participants: Vec::new(),
                splits: Vec::new(),
            })
            .collect();
        let index: std::collections::HashMap<Uuid, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.bill.id, i))
            .collect();

        for item in items {
            if let Some(&i) = index.get(&item.bill_id) {
                records[i].items.push(item);
            }
        }
        for participant in participants {
            if let Some(&i) = index.get(&participant.bill_id) {
                records[i].participants.push(participant);
            }
        }
        for split in splits {
            if let Some(&i) = index.get(&split.bill_id) {
                records[i].splits.push(split);
            }
        }

        Ok(records)
    }

    /// Replaces a bill's entire financial state in one transaction
    ///
    /// The bill row is locked first so concurrent confirms of the same bill
    /// run one after the other. Splits are re-verified against the server
    /// item ids assigned here before any split row is written; a mismatch
    /// rolls everything back and surfaces as `DatabaseError::Rejected`.
    pub async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
    ) -> Result<ItemIdMap, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT trip_id FROM bills WHERE id = $1 FOR UPDATE")
                .bind(plan.bill_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let trip_id = locked.ok_or_else(|| DatabaseError::not_found("Bill", plan.bill_id))?;
        if trip_id != *plan.trip_id.as_uuid() {
            return Err(DatabaseError::Rejected(BillError::validation(
                "tripId",
                format!("bill {} does not belong to trip {}", plan.bill_id, plan.trip_id),
            )));
        }

        sqlx::query(
            r#"
            UPDATE bills SET
                title = $2, merchant_name = $3, paid_by = $4, currency = $5,
                subtotal = $6, tax = $7, tax_percentage = $8, total_discount = $9,
                rounding = $10, total_amount = $11, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(plan.bill_id.as_uuid())
        .bind(&plan.title)
        .bind(&plan.merchant_name)
        .bind(plan.paid_by.as_uuid())
        .bind(plan.currency.code())
        .bind(plan.totals.subtotal.amount())
        .bind(plan.totals.tax.amount())
        .bind(plan.totals.tax_percentage)
        .bind(plan.totals.total_discount.amount())
        .bind(plan.totals.rounding.amount())
        .bind(plan.totals.total_amount.amount())
        .execute(&mut *tx)
        .await?;

        // Splits reference items, so they go first.
        for table in ["splits", "participants", "bill_items"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE bill_id = $1"))
                .bind(plan.bill_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        let ids = insert_items(&mut tx, plan).await?;
        insert_participants(&mut tx, plan).await?;

        if let Err(rejection) = plan.verify_splits(&ids) {
            warn!(bill_id = %plan.bill_id, "Split verification failed inside confirm transaction");
            return Err(DatabaseError::Rejected(rejection));
        }

        for (position, split) in plan.splits.iter().enumerate() {
            let item_id = ids.resolve(&split.temp_item_id).map_err(DatabaseError::Rejected)?;
            sqlx::query(
                r#"
                INSERT INTO splits (id, bill_id, bill_item_id, position, user_id, amount)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(plan.bill_id.as_uuid())
            .bind(item_id.as_uuid())
            .bind(position as i32)
            .bind(split.user_id.as_uuid())
            .bind(split.amount.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        debug!(
            bill_id = %plan.bill_id,
            items = ids.len(),
            splits = plan.splits.len(),
            "Committed bill replacement"
        );
        Ok(ids)
    }

    /// Deletes a bill; items, participants, splits and receipt cascade
    pub async fn delete(&self, id: BillId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Bill", id));
        }
        Ok(())
    }

    /// Stores a bill's receipt, replacing any previous one
    pub async fn upsert_receipt(&self, receipt: &Receipt) -> Result<Uuid, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM bills WHERE id = $1 FOR UPDATE")
            .bind(receipt.bill_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DatabaseError::not_found("Bill", receipt.bill_id));
        }

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO receipts (id, bill_id, image_url, raw_ocr_text, parsed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (bill_id) DO UPDATE SET
                id = EXCLUDED.id,
                image_url = EXCLUDED.image_url,
                raw_ocr_text = EXCLUDED.raw_ocr_text,
                parsed = EXCLUDED.parsed,
                created_at = EXCLUDED.created_at
            RETURNING id
            "#,
        )
        .bind(receipt.id.as_uuid())
        .bind(receipt.bill_id.as_uuid())
        .bind(&receipt.image_url)
        .bind(&receipt.raw_ocr_text)
        .bind(Json(&receipt.parsed))
        .bind(receipt.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Loads the receipt attached to a bill, if any
    pub async fn find_receipt(&self, bill_id: BillId) -> Result<Option<ReceiptRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, bill_id, image_url, raw_ocr_text, parsed, created_at
            FROM receipts
            WHERE bill_id = $1
            "#,
        )
        .bind(bill_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

async fn fetch_bill<'e>(executor: impl PgExecutor<'e>, id: BillId) -> Result<BillRow, DatabaseError> {
    sqlx::query_as::<_, BillRow>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Bill", id))
}

async fn fetch_trip_bills<'e>(
    executor: impl PgExecutor<'e>,
    trip_id: TripId,
) -> Result<Vec<BillRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, BillRow>(&format!(
        r#"
        SELECT {BILL_COLUMNS}
        FROM bills
        WHERE trip_id = $1
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(trip_id.as_uuid())
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    plan: &ReconciliationPlan,
) -> Result<ItemIdMap, DatabaseError> {
    let mut ids = ItemIdMap::new();
    for (position, item) in plan.items.iter().enumerate() {
        let id = BillItemId::new_v7();
        sqlx::query(
            r#"
            INSERT INTO bill_items (
                id, bill_id, position, temp_item_id, name, quantity,
                unit_price, discount, tax, total_price, description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id.as_uuid())
        .bind(plan.bill_id.as_uuid())
        .bind(position as i32)
        .bind(item.temp_item_id.as_str())
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price.amount())
        .bind(item.discount.amount())
        .bind(item.tax.amount())
        .bind(item.total_price.amount())
        .bind(&item.description)
        .execute(&mut **tx)
        .await?;

        ids.insert(item.temp_item_id.clone(), id);
    }
    Ok(ids)
}

async fn insert_participants(
    tx: &mut Transaction<'_, Postgres>,
    plan: &ReconciliationPlan,
) -> Result<(), DatabaseError> {
    for (position, participant) in plan.participants.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO participants (id, bill_id, position, user_id, display_name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(plan.bill_id.as_uuid())
        .bind(position as i32)
        .bind(participant.user_id.map(|u| *u.as_uuid()))
        .bind(&participant.display_name)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Database row for a bill header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillRow {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub merchant_name: Option<String>,
    pub paid_by: Uuid,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percentage: Decimal,
    pub total_discount: Decimal,
    pub rounding: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Database row for a line item
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillItemRow {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub temp_item_id: String,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipantRow {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub user_id: Option<Uuid>,
    pub display_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SplitRow {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub bill_item_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRow {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub image_url: Option<String>,
    pub raw_ocr_text: Option<String>,
    pub parsed: Json<ParsedReceipt>,
    pub created_at: DateTime<Utc>,
}

/// A bill header together with its child rows
#[derive(Debug, Clone)]
pub struct BillRows {
    pub bill: BillRow,
    pub items: Vec<BillItemRow>,
    pub participants: Vec<ParticipantRow>,
    pub splits: Vec<SplitRow>,
}
