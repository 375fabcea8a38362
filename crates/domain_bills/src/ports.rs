//! Bill domain ports
//!
//! The bill domain reaches durable storage and trip membership only through
//! the traits in this module.
//!
//! - [`BillStore`] persists bills, applies confirm plans atomically and
//!   reads a trip's bill history for the balance calculator.
//! - [`TripDirectory`] answers who belongs to which trip. Trip membership
//!   is owned by the surrounding application, not by this domain.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_bills::ports::{BillStore, TripDirectory};
//! use std::sync::Arc;
//!
//! let service = BillService::new(
//!     Arc::new(PostgresBillStore::new(pool.clone())) as Arc<dyn BillStore>,
//!     Arc::new(PostgresTripDirectory::new(pool)) as Arc<dyn TripDirectory>,
//!     Currency::MYR,
//! );
//! ```
//!
//! `BillStore` methods return [`BillError`] rather than `PortError` so that a
//! split mismatch detected inside the confirm transaction reaches the caller
//! unchanged. Adapter failures convert through `From<PortError>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillId, DomainPort, HealthCheckable, OperationMetadata, PortError, ReceiptId, TripId, UserId,
};

use crate::bill::{Bill, BillRecord, BillSummary, NewBill, Receipt};
use crate::error::BillError;
use crate::reconciliation::ReconciliationPlan;

/// A user's membership in a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub is_owner: bool,
}

/// Durable storage of bills
#[async_trait]
pub trait BillStore: DomainPort + HealthCheckable {
    /// Creates the near-empty shell of a freshly uploaded bill
    async fn create_bill(
        &self,
        bill: NewBill,
        metadata: Option<OperationMetadata>,
    ) -> Result<Bill, BillError>;

    /// Loads a bill with its items, participants and splits
    ///
    /// Returns `BillError::NotFound` if the bill does not exist.
    async fn get_bill(
        &self,
        id: BillId,
        metadata: Option<OperationMetadata>,
    ) -> Result<BillRecord, BillError>;

    /// Lists a trip's bills, newest first
    async fn list_trip_bills(
        &self,
        trip_id: TripId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<BillSummary>, BillError>;

    /// Loads every bill of a trip with its splits
    async fn trip_bill_records(
        &self,
        trip_id: TripId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<BillRecord>, BillError>;

    /// Replaces a bill's entire financial state in one atomic step
    ///
    /// Implementations must re-verify the plan's splits against the item ids
    /// they assign and leave the previous state untouched on any error.
    async fn apply_reconciliation(
        &self,
        plan: &ReconciliationPlan,
        metadata: Option<OperationMetadata>,
    ) -> Result<BillId, BillError>;

    /// Deletes a bill together with its items, participants, splits and receipt
    async fn delete_bill(
        &self,
        id: BillId,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), BillError>;

    /// Stores a bill's receipt, replacing any previous one
    async fn attach_receipt(
        &self,
        receipt: Receipt,
        metadata: Option<OperationMetadata>,
    ) -> Result<ReceiptId, BillError>;
}

/// Read access to trip membership
#[async_trait]
pub trait TripDirectory: DomainPort + HealthCheckable {
    /// Returns the user's membership in the trip, if any
    async fn membership(
        &self,
        trip_id: TripId,
        user_id: UserId,
    ) -> Result<Option<Membership>, PortError>;
}

/// In-memory adapters for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use tokio::sync::RwLock;

    /// In-memory `BillStore`
    ///
    /// A confirm builds the replacement record first and swaps it in under
    /// the write lock, so a failed confirm leaves the stored record as it was.
    #[derive(Debug, Default)]
    pub struct InMemoryBillStore {
        records: Arc<RwLock<HashMap<BillId, BillRecord>>>,
        receipts: Arc<RwLock<HashMap<BillId, Receipt>>>,
        unavailable: AtomicBool,
    }

    impl InMemoryBillStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent write fail as a storage outage
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Returns the stored receipt of a bill
        pub async fn receipt(&self, bill_id: BillId) -> Option<Receipt> {
            self.receipts.read().await.get(&bill_id).cloned()
        }

        fn check_available(&self) -> Result<(), BillError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(PortError::connection("in-memory store marked unavailable").into());
            }
            Ok(())
        }
    }

    impl DomainPort for InMemoryBillStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryBillStore {
        async fn health_check(&self) -> HealthCheckResult {
            let status = if self.unavailable.load(Ordering::SeqCst) {
                AdapterHealth::Unhealthy
            } else {
                AdapterHealth::Healthy
            };
            HealthCheckResult {
                adapter_id: "in-memory-bill-store".to_string(),
                status,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BillStore for InMemoryBillStore {
        async fn create_bill(
            &self,
            bill: NewBill,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Bill, BillError> {
            self.check_available()?;
            let bill = bill.into_bill(BillId::new_v7(), Utc::now());
            let record = BillRecord {
                bill: bill.clone(),
                items: Vec::new(),
                participants: Vec::new(),
                splits: Vec::new(),
            };
            self.records.write().await.insert(bill.id, record);
            Ok(bill)
        }

        async fn get_bill(
            &self,
            id: BillId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<BillRecord, BillError> {
            self.records
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| BillError::not_found("Bill", id))
        }

        async fn list_trip_bills(
            &self,
            trip_id: TripId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Vec<BillSummary>, BillError> {
            let records = self.records.read().await;
            let mut bills: Vec<&Bill> = records
                .values()
                .map(|r| &r.bill)
                .filter(|b| b.trip_id == trip_id)
                .collect();
            bills.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(bills.into_iter().map(BillSummary::from).collect())
        }

        async fn trip_bill_records(
            &self,
            trip_id: TripId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Vec<BillRecord>, BillError> {
            let records = self.records.read().await;
            let mut bills: Vec<BillRecord> = records
                .values()
                .filter(|r| r.bill.trip_id == trip_id)
                .cloned()
                .collect();
            bills.sort_by_key(|r| (r.bill.created_at, r.bill.id));
            Ok(bills)
        }

        async fn apply_reconciliation(
            &self,
            plan: &ReconciliationPlan,
            _metadata: Option<OperationMetadata>,
        ) -> Result<BillId, BillError> {
            self.check_available()?;
            let mut records = self.records.write().await;
            let existing = records
                .get(&plan.bill_id)
                .ok_or_else(|| BillError::not_found("Bill", plan.bill_id))?;
            if existing.bill.trip_id != plan.trip_id {
                return Err(BillError::validation(
                    "tripId",
                    format!("bill {} does not belong to trip {}", plan.bill_id, plan.trip_id),
                ));
            }

            let (record, _) = plan.clone().into_record(existing.bill.created_at)?;
            records.insert(plan.bill_id, record);
            Ok(plan.bill_id)
        }

        async fn delete_bill(
            &self,
            id: BillId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<(), BillError> {
            self.check_available()?;
            self.records
                .write()
                .await
                .remove(&id)
                .ok_or_else(|| BillError::not_found("Bill", id))?;
            self.receipts.write().await.remove(&id);
            Ok(())
        }

        async fn attach_receipt(
            &self,
            receipt: Receipt,
            _metadata: Option<OperationMetadata>,
        ) -> Result<ReceiptId, BillError> {
            self.check_available()?;
            if !self.records.read().await.contains_key(&receipt.bill_id) {
                return Err(BillError::not_found("Bill", receipt.bill_id));
            }
            let id = receipt.id;
            self.receipts.write().await.insert(receipt.bill_id, receipt);
            Ok(id)
        }
    }

    /// In-memory `TripDirectory`
    #[derive(Debug, Default)]
    pub struct InMemoryTripDirectory {
        members: Arc<RwLock<HashMap<(TripId, UserId), Membership>>>,
    }

    impl InMemoryTripDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a user to a trip
        pub async fn add_member(&self, trip_id: TripId, user_id: UserId, is_owner: bool) {
            self.members.write().await.insert(
                (trip_id, user_id),
                Membership {
                    trip_id,
                    user_id,
                    is_owner,
                },
            );
        }

        /// Removes a user from a trip
        pub async fn remove_member(&self, trip_id: TripId, user_id: UserId) {
            self.members.write().await.remove(&(trip_id, user_id));
        }
    }

    impl DomainPort for InMemoryTripDirectory {}

    #[async_trait]
    impl HealthCheckable for InMemoryTripDirectory {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-trip-directory".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl TripDirectory for InMemoryTripDirectory {
        async fn membership(
            &self,
            trip_id: TripId,
            user_id: UserId,
        ) -> Result<Option<Membership>, PortError> {
            Ok(self.members.read().await.get(&(trip_id, user_id)).copied())
        }
    }
}
