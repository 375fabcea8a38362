//! PostgreSQL Trip Directory Adapter

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, PortError, TripId, UserId,
};
use domain_bills::{Membership, TripDirectory};

use crate::adapters::bills::ping;
use crate::repositories::trips::TripRepository;

/// PostgreSQL-backed implementation of the `TripDirectory` port
#[derive(Debug, Clone)]
pub struct PostgresTripDirectory {
    repository: TripRepository,
    pool: PgPool,
}

impl PostgresTripDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TripRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn repository(&self) -> &TripRepository {
        &self.repository
    }
}

impl DomainPort for PostgresTripDirectory {}

#[async_trait]
impl HealthCheckable for PostgresTripDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-trip-directory").await
    }
}

#[async_trait]
impl TripDirectory for PostgresTripDirectory {
    #[instrument(skip(self), fields(trip_id = %trip_id, user_id = %user_id))]
    async fn membership(
        &self,
        trip_id: TripId,
        user_id: UserId,
    ) -> Result<Option<Membership>, PortError> {
        let row = self.repository.find_member(trip_id, user_id).await?;
        Ok(row.map(|r| Membership {
            trip_id: TripId::from_uuid(r.trip_id),
            user_id: UserId::from_uuid(r.user_id),
            is_owner: r.is_owner,
        }))
    }
}
