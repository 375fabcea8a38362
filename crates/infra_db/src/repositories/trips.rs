//! Trip membership repository
//!
//! Trips are owned by the surrounding application; the bill engine only
//! reads membership. The write methods exist for seeding and administration.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{TripId, UserId};

use crate::error::DatabaseError;

/// Repository for trips and their members
#[derive(Debug, Clone)]
pub struct TripRepository {
    pool: PgPool,
}

impl TripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a trip
    pub async fn create_trip(&self, id: TripId, name: &str) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO trips (id, name) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    /// Adds a user to a trip, updating the owner flag if already a member
    pub async fn add_member(
        &self,
        trip_id: TripId,
        user_id: UserId,
        is_owner: bool,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO trip_members (trip_id, user_id, is_owner)
            VALUES ($1, $2, $3)
            ON CONFLICT (trip_id, user_id) DO UPDATE SET is_owner = EXCLUDED.is_owner
            "#,
        )
        .bind(trip_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(is_owner)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    pub async fn remove_member(&self, trip_id: TripId, user_id: UserId) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM trip_members WHERE trip_id = $1 AND user_id = $2")
            .bind(trip_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Looks up a user's membership in a trip
    pub async fn find_member(
        &self,
        trip_id: TripId,
        user_id: UserId,
    ) -> Result<Option<TripMemberRow>, DatabaseError> {
        let row = sqlx::query_as::<_, TripMemberRow>(
            r#"
            SELECT trip_id, user_id, is_owner, joined_at
            FROM trip_members
            WHERE trip_id = $1 AND user_id = $2
            "#,
        )
        .bind(trip_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Database row for a trip membership
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TripMemberRow {
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}
