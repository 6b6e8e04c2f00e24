//! Pause reason repository.
//!
//! Provides catalog lookups, administrative CRUD and startup seeding.

use crate::error::AppError;
use crate::models::pause_reason::{PauseReason, DEFAULT_PAUSE_REASONS};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const TABLE_NAME: &str = "pause_reasons";
const SELECT_COLUMNS: &str = "id, code, label, description, color, icon, max_duration_minutes, \
     requires_approval, is_active, sort_order, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct PauseReasonRepository;

impl PauseReasonRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    /// Active catalog in display order.
    pub async fn list_active(&self, db: &PgPool) -> Result<Vec<PauseReason>, AppError> {
        let query = format!(
            "{} WHERE is_active = TRUE ORDER BY sort_order ASC, code ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, PauseReason>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, db: &PgPool, id: Uuid) -> Result<Option<PauseReason>, AppError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn find_by_code(
        &self,
        db: &PgPool,
        code: &str,
    ) -> Result<Option<PauseReason>, AppError> {
        let query = format!("{} WHERE code = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(code)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Lookup used on the pause path: the reason must exist and be active.
    pub async fn find_active_by_code(
        &self,
        db: &PgPool,
        code: &str,
    ) -> Result<Option<PauseReason>, AppError> {
        let query = format!(
            "{} WHERE code = $1 AND is_active = TRUE",
            Self::base_select_query()
        );
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(code)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Joins catalog rows for a batch of session references.
    pub async fn find_by_ids(
        &self,
        db: &PgPool,
        ids: &[Uuid],
    ) -> Result<Vec<PauseReason>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("{} WHERE id = ANY($1)", Self::base_select_query());
        let rows = sqlx::query_as::<_, PauseReason>(&query)
            .bind(ids)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn create(&self, db: &PgPool, item: &PauseReason) -> Result<PauseReason, AppError> {
        let query = format!(
            "INSERT INTO {} (id, code, label, description, color, icon, max_duration_minutes, \
             requires_approval, is_active, sort_order, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(item.id)
            .bind(&item.code)
            .bind(&item.label)
            .bind(&item.description)
            .bind(&item.color)
            .bind(&item.icon)
            .bind(item.max_duration_minutes)
            .bind(item.requires_approval)
            .bind(item.is_active)
            .bind(item.sort_order)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    pub async fn update(&self, db: &PgPool, item: &PauseReason) -> Result<PauseReason, AppError> {
        let query = format!(
            "UPDATE {} SET label = $2, description = $3, color = $4, icon = $5, \
             max_duration_minutes = $6, requires_approval = $7, is_active = $8, sort_order = $9, \
             updated_at = $10 WHERE id = $1 \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(item.id)
            .bind(&item.label)
            .bind(&item.description)
            .bind(&item.color)
            .bind(&item.icon)
            .bind(item.max_duration_minutes)
            .bind(item.requires_approval)
            .bind(item.is_active)
            .bind(item.sort_order)
            .bind(item.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    /// Soft delete. Returns the deactivated row, or `None` when the id does
    /// not exist.
    pub async fn deactivate(
        &self,
        db: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PauseReason>, AppError> {
        let query = format!(
            "UPDATE {} SET is_active = FALSE, updated_at = $2 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PauseReason>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Inserts the built-in catalog, leaving existing codes untouched.
    /// Returns the number of rows newly inserted.
    pub async fn seed_defaults(&self, db: &PgPool, now: DateTime<Utc>) -> Result<u64, AppError> {
        let query = format!(
            "INSERT INTO {} (id, code, label, description, color, icon, max_duration_minutes, \
             requires_approval, is_active, sort_order, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, TRUE, $8, $9, $9) \
             ON CONFLICT (code) DO NOTHING",
            TABLE_NAME
        );
        let mut inserted = 0;
        for seed in DEFAULT_PAUSE_REASONS {
            let result = sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(seed.code)
                .bind(seed.label)
                .bind(seed.description)
                .bind(seed.color)
                .bind(seed.icon)
                .bind(seed.max_duration_minutes)
                .bind(seed.sort_order)
                .bind(now)
                .execute(db)
                .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_reason_select_columns_include_expected_fields() {
        assert!(SELECT_COLUMNS.contains("max_duration_minutes"));
        assert!(SELECT_COLUMNS.contains("is_active"));
        assert!(SELECT_COLUMNS.contains("sort_order"));
    }
}
