//! Pause session repository.
//!
//! The open session for an extension is the row with `end_time` NULL; closing
//! is guarded on that predicate so a session can only be closed once.

use crate::error::AppError;
use crate::models::pause_session::PauseSession;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const TABLE_NAME: &str = "pause_sessions";
const SELECT_COLUMNS: &str = "id, extension, pause_reason_id, pause_reason_code, \
     pause_reason_label, start_time, end_time, duration_seconds, queue_name, auto_unpaused, \
     scheduled_unpause_at, created_at, updated_at";

/// Optional filters shared by the history and audit listings.
#[derive(Debug, Clone, Default)]
pub struct PauseSessionFilter {
    pub extension: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PauseSessionRepository;

impl PauseSessionRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    // All three filter fields are always bound; NULL parameters disable their
    // clause. Keeps the query static and the binds positional.
    const FILTER_CLAUSE: &'static str = "($1::varchar IS NULL OR extension = $1) \
         AND ($2::timestamptz IS NULL OR start_time >= $2) \
         AND ($3::timestamptz IS NULL OR start_time <= $3)";

    pub async fn create(&self, db: &PgPool, item: &PauseSession) -> Result<PauseSession, AppError> {
        let query = format!(
            "INSERT INTO {} (id, extension, pause_reason_id, pause_reason_code, \
             pause_reason_label, start_time, end_time, duration_seconds, queue_name, \
             auto_unpaused, scheduled_unpause_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PauseSession>(&query)
            .bind(item.id)
            .bind(&item.extension)
            .bind(item.pause_reason_id)
            .bind(&item.pause_reason_code)
            .bind(&item.pause_reason_label)
            .bind(item.start_time)
            .bind(item.end_time)
            .bind(item.duration_seconds)
            .bind(&item.queue_name)
            .bind(item.auto_unpaused)
            .bind(item.scheduled_unpause_at)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    /// The open session for an extension, newest first if the log ever holds
    /// more than one.
    pub async fn find_open_by_extension(
        &self,
        db: &PgPool,
        extension: &str,
    ) -> Result<Option<PauseSession>, AppError> {
        let query = format!(
            "{} WHERE extension = $1 AND end_time IS NULL ORDER BY start_time DESC LIMIT 1",
            Self::base_select_query()
        );
        let row = sqlx::query_as::<_, PauseSession>(&query)
            .bind(extension)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Closes a session if and only if it is still open. Returns `None` when
    /// the row was already closed (or never existed), which callers treat as
    /// "someone else got there first".
    pub async fn close(
        &self,
        db: &PgPool,
        id: Uuid,
        end_time: DateTime<Utc>,
        duration_seconds: i32,
        auto_unpaused: bool,
    ) -> Result<Option<PauseSession>, AppError> {
        let query = format!(
            "UPDATE {} SET end_time = $2, duration_seconds = $3, auto_unpaused = $4, \
             updated_at = $2 WHERE id = $1 AND end_time IS NULL \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PauseSession>(&query)
            .bind(id)
            .bind(end_time)
            .bind(duration_seconds)
            .bind(auto_unpaused)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Open sessions that carry an auto-unpause deadline; the scheduler
    /// rebuilds its timers from these at startup.
    pub async fn find_open_scheduled(&self, db: &PgPool) -> Result<Vec<PauseSession>, AppError> {
        let query = format!(
            "{} WHERE end_time IS NULL AND scheduled_unpause_at IS NOT NULL \
             ORDER BY scheduled_unpause_at ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, PauseSession>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    /// Open sessions whose deadline has already passed. The sweep worker uses
    /// this to catch pauses whose in-memory timer was lost.
    pub async fn find_due(
        &self,
        db: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<PauseSession>, AppError> {
        let query = format!(
            "{} WHERE end_time IS NULL AND scheduled_unpause_at IS NOT NULL \
             AND scheduled_unpause_at <= $1 ORDER BY scheduled_unpause_at ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, PauseSession>(&query)
            .bind(now)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// Every currently open session, oldest pause first.
    pub async fn list_open(&self, db: &PgPool) -> Result<Vec<PauseSession>, AppError> {
        let query = format!(
            "{} WHERE end_time IS NULL ORDER BY start_time ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, PauseSession>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    /// Filtered page, newest pause first.
    pub async fn list_filtered(
        &self,
        db: &PgPool,
        filter: &PauseSessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PauseSession>, AppError> {
        let query = format!(
            "{} WHERE {} ORDER BY start_time DESC LIMIT $4 OFFSET $5",
            Self::base_select_query(),
            Self::FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, PauseSession>(&query)
            .bind(&filter.extension)
            .bind(filter.start_from)
            .bind(filter.start_to)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// Total row count for the same filter, for pagination.
    pub async fn count_filtered(
        &self,
        db: &PgPool,
        filter: &PauseSessionFilter,
    ) -> Result<i64, AppError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            TABLE_NAME,
            Self::FILTER_CLAUSE
        );
        let count: (i64,) = sqlx::query_as(&query)
            .bind(&filter.extension)
            .bind(filter.start_from)
            .bind(filter.start_to)
            .fetch_one(db)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_session_select_columns_include_expected_fields() {
        assert!(SELECT_COLUMNS.contains("scheduled_unpause_at"));
        assert!(SELECT_COLUMNS.contains("auto_unpaused"));
        assert!(SELECT_COLUMNS.contains("duration_seconds"));
    }

    #[test]
    fn filter_clause_binds_every_parameter_once() {
        for placeholder in ["$1", "$2", "$3"] {
            assert_eq!(
                PauseSessionRepository::FILTER_CLAUSE
                    .matches(placeholder)
                    .count(),
                2,
                "each filter parameter appears in its IS NULL guard and its comparison"
            );
        }
    }
}
