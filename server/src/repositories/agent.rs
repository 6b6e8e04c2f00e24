//! Agent presence repository.

use crate::error::AppError;
use crate::models::agent::{Agent, Presence};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const TABLE_NAME: &str = "agents";
const SELECT_COLUMNS: &str = "id, extension, display_name, presence, pause_reason, \
     last_presence_update, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct AgentRepository;

impl AgentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_extension(
        &self,
        db: &PgPool,
        extension: &str,
    ) -> Result<Option<Agent>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE extension = $1",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, Agent>(&query)
            .bind(extension)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Upserts the presence row for an extension. Agents appear here the
    /// first time their presence changes; directories synced from elsewhere
    /// keep their display names.
    pub async fn set_presence(
        &self,
        db: &PgPool,
        extension: &str,
        presence: Presence,
        pause_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO {} (id, extension, presence, pause_reason, last_presence_update, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5, $5) \
             ON CONFLICT (extension) DO UPDATE SET presence = EXCLUDED.presence, \
             pause_reason = EXCLUDED.pause_reason, \
             last_presence_update = EXCLUDED.last_presence_update, \
             updated_at = EXCLUDED.updated_at",
            TABLE_NAME
        );
        sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(extension)
            .bind(presence)
            .bind(pause_reason)
            .bind(now)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_select_columns_include_expected_fields() {
        assert!(SELECT_COLUMNS.contains("presence"));
        assert!(SELECT_COLUMNS.contains("last_presence_update"));
    }
}
