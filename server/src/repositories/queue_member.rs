//! Realtime queue membership repository.
//!
//! This table is shared with the PBX. Membership rows are provisioned by the
//! PBX side; we only read them and flip the pause columns.

use crate::error::AppError;
use crate::models::queue_member::QueueMember;
use sqlx::PgPool;

const TABLE_NAME: &str = "queue_members";
const SELECT_COLUMNS: &str =
    "uniqueid, queue_name, interface, membername, penalty, paused, paused_reason";

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueMemberRepository;

impl QueueMemberRepository {
    pub fn new() -> Self {
        Self
    }

    /// Names of the queues a channel interface is a member of.
    pub async fn queues_for_interface(
        &self,
        db: &PgPool,
        interface: &str,
    ) -> Result<Vec<String>, AppError> {
        let query = format!(
            "SELECT queue_name FROM {} WHERE interface = $1 ORDER BY queue_name ASC",
            TABLE_NAME
        );
        let rows: Vec<(String,)> = sqlx::query_as(&query).bind(interface).fetch_all(db).await?;
        Ok(rows.into_iter().map(|(queue_name,)| queue_name).collect())
    }

    /// One representative membership row for an interface. The pause columns
    /// are written to every row of the interface together, so the first row
    /// reflects them all.
    pub async fn find_first_by_interface(
        &self,
        db: &PgPool,
        interface: &str,
    ) -> Result<Option<QueueMember>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE interface = $1 ORDER BY queue_name ASC LIMIT 1",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, QueueMember>(&query)
            .bind(interface)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    /// Flips the pause flag on every membership row of an interface. Returns
    /// the number of rows touched; zero is normal when the PBX has not
    /// provisioned the member yet.
    pub async fn set_paused(
        &self,
        db: &PgPool,
        interface: &str,
        paused: bool,
        paused_reason: Option<&str>,
    ) -> Result<u64, AppError> {
        let query = format!(
            "UPDATE {} SET paused = $2, paused_reason = $3 WHERE interface = $1",
            TABLE_NAME
        );
        let result = sqlx::query(&query)
            .bind(interface)
            .bind(paused)
            .bind(paused_reason)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_member_select_columns_include_expected_fields() {
        assert!(SELECT_COLUMNS.contains("interface"));
        assert!(SELECT_COLUMNS.contains("paused_reason"));
    }
}
