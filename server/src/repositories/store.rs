//! Storage seam for the pause coordinator and scheduler.
//!
//! [`PauseStore`] bundles the handful of reads and writes the pause flow
//! performs across the catalog, the session log, the realtime mirror and the
//! presence directory. Production uses [`PgPauseStore`]; tests drive the
//! coordinator against an in-memory implementation.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::agent::Presence;
use crate::models::pause_reason::PauseReason;
use crate::models::pause_session::PauseSession;
use crate::models::queue_member::pjsip_interface;
use crate::repositories::{
    AgentRepository, PauseReasonRepository, PauseSessionRepository, QueueMemberRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait PauseStore: Send + Sync {
    /// Catalog lookup for the pause path; inactive reasons do not resolve.
    async fn find_active_reason(&self, code: &str) -> Result<Option<PauseReason>, AppError>;

    /// Queues the extension's channel interface is a member of.
    async fn member_queues(&self, extension: &str) -> Result<Vec<String>, AppError>;

    /// Flips the pause columns on the extension's mirror rows. Returns the
    /// number of rows touched.
    async fn set_member_paused(
        &self,
        extension: &str,
        paused: bool,
        reason: Option<&str>,
    ) -> Result<u64, AppError>;

    async fn create_session(&self, session: &PauseSession) -> Result<PauseSession, AppError>;

    async fn open_session(&self, extension: &str) -> Result<Option<PauseSession>, AppError>;

    /// Closes a session that is still open; `None` means it was already
    /// closed.
    async fn close_session(
        &self,
        id: Uuid,
        end_time: DateTime<Utc>,
        duration_seconds: i32,
        auto_unpaused: bool,
    ) -> Result<Option<PauseSession>, AppError>;

    /// Open sessions carrying an auto-unpause deadline, for timer restore.
    async fn open_scheduled_sessions(&self) -> Result<Vec<PauseSession>, AppError>;

    /// Open sessions whose deadline has passed, for the sweep worker.
    async fn due_sessions(&self, now: DateTime<Utc>) -> Result<Vec<PauseSession>, AppError>;

    async fn set_presence(
        &self,
        extension: &str,
        presence: Presence,
        pause_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Postgres-backed store delegating to the per-table repositories.
#[derive(Clone)]
pub struct PgPauseStore {
    pool: DbPool,
    reasons: PauseReasonRepository,
    sessions: PauseSessionRepository,
    members: QueueMemberRepository,
    agents: AgentRepository,
}

impl PgPauseStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            reasons: PauseReasonRepository::new(),
            sessions: PauseSessionRepository::new(),
            members: QueueMemberRepository::new(),
            agents: AgentRepository::new(),
        }
    }
}

#[async_trait]
impl PauseStore for PgPauseStore {
    async fn find_active_reason(&self, code: &str) -> Result<Option<PauseReason>, AppError> {
        self.reasons.find_active_by_code(&self.pool, code).await
    }

    async fn member_queues(&self, extension: &str) -> Result<Vec<String>, AppError> {
        self.members
            .queues_for_interface(&self.pool, &pjsip_interface(extension))
            .await
    }

    async fn set_member_paused(
        &self,
        extension: &str,
        paused: bool,
        reason: Option<&str>,
    ) -> Result<u64, AppError> {
        self.members
            .set_paused(&self.pool, &pjsip_interface(extension), paused, reason)
            .await
    }

    async fn create_session(&self, session: &PauseSession) -> Result<PauseSession, AppError> {
        self.sessions.create(&self.pool, session).await
    }

    async fn open_session(&self, extension: &str) -> Result<Option<PauseSession>, AppError> {
        self.sessions
            .find_open_by_extension(&self.pool, extension)
            .await
    }

    async fn close_session(
        &self,
        id: Uuid,
        end_time: DateTime<Utc>,
        duration_seconds: i32,
        auto_unpaused: bool,
    ) -> Result<Option<PauseSession>, AppError> {
        self.sessions
            .close(&self.pool, id, end_time, duration_seconds, auto_unpaused)
            .await
    }

    async fn open_scheduled_sessions(&self) -> Result<Vec<PauseSession>, AppError> {
        self.sessions.find_open_scheduled(&self.pool).await
    }

    async fn due_sessions(&self, now: DateTime<Utc>) -> Result<Vec<PauseSession>, AppError> {
        self.sessions.find_due(&self.pool, now).await
    }

    async fn set_presence(
        &self,
        extension: &str,
        presence: Presence,
        pause_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.agents
            .set_presence(&self.pool, extension, presence, pause_reason, now)
            .await
    }
}
