//! Pause coordinator, the write path of the pause subsystem.
//!
//! One pause or unpause fans out across four stores in a fixed order: the
//! realtime queue-member mirror, the PBX over AMI, the durable session log,
//! and the presence directory. Mirror and PBX failures are absorbed into the
//! returned outcome so the session log stays authoritative; a failure writing
//! the log or presence fails the whole request.

use crate::ami::{AmiAction, AmiClient};
use crate::error::AppError;
use crate::events::{
    AgentAvailability, AgentEvent, AgentPausedPayload, AgentStatusData, AgentStatusPayload,
    AgentUnpausedPayload, EventBus, PauseReasonRef,
};
use crate::models::agent::Presence;
use crate::models::pause_reason::PauseReason;
use crate::models::pause_session::PauseSession;
use crate::models::queue_member::pjsip_interface;
use crate::repositories::PauseStore;
use crate::services::pause_scheduler::{PauseScheduler, UnpauseExecutor};
use crate::utils::Clock;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Queue applied when neither the request nor the member mirror names any.
const FALLBACK_QUEUE: &str = "default";

/// Asterisk CLI command that flushes queue changes to the running config.
const QUEUE_RELOAD_COMMAND: &str = "queue reload all";

/// How an unpause was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpauseKind {
    Manual,
    Auto,
}

/// Result of one best-effort write to an external system.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalOutcome {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExternalOutcome {
    fn ok() -> Self {
        Self {
            applied: true,
            error: None,
        }
    }

    fn failed(err: impl fmt::Display) -> Self {
        Self {
            applied: false,
            error: Some(err.to_string()),
        }
    }
}

/// Result of one `QueuePause` action against the PBX.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueActionOutcome {
    pub queue: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOutcome {
    pub session: PauseSession,
    pub queues: Vec<String>,
    pub mirror: ExternalOutcome,
    pub queue_actions: Vec<QueueActionOutcome>,
    pub reload: ExternalOutcome,
    /// Set when an earlier open session had to be closed to make room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpauseOutcome {
    /// The closed session; `None` when the agent had no open session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<PauseSession>,
    pub queues: Vec<String>,
    /// Seconds the agent spent paused; zero when nothing was open.
    pub pause_duration: i64,
    pub auto_unpaused: bool,
    pub mirror: ExternalOutcome,
    pub queue_actions: Vec<QueueActionOutcome>,
    pub reload: ExternalOutcome,
}

/// Per-extension mutexes. Pause and unpause for one agent are serialised;
/// different agents proceed in parallel. Entries are never removed, the map
/// is bounded by the extension population.
#[derive(Default)]
struct ExtensionLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExtensionLocks {
    fn handle(&self, extension: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(extension.to_string())
            .or_default()
            .clone()
    }
}

pub struct PauseCoordinator {
    store: Arc<dyn PauseStore>,
    ami: Arc<dyn AmiClient>,
    events: EventBus,
    scheduler: Arc<PauseScheduler>,
    clock: Arc<dyn Clock>,
    locks: ExtensionLocks,
}

impl PauseCoordinator {
    pub fn new(
        store: Arc<dyn PauseStore>,
        ami: Arc<dyn AmiClient>,
        events: EventBus,
        scheduler: Arc<PauseScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ami,
            events,
            scheduler,
            clock,
            locks: ExtensionLocks::default(),
        }
    }

    /// Pauses `extension` under `reason_code` across the given queues, or
    /// the agent's member queues when none are given.
    pub async fn pause(
        &self,
        extension: &str,
        reason_code: &str,
        queues: Option<Vec<String>>,
    ) -> Result<PauseOutcome, AppError> {
        let extension = extension.trim();
        let reason_code = reason_code.trim();
        if extension.is_empty() || reason_code.is_empty() {
            return Err(AppError::BadRequest(
                "Extension and reason code are required".to_string(),
            ));
        }

        let reason = self
            .store
            .find_active_reason(reason_code)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid pause reason code".to_string()))?;

        let _guard = self.locks.handle(extension).lock_owned().await;

        let queues = self.resolve_queues(extension, queues).await;
        let now = self.clock.now();

        // One open session per agent: a re-pause closes the previous session
        // before opening the new one.
        let mut replaced_session_id = None;
        if let Some(open) = self.store.open_session(extension).await? {
            self.scheduler.cancel(extension);
            let closed = self
                .store
                .close_session(open.id, now, open.elapsed_seconds(now) as i32, false)
                .await?;
            if closed.is_some() {
                tracing::info!(
                    extension,
                    previous = %open.id,
                    "closed the open pause session before re-pausing"
                );
                replaced_session_id = Some(open.id);
            }
        }

        // The mirror carries the code so the status endpoint can read it back;
        // the PBX gets the label, which is what shows up in queue statistics.
        let mirror = self
            .write_mirror(extension, true, Some(reason.code.as_str()))
            .await;
        let queue_actions = self
            .push_queue_actions(extension, &queues, true, Some(reason.label.as_str()))
            .await;
        let reload = self.reload_queues().await;

        let session = self
            .store
            .create_session(&PauseSession::new(extension, &reason, &queues, now))
            .await?;
        if let Some(due) = session.scheduled_unpause_at {
            self.scheduler.arm_at(extension, session.id, due);
        }

        self.store
            .set_presence(extension, Presence::Paused, Some(reason.code.as_str()), now)
            .await?;

        self.events.emit(AgentEvent::Paused(AgentPausedPayload {
            extension: extension.to_string(),
            pause_reason: reason_ref(&reason),
            start_time: session.start_time,
            queues: queues.clone(),
            timestamp: now,
        }));
        self.events.emit(AgentEvent::Status(AgentStatusPayload {
            extension: extension.to_string(),
            data: AgentStatusData {
                status: AgentAvailability::Paused,
                pause_reason: Some(reason.code.clone()),
                pause_reason_label: Some(reason.label.clone()),
                timestamp: now,
            },
        }));

        tracing::info!(
            extension,
            reason = %reason.code,
            queues = ?queues,
            bounded = session.scheduled_unpause_at.is_some(),
            "agent paused"
        );

        Ok(PauseOutcome {
            session,
            queues,
            mirror,
            queue_actions,
            reload,
            replaced_session_id,
        })
    }

    /// Unpauses `extension` and closes its open session, if any. Unpausing an
    /// agent who is not paused still clears the mirror and the PBX, which is
    /// how stuck state gets repaired.
    pub async fn unpause(
        &self,
        extension: &str,
        queues: Option<Vec<String>>,
    ) -> Result<UnpauseOutcome, AppError> {
        let extension = extension.trim();
        if extension.is_empty() {
            return Err(AppError::BadRequest("Extension is required".to_string()));
        }

        let _guard = self.locks.handle(extension).lock_owned().await;
        let open = self.store.open_session(extension).await?;
        self.unpause_locked(extension, queues, UnpauseKind::Manual, open)
            .await
    }

    /// The unpause fan-out. Callers must hold the extension lock and pass in
    /// the open session they observed under it.
    async fn unpause_locked(
        &self,
        extension: &str,
        explicit_queues: Option<Vec<String>>,
        kind: UnpauseKind,
        open: Option<PauseSession>,
    ) -> Result<UnpauseOutcome, AppError> {
        self.scheduler.cancel(extension);

        let queues = self.resolve_queues(extension, explicit_queues).await;
        let mirror = self.write_mirror(extension, false, None).await;
        let queue_actions = self
            .push_queue_actions(extension, &queues, false, None)
            .await;
        let reload = self.reload_queues().await;

        let now = self.clock.now();
        let auto_unpaused = kind == UnpauseKind::Auto;
        let (session, pause_duration) = match open {
            Some(open) => {
                let elapsed = open.elapsed_seconds(now);
                let closed = self
                    .store
                    .close_session(open.id, now, elapsed as i32, auto_unpaused)
                    .await?;
                match closed {
                    Some(closed) => {
                        let duration = closed
                            .duration_seconds
                            .map(i64::from)
                            .unwrap_or(elapsed);
                        (Some(closed), duration)
                    }
                    None => {
                        tracing::debug!(
                            extension,
                            session_id = %open.id,
                            "session was already closed"
                        );
                        (None, 0)
                    }
                }
            }
            None => (None, 0),
        };

        self.store
            .set_presence(extension, Presence::Ready, None, now)
            .await?;

        self.events.emit(AgentEvent::Unpaused(AgentUnpausedPayload {
            extension: extension.to_string(),
            queues: queues.clone(),
            pause_duration,
            auto_unpaused,
            timestamp: now,
        }));
        self.events.emit(AgentEvent::Status(AgentStatusPayload {
            extension: extension.to_string(),
            data: AgentStatusData {
                status: AgentAvailability::Available,
                pause_reason: None,
                pause_reason_label: None,
                timestamp: now,
            },
        }));

        tracing::info!(extension, pause_duration, auto = auto_unpaused, "agent unpaused");

        Ok(UnpauseOutcome {
            session,
            queues,
            pause_duration,
            auto_unpaused,
            mirror,
            queue_actions,
            reload,
        })
    }

    /// Explicit queues win; otherwise the mirror's memberships; otherwise the
    /// fallback queue. Mirror lookup failures degrade to the fallback.
    async fn resolve_queues(&self, extension: &str, explicit: Option<Vec<String>>) -> Vec<String> {
        if let Some(queues) = explicit {
            let cleaned: Vec<String> = queues
                .iter()
                .map(|q| q.trim())
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect();
            if !cleaned.is_empty() {
                return cleaned;
            }
        }

        let members = match self.store.member_queues(extension).await {
            Ok(members) => members,
            Err(err) => {
                tracing::warn!(extension, error = %err, "queue membership lookup failed");
                Vec::new()
            }
        };
        if members.is_empty() {
            vec![FALLBACK_QUEUE.to_string()]
        } else {
            members
        }
    }

    async fn write_mirror(
        &self,
        extension: &str,
        paused: bool,
        reason: Option<&str>,
    ) -> ExternalOutcome {
        match self.store.set_member_paused(extension, paused, reason).await {
            Ok(rows) => {
                if rows == 0 {
                    tracing::debug!(extension, "no queue member rows for extension");
                }
                ExternalOutcome::ok()
            }
            Err(err) => {
                tracing::warn!(extension, error = %err, "queue member mirror update failed");
                ExternalOutcome::failed(err)
            }
        }
    }

    async fn push_queue_actions(
        &self,
        extension: &str,
        queues: &[String],
        paused: bool,
        reason: Option<&str>,
    ) -> Vec<QueueActionOutcome> {
        let interface = pjsip_interface(extension);
        let mut outcomes = Vec::with_capacity(queues.len());
        for queue in queues {
            let action = AmiAction::QueuePause {
                queue: queue.clone(),
                interface: interface.clone(),
                paused,
                reason: reason.map(str::to_string),
            };
            let outcome = match self.ami.execute_action(action).await {
                Ok(_) => QueueActionOutcome {
                    queue: queue.clone(),
                    applied: true,
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(
                        extension,
                        queue = %queue,
                        error = %err,
                        "queue pause action failed"
                    );
                    QueueActionOutcome {
                        queue: queue.clone(),
                        applied: false,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn reload_queues(&self) -> ExternalOutcome {
        let action = AmiAction::Command {
            command: QUEUE_RELOAD_COMMAND.to_string(),
        };
        match self.ami.execute_action(action).await {
            Ok(_) => ExternalOutcome::ok(),
            Err(err) => {
                tracing::warn!(error = %err, "queue reload failed");
                ExternalOutcome::failed(err)
            }
        }
    }
}

#[async_trait]
impl UnpauseExecutor for PauseCoordinator {
    async fn auto_unpause(&self, extension: &str, pause_session_id: Uuid) -> Result<(), AppError> {
        let _guard = self.locks.handle(extension).lock_owned().await;

        // A timer can fire while a re-pause is in flight; by the time we hold
        // the lock the session it was armed for may no longer be the open
        // one. Acting on anything but that exact session would end a pause
        // the agent just started.
        let open = self.store.open_session(extension).await?;
        match open {
            Some(session) if session.id == pause_session_id => {
                self.unpause_locked(extension, None, UnpauseKind::Auto, Some(session))
                    .await?;
                Ok(())
            }
            _ => {
                tracing::debug!(
                    extension,
                    session_id = %pause_session_id,
                    "auto-unpause skipped, session is no longer open"
                );
                Ok(())
            }
        }
    }
}

fn reason_ref(reason: &PauseReason) -> PauseReasonRef {
    PauseReasonRef {
        code: reason.code.clone(),
        label: reason.label.clone(),
        color: reason.color.clone(),
        icon: reason.icon.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_serialize_in_camel_case_and_omit_empty_errors() {
        let ok = ExternalOutcome::ok();
        let json = serde_json::to_value(&ok).expect("serialize");
        assert_eq!(json, serde_json::json!({ "applied": true }));

        let failed = QueueActionOutcome {
            queue: "support".to_string(),
            applied: false,
            error: Some("AMI not connected".to_string()),
        };
        let json = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(json["queue"], "support");
        assert_eq!(json["applied"], false);
        assert_eq!(json["error"], "AMI not connected");
    }
}
