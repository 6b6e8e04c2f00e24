//! Durable log of pause intervals, one row per pause.

use crate::models::pause_reason::PauseReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
/// Persistent representation of one pause interval. A row with `end_time`
/// `None` is the open session for its extension.
pub struct PauseSession {
    /// Unique identifier.
    pub id: Uuid,
    /// Agent extension number.
    pub extension: String,
    /// Reference to the catalog row, when it still exists.
    pub pause_reason_id: Option<Uuid>,
    /// Reason code captured at pause time, kept even if the catalog changes.
    pub pause_reason_code: String,
    /// Reason label captured at pause time.
    pub pause_reason_label: Option<String>,
    /// When the pause started.
    pub start_time: DateTime<Utc>,
    /// When the pause ended; `None` while the agent is still paused.
    pub end_time: Option<DateTime<Utc>>,
    /// Total duration in seconds, filled when the session closes.
    pub duration_seconds: Option<i32>,
    /// Comma-joined list of the queues the pause was applied to.
    pub queue_name: Option<String>,
    /// Set when the scheduler, not the agent, ended the pause.
    pub auto_unpaused: bool,
    /// Deadline for the automatic unpause, persisted so timers survive
    /// restarts. `None` for unbounded reasons.
    pub scheduled_unpause_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PauseSession {
    /// Opens a new session for the given reason. The auto-unpause deadline is
    /// derived here, once, so the stored value and the armed timer agree.
    pub fn new(
        extension: &str,
        reason: &PauseReason,
        queues: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            extension: extension.to_string(),
            pause_reason_id: Some(reason.id),
            pause_reason_code: reason.code.clone(),
            pause_reason_label: Some(reason.label.clone()),
            start_time: now,
            end_time: None,
            duration_seconds: None,
            queue_name: if queues.is_empty() {
                None
            } else {
                Some(queues.join(","))
            },
            auto_unpaused: false,
            scheduled_unpause_at: reason.max_duration().map(|bound| now + bound),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` while the session has not been closed.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Seconds elapsed since the pause started, floored at zero.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }

    /// Marks the session as ended and computes its duration.
    pub fn close(&mut self, end_time: DateTime<Utc>, auto_unpaused: bool) {
        self.duration_seconds = Some(self.elapsed_seconds(end_time) as i32);
        self.end_time = Some(end_time);
        self.auto_unpaused = auto_unpaused;
        self.updated_at = end_time;
    }

    /// The queues this session was applied to, split back out of the stored
    /// comma-joined form.
    pub fn queues(&self) -> Vec<String> {
        self.queue_name
            .as_deref()
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pause_reason::CreatePauseReasonPayload;
    use chrono::Duration as ChronoDuration;

    fn reason(minutes: Option<i32>) -> PauseReason {
        PauseReason::new(
            CreatePauseReasonPayload {
                code: "BREAK".to_string(),
                label: "Short Break".to_string(),
                description: None,
                color: None,
                icon: None,
                max_duration_minutes: minutes,
                requires_approval: None,
                sort_order: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_session_is_open_and_carries_the_deadline() {
        let now = Utc::now();
        let queues = vec!["support".to_string(), "sales".to_string()];
        let session = PauseSession::new("1001", &reason(Some(5)), &queues, now);
        assert!(session.is_open());
        assert_eq!(session.queue_name.as_deref(), Some("support,sales"));
        assert_eq!(
            session.scheduled_unpause_at,
            Some(now + ChronoDuration::minutes(5))
        );
        assert_eq!(session.queues(), queues);
    }

    #[test]
    fn unbounded_reason_leaves_no_deadline() {
        let session = PauseSession::new("1002", &reason(None), &[], Utc::now());
        assert_eq!(session.scheduled_unpause_at, None);
        assert_eq!(session.queue_name, None);
        assert!(session.queues().is_empty());
    }

    #[test]
    fn close_computes_duration_and_flags_auto() {
        let now = Utc::now();
        let mut session = PauseSession::new("1001", &reason(Some(5)), &[], now);
        session.close(now + ChronoDuration::seconds(120), true);
        assert!(!session.is_open());
        assert_eq!(session.duration_seconds, Some(120));
        assert!(session.auto_unpaused);
    }

    #[test]
    fn close_clamps_durations_from_skewed_clocks() {
        let now = Utc::now();
        let mut session = PauseSession::new("1001", &reason(Some(5)), &[], now);
        session.close(now - ChronoDuration::seconds(30), false);
        assert_eq!(session.duration_seconds, Some(0));
    }
}
