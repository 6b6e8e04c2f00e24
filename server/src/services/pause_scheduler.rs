//! Auto-unpause timer wheel.
//!
//! Every pause taken under a bounded reason gets an in-memory timer that
//! fires the unpause flow when the allowance runs out. The deadline is also
//! persisted on the pause session row, which lets [`PauseScheduler::restore`]
//! re-arm timers after a restart and lets the periodic sweep catch any
//! session the in-memory state lost track of.

use crate::error::AppError;
use crate::repositories::PauseStore;
use crate::utils::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Callback the scheduler fires when a pause allowance expires.
///
/// Implemented by the pause coordinator; the scheduler only holds a [`Weak`]
/// reference so the two can point at each other without leaking.
#[async_trait]
pub trait UnpauseExecutor: Send + Sync {
    /// Unpauses `extension` because the pause session `pause_session_id` ran
    /// out. Implementations must treat a session that is no longer the open
    /// one as already handled and do nothing.
    async fn auto_unpause(&self, extension: &str, pause_session_id: Uuid) -> Result<(), AppError>;
}

struct TimerEntry {
    handle: JoinHandle<()>,
    pause_session_id: Uuid,
    scheduled_unpause_time: DateTime<Utc>,
}

/// One armed timer, as reported by the timers endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub extension: String,
    pub pause_session_id: Uuid,
    pub scheduled_unpause_time: DateTime<Utc>,
    pub remaining_seconds: i64,
}

/// What [`PauseScheduler::restore`] did at startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Timers re-armed for deadlines still in the future.
    pub armed: usize,
    /// Sessions whose deadline passed while the server was down; these were
    /// unpaused immediately.
    pub expired: usize,
}

pub struct PauseScheduler {
    timers: Mutex<HashMap<String, TimerEntry>>,
    executor: OnceLock<Weak<dyn UnpauseExecutor>>,
    clock: Arc<dyn Clock>,
}

impl PauseScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            timers: Mutex::new(HashMap::new()),
            executor: OnceLock::new(),
            clock,
        })
    }

    /// Binds the executor after construction. The coordinator owns the
    /// scheduler, so this takes a [`Weak`] to break the cycle.
    pub fn bind_executor(&self, executor: Weak<dyn UnpauseExecutor>) {
        if self.executor.set(executor).is_err() {
            tracing::warn!("unpause executor already bound, ignoring rebind");
        }
    }

    /// Arms a timer for `extension` that fires at `due`. Replaces any timer
    /// already armed for the extension.
    pub fn arm_at(self: &Arc<Self>, extension: &str, pause_session_id: Uuid, due: DateTime<Utc>) {
        let delay = (due - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        let scheduler = Arc::downgrade(self);
        let task_ext = extension.to_string();

        // The lock is held across spawn + insert so a zero-delay task cannot
        // observe the map before its own entry exists.
        let previous = {
            let mut timers = self.lock_timers();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.fire(&task_ext, pause_session_id).await;
                }
            });
            timers.insert(
                extension.to_string(),
                TimerEntry {
                    handle,
                    pause_session_id,
                    scheduled_unpause_time: due,
                },
            )
        };
        if let Some(entry) = previous {
            entry.handle.abort();
        }

        tracing::debug!(
            extension,
            session_id = %pause_session_id,
            due = %due,
            "armed auto-unpause timer"
        );
    }

    /// Cancels the timer for `extension`, if one is armed.
    pub fn cancel(&self, extension: &str) -> bool {
        let removed = self.lock_timers().remove(extension);
        match removed {
            Some(entry) => {
                entry.handle.abort();
                tracing::debug!(extension, "cancelled auto-unpause timer");
                true
            }
            None => false,
        }
    }

    /// Seconds until the armed timer for `extension` fires, if any.
    pub fn remaining_seconds(&self, extension: &str) -> Option<i64> {
        let due = self
            .lock_timers()
            .get(extension)
            .map(|entry| entry.scheduled_unpause_time)?;
        Some((due - self.clock.now()).num_seconds().max(0))
    }

    pub fn timer_count(&self) -> usize {
        self.lock_timers().len()
    }

    /// All armed timers, ordered by extension.
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        let now = self.clock.now();
        let mut entries: Vec<TimerSnapshot> = self
            .lock_timers()
            .iter()
            .map(|(extension, entry)| TimerSnapshot {
                extension: extension.clone(),
                pause_session_id: entry.pause_session_id,
                scheduled_unpause_time: entry.scheduled_unpause_time,
                remaining_seconds: (entry.scheduled_unpause_time - now).num_seconds().max(0),
            })
            .collect();
        entries.sort_by(|a, b| a.extension.cmp(&b.extension));
        entries
    }

    /// Re-arms timers for open sessions that carry a deadline. Sessions whose
    /// deadline already passed are unpaused on the spot.
    pub async fn restore(self: &Arc<Self>, store: &dyn PauseStore) -> Result<RestoreSummary, AppError> {
        let sessions = store.open_scheduled_sessions().await?;
        let now = self.clock.now();
        let mut summary = RestoreSummary::default();

        for session in sessions {
            let Some(due) = session.scheduled_unpause_at else {
                continue;
            };
            if due <= now {
                tracing::info!(
                    extension = %session.extension,
                    session_id = %session.id,
                    due = %due,
                    "pause expired while the server was down, unpausing now"
                );
                self.run_callback(&session.extension, session.id).await;
                summary.expired += 1;
            } else {
                self.arm_at(&session.extension, session.id, due);
                summary.armed += 1;
            }
        }

        Ok(summary)
    }

    /// Spawns the periodic sweep that compares the durable deadlines against
    /// the in-memory timers and fires anything the timers missed.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        store: Arc<dyn PauseStore>,
        period: Duration,
    ) -> JoinHandle<()> {
        let scheduler = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the startup
            // restore is the only pass that runs at boot.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                scheduler.sweep_once(store.as_ref()).await;
            }
        })
    }

    /// One sweep pass. Extensions with a live timer are left to that timer;
    /// everything else that is overdue gets unpaused here.
    pub async fn sweep_once(&self, store: &dyn PauseStore) {
        let now = self.clock.now();
        let due = match store.due_sessions(now).await {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "auto-unpause sweep query failed");
                return;
            }
        };

        for session in due {
            if self.has_timer(&session.extension) {
                continue;
            }
            tracing::warn!(
                extension = %session.extension,
                session_id = %session.id,
                due = ?session.scheduled_unpause_at,
                "overdue pause session had no live timer"
            );
            self.run_callback(&session.extension, session.id).await;
        }
    }

    fn has_timer(&self, extension: &str) -> bool {
        self.lock_timers().contains_key(extension)
    }

    /// Timer expiry path. The entry is removed before the callback runs so a
    /// concurrent re-pause can never abort the task mid-unpause; the removal
    /// is conditional on the session id so a stale wakeup cannot eat a timer
    /// armed for a newer session.
    async fn fire(&self, extension: &str, pause_session_id: Uuid) {
        let owns_entry = {
            let mut timers = self.lock_timers();
            match timers.get(extension) {
                Some(entry) if entry.pause_session_id == pause_session_id => {
                    timers.remove(extension);
                    true
                }
                _ => false,
            }
        };
        if !owns_entry {
            tracing::debug!(
                extension,
                session_id = %pause_session_id,
                "auto-unpause timer superseded before firing"
            );
            return;
        }

        tracing::info!(extension, session_id = %pause_session_id, "pause allowance expired");
        self.run_callback(extension, pause_session_id).await;
    }

    async fn run_callback(&self, extension: &str, pause_session_id: Uuid) {
        let Some(executor) = self.executor.get().and_then(Weak::upgrade) else {
            tracing::warn!(extension, "auto-unpause fired with no executor bound");
            return;
        };
        if let Err(err) = executor.auto_unpause(extension, pause_session_id).await {
            tracing::error!(extension, error = %err, "auto-unpause failed");
        }
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<String, TimerEntry>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PauseScheduler {
    fn drop(&mut self) {
        for entry in self.lock_timers().values() {
            entry.handle.abort();
        }
    }
}
