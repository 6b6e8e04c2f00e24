//! Realtime event fan-out for dashboards and wallboards.
//!
//! Pause state changes are published on a broadcast bus; consumers (the
//! realtime gateway, tests) subscribe and forward. Emission never blocks and
//! never fails the operation that triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Snapshot of the catalog entry attached to a pause event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PauseReasonRef {
    pub code: String,
    pub label: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPausedPayload {
    pub extension: String,
    pub pause_reason: PauseReasonRef,
    pub start_time: DateTime<Utc>,
    pub queues: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUnpausedPayload {
    pub extension: String,
    pub queues: Vec<String>,
    /// Seconds the agent spent paused; zero when no open session was found.
    pub pause_duration: i64,
    /// Present only when the scheduler ended the pause.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_unpaused: bool,
    pub timestamp: DateTime<Utc>,
}

/// Wire values for the coarse status feed. These strings are a consumer
/// contract, distinct from the `READY`/`PAUSED` presence column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentAvailability {
    Paused,
    Available,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusData {
    pub status: AgentAvailability,
    pub pause_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_reason_label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusPayload {
    pub extension: String,
    pub data: AgentStatusData,
}

/// Events published by the pause subsystem.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum AgentEvent {
    #[serde(rename = "agent:paused")]
    Paused(AgentPausedPayload),
    #[serde(rename = "agent:unpaused")]
    Unpaused(AgentUnpausedPayload),
    #[serde(rename = "agent:status")]
    Status(AgentStatusPayload),
}

impl AgentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AgentEvent::Paused(_) => "agent:paused",
            AgentEvent::Unpaused(_) => "agent:unpaused",
            AgentEvent::Status(_) => "agent:status",
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            AgentEvent::Paused(p) => &p.extension,
            AgentEvent::Unpaused(p) => &p.extension,
            AgentEvent::Status(p) => &p.extension,
        }
    }
}

/// Broadcast bus carrying [`AgentEvent`]s to any number of subscribers.
///
/// Cloning is cheap; all clones publish to the same channel. Slow subscribers
/// miss events rather than applying backpressure.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. A bus with no subscribers drops the event
    /// silently; that is normal during startup and in tests.
    pub fn emit(&self, event: AgentEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(event = name, receivers, "Published agent event");
            }
            Err(_) => {
                tracing::trace!(event = name, "No subscribers for agent event");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
