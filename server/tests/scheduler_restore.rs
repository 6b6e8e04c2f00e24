//! Startup restore: open sessions with a durable deadline get their timers
//! re-armed, and deadlines that passed while the server was down are honored
//! immediately.

mod support;

use chrono::Duration as ChronoDuration;
use queuedesk_server::events::AgentEvent;
use queuedesk_server::models::agent::Presence;
use queuedesk_server::services::RestoreSummary;
use queuedesk_server::utils::Clock;
use support::{drain_events, open_session_at, Harness};

#[tokio::test(start_paused = true)]
async fn restore_rearms_future_deadlines() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let session = open_session_at(
        "1001",
        "BREAK",
        now - ChronoDuration::minutes(2),
        Some(now + ChronoDuration::minutes(3)),
    );
    harness.store.insert_session(session.clone());

    let summary = harness
        .scheduler
        .restore(harness.store.as_ref())
        .await
        .expect("restore");

    assert_eq!(summary, RestoreSummary { armed: 1, expired: 0 });
    assert_eq!(harness.scheduler.timer_count(), 1);
    assert_eq!(harness.scheduler.remaining_seconds("1001"), Some(180));
    assert!(harness
        .store
        .session(session.id)
        .expect("session row")
        .is_open());

    // The restored timer behaves like a freshly armed one.
    harness.advance(ChronoDuration::seconds(181)).await;
    let closed = harness.store.session(session.id).expect("session row");
    assert!(!closed.is_open());
    assert!(closed.auto_unpaused);
    assert_eq!(closed.duration_seconds, Some(301));
}

#[tokio::test(start_paused = true)]
async fn restore_unpauses_sessions_that_expired_while_down() {
    let harness = Harness::new();
    let mut rx = harness.subscribe();
    let now = harness.clock.now();
    let session = open_session_at(
        "1001",
        "BREAK",
        now - ChronoDuration::minutes(20),
        Some(now - ChronoDuration::minutes(15)),
    );
    harness.store.insert_session(session.clone());

    let summary = harness
        .scheduler
        .restore(harness.store.as_ref())
        .await
        .expect("restore");

    assert_eq!(summary, RestoreSummary { armed: 0, expired: 1 });
    assert_eq!(harness.scheduler.timer_count(), 0);

    let closed = harness.store.session(session.id).expect("session row");
    assert!(!closed.is_open());
    assert!(closed.auto_unpaused);
    assert_eq!(closed.duration_seconds, Some(20 * 60));
    assert_eq!(
        harness.store.presence_of("1001"),
        Some((Presence::Ready, None))
    );

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 2);
    let AgentEvent::Unpaused(unpaused) = &events[0] else {
        panic!("expected unpaused event, got {:?}", events[0]);
    };
    assert!(unpaused.auto_unpaused);
}

#[tokio::test(start_paused = true)]
async fn restore_ignores_unbounded_sessions() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let session = open_session_at("1001", "TECHNICAL", now - ChronoDuration::hours(2), None);
    harness.store.insert_session(session.clone());

    let summary = harness
        .scheduler
        .restore(harness.store.as_ref())
        .await
        .expect("restore");

    assert_eq!(summary, RestoreSummary::default());
    assert_eq!(harness.scheduler.timer_count(), 0);
    assert!(harness
        .store
        .session(session.id)
        .expect("session row")
        .is_open());
}

#[tokio::test(start_paused = true)]
async fn restore_handles_a_mixed_backlog() {
    let harness = Harness::new();
    let now = harness.clock.now();
    let future = open_session_at(
        "1001",
        "LUNCH",
        now - ChronoDuration::minutes(10),
        Some(now + ChronoDuration::minutes(20)),
    );
    let expired = open_session_at(
        "2002",
        "BREAK",
        now - ChronoDuration::minutes(9),
        Some(now - ChronoDuration::minutes(4)),
    );
    let unbounded = open_session_at("3003", "TECHNICAL", now - ChronoDuration::hours(1), None);
    harness.store.insert_session(future.clone());
    harness.store.insert_session(expired.clone());
    harness.store.insert_session(unbounded.clone());

    let summary = harness
        .scheduler
        .restore(harness.store.as_ref())
        .await
        .expect("restore");

    assert_eq!(summary, RestoreSummary { armed: 1, expired: 1 });
    assert_eq!(harness.scheduler.timer_count(), 1);
    assert_eq!(harness.scheduler.remaining_seconds("1001"), Some(20 * 60));

    assert!(harness.store.session(future.id).expect("row").is_open());
    assert!(!harness.store.session(expired.id).expect("row").is_open());
    assert!(harness.store.session(unbounded.id).expect("row").is_open());
}
