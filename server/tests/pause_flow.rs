//! Coordinator fan-out semantics: session log, queue-member mirror, PBX
//! actions, presence and events, including the partial-failure contract.

mod support;

use chrono::Duration as ChronoDuration;
use queuedesk_server::ami::AmiAction;
use queuedesk_server::error::AppError;
use queuedesk_server::events::{AgentAvailability, AgentEvent};
use queuedesk_server::models::agent::Presence;
use queuedesk_server::utils::Clock;
use support::{drain_events, Harness};

#[tokio::test]
async fn pause_creates_session_mirror_and_pbx_actions() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support", "sales"]);
    let start = harness.clock.now();

    let outcome = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause");

    assert!(outcome.session.is_open());
    assert_eq!(outcome.session.extension, "1001");
    assert_eq!(outcome.session.pause_reason_code, "BREAK");
    assert_eq!(outcome.session.queue_name.as_deref(), Some("support,sales"));
    assert_eq!(
        outcome.session.scheduled_unpause_at,
        Some(start + ChronoDuration::minutes(5))
    );
    assert_eq!(outcome.queues, vec!["support", "sales"]);
    assert!(outcome.mirror.applied);
    assert!(outcome.reload.applied);
    assert!(outcome.replaced_session_id.is_none());
    assert_eq!(outcome.queue_actions.len(), 2);
    assert!(outcome.queue_actions.iter().all(|a| a.applied));

    assert_eq!(harness.store.open_count("1001"), 1);
    assert_eq!(
        harness.store.presence_of("1001"),
        Some((Presence::Paused, Some("BREAK".to_string())))
    );
    assert_eq!(
        harness.store.mirror_of("1001"),
        Some((true, Some("BREAK".to_string())))
    );
    assert_eq!(harness.scheduler.timer_count(), 1);

    let actions = harness.ami.recorded();
    assert_eq!(actions.len(), 3);
    assert_eq!(
        actions[0],
        AmiAction::QueuePause {
            queue: "support".to_string(),
            interface: "PJSIP/1001".to_string(),
            paused: true,
            reason: Some("Short Break".to_string()),
        }
    );
    assert_eq!(
        actions[2],
        AmiAction::Command {
            command: "queue reload all".to_string(),
        }
    );
}

#[tokio::test]
async fn pause_with_unknown_reason_is_rejected_without_side_effects() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);

    let err = harness
        .coordinator
        .pause("1001", "COFFEE", None)
        .await
        .expect_err("unknown reason");

    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Invalid pause reason code"),
        other => panic!("expected BadRequest, got {other:?}"),
    }
    assert!(harness.store.sessions_for("1001").is_empty());
    assert!(harness.ami.recorded().is_empty());
    assert_eq!(harness.store.mirror_of("1001"), None);
}

#[tokio::test]
async fn pause_requires_extension_and_reason_code() {
    let harness = Harness::new();

    let err = harness
        .coordinator
        .pause("   ", "BREAK", None)
        .await
        .expect_err("blank extension");
    match err {
        AppError::BadRequest(msg) => {
            assert_eq!(msg, "Extension and reason code are required")
        }
        other => panic!("expected BadRequest, got {other:?}"),
    }

    let err = harness
        .coordinator
        .pause("1001", "", None)
        .await
        .expect_err("blank reason");
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn explicit_queues_override_membership() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);

    let outcome = harness
        .coordinator
        .pause("1001", "BREAK", Some(vec!["vip".to_string()]))
        .await
        .expect("pause");
    assert_eq!(outcome.queues, vec!["vip"]);
    assert_eq!(outcome.queue_actions.len(), 1);
    assert_eq!(outcome.queue_actions[0].queue, "vip");

    // Whitespace-only queues do not count as an explicit list.
    harness.store.set_membership("1002", &["north"]);
    let outcome = harness
        .coordinator
        .pause("1002", "BREAK", Some(vec!["   ".to_string()]))
        .await
        .expect("pause");
    assert_eq!(outcome.queues, vec!["north"]);
}

#[tokio::test]
async fn missing_membership_falls_back_to_the_default_queue() {
    let harness = Harness::new();

    let outcome = harness
        .coordinator
        .pause("1003", "BREAK", None)
        .await
        .expect("pause");

    assert_eq!(outcome.queues, vec!["default"]);
    assert_eq!(outcome.queue_actions[0].queue, "default");
    // No member rows to touch; the mirror write is still reported as applied.
    assert!(outcome.mirror.applied);
}

#[tokio::test]
async fn membership_lookup_failure_degrades_to_the_default_queue() {
    let harness = Harness::new();
    harness.store.fail_membership_lookups();

    let outcome = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause");

    assert_eq!(outcome.queues, vec!["default"]);
    assert_eq!(harness.store.open_count("1001"), 1);
}

#[tokio::test]
async fn pbx_failure_is_absorbed_into_the_outcome() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);
    harness.ami.go_offline();

    let outcome = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause despite PBX outage");

    assert!(!outcome.queue_actions[0].applied);
    assert_eq!(
        outcome.queue_actions[0].error.as_deref(),
        Some("AMI not connected")
    );
    assert!(!outcome.reload.applied);
    // The session log is authoritative and unaffected.
    assert_eq!(harness.store.open_count("1001"), 1);
    assert_eq!(harness.scheduler.timer_count(), 1);
}

#[tokio::test]
async fn mirror_failure_is_absorbed_into_the_outcome() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);
    harness.store.fail_mirror_writes();

    let outcome = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause despite mirror outage");

    assert!(!outcome.mirror.applied);
    assert_eq!(
        outcome.mirror.error.as_deref(),
        Some("queue member mirror unavailable")
    );
    assert_eq!(harness.store.open_count("1001"), 1);
}

#[tokio::test]
async fn session_log_failure_fails_the_request() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);
    harness.store.fail_session_inserts();

    let err = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect_err("insert failure");

    assert!(matches!(err, AppError::InternalServerError(_)));
    // Writes earlier in the fan-out are not rolled back; the ones after the
    // log never happen.
    assert_eq!(
        harness.store.mirror_of("1001"),
        Some((true, Some("BREAK".to_string())))
    );
    assert_eq!(harness.store.presence_of("1001"), None);
    assert_eq!(harness.scheduler.timer_count(), 0);
}

#[tokio::test]
async fn re_pausing_replaces_the_open_session() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);

    let first = harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("first pause");
    harness.clock.advance(ChronoDuration::minutes(2));

    let second = harness
        .coordinator
        .pause("1001", "LUNCH", None)
        .await
        .expect("second pause");

    assert_eq!(second.replaced_session_id, Some(first.session.id));
    assert_eq!(harness.store.open_count("1001"), 1);

    let closed = harness.store.session(first.session.id).expect("first session");
    assert!(!closed.is_open());
    assert_eq!(closed.duration_seconds, Some(120));
    assert!(!closed.auto_unpaused);

    let open = harness.store.session(second.session.id).expect("second session");
    assert!(open.is_open());
    assert_eq!(open.pause_reason_code, "LUNCH");
    assert_eq!(
        open.scheduled_unpause_at,
        Some(harness.clock.now() + ChronoDuration::minutes(30))
    );
    assert_eq!(harness.scheduler.timer_count(), 1);
}

#[tokio::test]
async fn unpause_closes_the_session_and_reports_the_duration() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);

    harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause");
    harness.clock.advance(ChronoDuration::minutes(2));
    harness.ami.clear();

    let outcome = harness
        .coordinator
        .unpause("1001", None)
        .await
        .expect("unpause");

    let session = outcome.session.expect("closed session");
    assert!(!session.is_open());
    assert_eq!(outcome.pause_duration, 120);
    assert!(!outcome.auto_unpaused);
    assert_eq!(
        harness.store.presence_of("1001"),
        Some((Presence::Ready, None))
    );
    assert_eq!(harness.store.mirror_of("1001"), Some((false, None)));
    assert_eq!(harness.scheduler.timer_count(), 0);

    let actions = harness.ami.recorded();
    assert_eq!(actions.len(), 2);
    assert_eq!(
        actions[0],
        AmiAction::QueuePause {
            queue: "support".to_string(),
            interface: "PJSIP/1001".to_string(),
            paused: false,
            reason: None,
        }
    );
}

#[tokio::test]
async fn unpausing_an_idle_agent_still_clears_external_state() {
    let harness = Harness::new();
    let mut rx = harness.subscribe();

    let outcome = harness
        .coordinator
        .unpause("1001", None)
        .await
        .expect("unpause");

    assert!(outcome.session.is_none());
    assert_eq!(outcome.pause_duration, 0);
    assert_eq!(outcome.queues, vec!["default"]);
    assert!(harness.store.sessions_for("1001").is_empty());
    // The repair path still pushes the unpause everywhere and tells
    // subscribers about it.
    assert_eq!(outcome.queue_actions.len(), 1);
    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "agent:unpaused");
    assert_eq!(events[1].name(), "agent:status");
}

#[tokio::test]
async fn pause_and_unpause_emit_realtime_events() {
    let harness = Harness::new();
    harness.store.set_membership("1001", &["support"]);
    let mut rx = harness.subscribe();

    harness
        .coordinator
        .pause("1001", "BREAK", None)
        .await
        .expect("pause");

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 2);
    let AgentEvent::Paused(paused) = &events[0] else {
        panic!("expected paused event, got {:?}", events[0]);
    };
    assert_eq!(paused.extension, "1001");
    assert_eq!(paused.pause_reason.code, "BREAK");
    assert_eq!(paused.pause_reason.label, "Short Break");
    assert_eq!(paused.queues, vec!["support"]);
    let AgentEvent::Status(status) = &events[1] else {
        panic!("expected status event, got {:?}", events[1]);
    };
    assert_eq!(status.data.status, AgentAvailability::Paused);
    assert_eq!(status.data.pause_reason.as_deref(), Some("BREAK"));

    harness.clock.advance(ChronoDuration::minutes(1));
    harness
        .coordinator
        .unpause("1001", None)
        .await
        .expect("unpause");

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 2);
    let AgentEvent::Unpaused(unpaused) = &events[0] else {
        panic!("expected unpaused event, got {:?}", events[0]);
    };
    assert_eq!(unpaused.pause_duration, 60);
    assert!(!unpaused.auto_unpaused);
    let AgentEvent::Status(status) = &events[1] else {
        panic!("expected status event, got {:?}", events[1]);
    };
    assert_eq!(status.data.status, AgentAvailability::Available);
    assert_eq!(status.data.pause_reason, None);
}
