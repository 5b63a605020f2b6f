//! Contract tests: main strategy
//!
//! The main strategy creates resources in rounds toward a per-cycle goal,
//! deletes each round's creations in reverse order, and applies the target
//! stop/pause policy. These tests drive single cycles against a scripted
//! driver on a paused clock.

mod common;

use common::*;
use fip_core::CycleOutcome;
use std::net::Ipv4Addr;
use tempfile::tempdir;

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn creates_goal_then_deletes_everything_in_reverse_order() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "main".into();
    config.goal_total_created = 3;
    config.round_cap_min = 3;
    config.round_cap_max = 3;

    let cloud = FakeCloud::new();
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.1")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.2")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.3")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));

    assert_eq!(cloud.create_calls(), 3);
    assert_eq!(
        cloud.delete_calls(),
        vec![addr("10.0.0.3"), addr("10.0.0.2"), addr("10.0.0.1")],
        "round cleanup deletes in reverse creation order"
    );
    assert!(cloud.addresses().is_empty(), "nothing survives final cleanup");
}

#[tokio::test(start_paused = true)]
async fn late_appearing_address_is_picked_up_by_diffing() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "main".into();
    config.goal_total_created = 3;
    config.round_cap_min = 3;
    config.round_cap_max = 3;

    let cloud = FakeCloud::new();
    // reported pending, but visible in the next listing
    cloud.script_create(CreateStep::Appear(addr("10.0.0.1")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.2")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.3")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));

    assert_eq!(cloud.create_calls(), 3, "pending create still occupies one attempt");
    let deletes = cloud.delete_calls();
    assert_eq!(deletes.len(), 3, "the late appearance is cleaned up too");
    assert!(deletes.contains(&addr("10.0.0.1")));
}

#[tokio::test(start_paused = true)]
async fn base_addresses_are_protected_within_the_cycle() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "main".into();
    config.goal_total_created = 1;
    config.round_cap_min = 2;
    config.round_cap_max = 2;

    // one pre-existing address; round diffing must not delete it
    let cloud = FakeCloud::new().with_existing("192.168.1.50");
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.1")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));

    // the base address falls only to final cleanup (it matches no target),
    // never to round cleanup; round cleanup touched just our creation
    let deletes = cloud.delete_calls();
    assert_eq!(deletes[0], addr("10.0.0.1"));
}

#[tokio::test(start_paused = true)]
async fn first_target_hit_pauses_second_stops_the_run() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "main".into();
    config.goal_total_created = 10;
    config.round_cap_min = 5;
    config.round_cap_max = 5;
    config.target_cidrs = vec!["79.174.91.0/24".into(), "79.174.92.0/24".into()];
    config.target_goal_ips = 2;
    config.target_goal_distinct_subnets = 2;
    config.target_pause_s = 3600;

    let cloud = FakeCloud::new();
    cloud.script_create(CreateStep::Succeed(addr("79.174.91.5")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.1")));
    cloud.script_create(CreateStep::Succeed(addr("79.174.92.6")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert_eq!(outcome, CycleOutcome::GoalReached);

    // both target addresses survive; only the bystander was deleted
    assert_eq!(cloud.delete_calls(), vec![addr("10.0.0.1")]);
    let remaining = cloud.addresses();
    assert!(remaining.contains(&addr("79.174.91.5")));
    assert!(remaining.contains(&addr("79.174.92.6")));

    assert!(notifier.contains("Target address acquired: 79.174.91.5"));
    assert!(notifier.contains("Target address acquired: 79.174.92.6"));
    // the hours-scale pause fires once, after the first hit only
    assert!(notifier.contains("pausing before continuing"));

    assert_eq!(engine.matched_target_subnets().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unobservable_pool_restarts_the_cycle() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "main".into();

    let cloud = FakeCloud::new();
    cloud.fail_next_lists(2); // both the listing and its retry fail

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("transient, not an error");
    match outcome {
        CycleOutcome::Restart { reason, .. } => {
            assert!(reason.contains("could not observe"));
        }
        other => panic!("expected Restart, got {other:?}"),
    }
    assert_eq!(cloud.create_calls(), 0, "no mutation without an observation");
}
