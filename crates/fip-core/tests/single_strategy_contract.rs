//! Contract tests: single strategy
//!
//! One resource at a time: create, wait out slow creations, delete unless
//! the address hit a target range. The distinctive stop rule — a matched
//! target occupying the last account slot — exits the process successfully.

mod common;

use common::*;
use fip_core::{CycleOutcome, Error};
use std::net::Ipv4Addr;
use tempfile::tempdir;

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn target_on_the_last_slot_stops_the_run() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "single".into();
    config.account_limit = 2;
    config.single_goal_created_min = 5;
    config.single_goal_created_max = 5;
    config.target_cidrs = vec!["79.174.91.0/24".into()];

    // one base address plus the target fills the two slots
    let cloud = FakeCloud::new().with_existing("10.0.0.1");
    cloud.script_create(CreateStep::Succeed(addr("79.174.91.5")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert_eq!(outcome, CycleOutcome::GoalReached);

    assert!(cloud.delete_calls().is_empty(), "the target is kept, nothing cleaned");
    let remaining = cloud.addresses();
    assert!(remaining.contains(&addr("79.174.91.5")));
    assert!(remaining.contains(&addr("10.0.0.1")));
    assert!(notifier.contains("occupies the last account slot"));
}

#[tokio::test(start_paused = true)]
async fn non_target_addresses_are_deleted_one_by_one() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "single".into();
    config.single_goal_created_min = 2;
    config.single_goal_created_max = 2;

    let cloud = FakeCloud::new();
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.1")));
    cloud.script_create(CreateStep::Succeed(addr("10.0.0.2")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));

    assert_eq!(cloud.delete_calls(), vec![addr("10.0.0.1"), addr("10.0.0.2")]);
    assert!(cloud.addresses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pending_creation_resolves_through_the_wait_loop() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "single".into();
    config.single_goal_created_min = 1;
    config.single_goal_created_max = 1;

    let cloud = FakeCloud::new();
    // reported pending, but the address is visible on the next listing
    cloud.script_create(CreateStep::Appear(addr("10.0.0.1")));

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("cycle succeeds");
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));
    assert_eq!(cloud.delete_calls(), vec![addr("10.0.0.1")]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_wait_budget_restarts_instead_of_aborting() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "single".into();
    config.single_goal_created_min = 1;
    config.single_goal_created_max = 1;
    config.single_max_reload_attempts = 2;

    let cloud = FakeCloud::new();
    cloud.script_create(CreateStep::Pending); // never materializes

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let outcome = engine.run_cycle().await.expect("transient, not an error");
    match outcome {
        CycleOutcome::Restart { reason, .. } => {
            assert!(reason.contains("creation did not complete"));
        }
        other => panic!("expected Restart, got {other:?}"),
    }
    assert_eq!(cloud.create_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_marker_during_the_wait_aborts_with_exit_code_2() {
    let dir = tempdir().unwrap();
    let mut config = test_config(&dir.path().join("stats.txt"));
    config.strategy_mode = "single".into();
    config.single_goal_created_min = 1;
    config.single_goal_created_max = 1;

    let cloud = FakeCloud::new();
    cloud.script_create(CreateStep::Pending);
    cloud.set_failure_text("504 gateway timeout");

    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&cloud, &notifier, config);

    let err = engine.run_cycle().await.expect_err("fatal marker aborts");
    assert!(matches!(err, Error::FatalCreate(_)));
    assert_eq!(err.exit_code(), 2);
}
