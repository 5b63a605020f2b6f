//! Test doubles and common utilities for engine contract tests
//!
//! `FakeCloud` is a scripted stand-in for the remote allocation service:
//! creations follow a script, listings reflect the fake pool, deletions
//! mutate it, and every driver call is recorded for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use fip_core::error::Result;
use fip_core::fatal::MarkerClassifier;
use fip_core::traits::{
    CreateOutcome, DeleteOutcome, Notifier, ResourceDriver, ResourceEntry,
};
use fip_core::{HarvestConfig, HarvestEngine};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One scripted response to a create call
#[derive(Debug, Clone, Copy)]
pub enum CreateStep {
    /// Allocation succeeds and reports its address
    Succeed(Ipv4Addr),
    /// Allocation is reported pending, but the address becomes visible in
    /// listings anyway (late appearance)
    Appear(Ipv4Addr),
    /// Allocation is reported pending and nothing happens
    Pending,
    /// Allocation fails
    Fail,
}

/// Recorded driver interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Create,
    List,
    Delete(Ipv4Addr),
}

#[derive(Default)]
struct CloudState {
    addresses: Vec<Ipv4Addr>,
    pending_rows: usize,
    create_script: VecDeque<CreateStep>,
    delete_script: VecDeque<DeleteOutcome>,
    failure_text: Option<String>,
    list_failures: usize,
    calls: Vec<DriverCall>,
}

/// Scripted in-memory stand-in for the remote allocation service
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing address (present before the first cycle)
    pub fn with_existing(self, addr: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .addresses
            .push(addr.parse().unwrap());
        self
    }

    /// Append one step to the create script
    pub fn script_create(&self, step: CreateStep) {
        self.state.lock().unwrap().create_script.push_back(step);
    }

    /// Script the outcome of the next delete call (default: Deleted)
    pub fn script_delete(&self, outcome: DeleteOutcome) {
        self.state.lock().unwrap().delete_script.push_back(outcome);
    }

    /// Failure text returned by `observe_failure_text`
    pub fn set_failure_text(&self, text: &str) {
        self.state.lock().unwrap().failure_text = Some(text.to_string());
    }

    /// Make the next `n` list calls fail
    pub fn fail_next_lists(&self, n: usize) {
        self.state.lock().unwrap().list_failures = n;
    }

    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.state.lock().unwrap().addresses.clone()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, DriverCall::Create))
            .count()
    }

    /// Deleted addresses, in call order
    pub fn delete_calls(&self) -> Vec<Ipv4Addr> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Delete(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ResourceDriver for FakeCloud {
    async fn create_resource(&self) -> Result<CreateOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Create);
        match state.create_script.pop_front() {
            Some(CreateStep::Succeed(addr)) => {
                state.addresses.push(addr);
                Ok(CreateOutcome::Created(addr))
            }
            Some(CreateStep::Appear(addr)) => {
                state.addresses.push(addr);
                Ok(CreateOutcome::Pending)
            }
            Some(CreateStep::Pending) => Ok(CreateOutcome::Pending),
            Some(CreateStep::Fail) | None => Ok(CreateOutcome::Failed),
        }
    }

    async fn list_resources(&self) -> Result<Vec<ResourceEntry>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::List);
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(fip_core::Error::driver("scripted list failure"));
        }
        let mut entries: Vec<ResourceEntry> =
            state.addresses.iter().map(|a| ResourceEntry::active(*a)).collect();
        for _ in 0..state.pending_rows {
            entries.push(ResourceEntry::pending(None));
        }
        Ok(entries)
    }

    async fn delete_resource(&self, address: Ipv4Addr) -> Result<DeleteOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Delete(address));
        match state.delete_script.pop_front() {
            Some(outcome) => {
                if outcome == DeleteOutcome::Deleted {
                    state.addresses.retain(|a| *a != address);
                }
                Ok(outcome)
            }
            None => {
                state.addresses.retain(|a| *a != address);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    async fn observe_failure_text(&self) -> Option<String> {
        self.state.lock().unwrap().failure_text.clone()
    }
}

/// Notifier that records every message for assertions
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains(fragment))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }

    async fn send_table(&self, table: &str) {
        self.messages.lock().unwrap().push(table.to_string());
    }
}

/// Config with all pauses and throttling collapsed for fast, deterministic
/// tests on tokio's paused clock
pub fn test_config(stats_file: &Path) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.account_limit = 5;
    config.max_rpm = 1000;
    config.mutation_cooldown_min_s = 0;
    config.mutation_cooldown_max_s = 0;
    config.poll_sleep_min_s = 0.5;
    config.poll_sleep_max_s = 0.5;
    config.round_pause_min_s = 0;
    config.round_pause_max_s = 0;
    config.final_pause_min_s = 0;
    config.final_pause_max_s = 0;
    config.failure_pause_s = 0;
    config.single_round_pause_min_s = 0;
    config.single_round_pause_max_s = 0;
    config.single_restart_pause_s = 0;
    config.single_reload_every_s = 1;
    config.stats_file = stats_file.to_string_lossy().into_owned();
    config
}

/// Engine wired to the given doubles, with the marker classifier built from
/// the config's own marker list
pub fn engine_with(
    cloud: &FakeCloud,
    notifier: &RecordingNotifier,
    config: HarvestConfig,
) -> HarvestEngine {
    let classifier = MarkerClassifier::new(config.fatal_error_markers.clone());
    HarvestEngine::new(
        Box::new(cloud.clone()),
        Box::new(notifier.clone()),
        Box::new(classifier),
        config,
    )
    .expect("engine construction succeeds")
}
