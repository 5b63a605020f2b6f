// # fip-core
//
// Core library for the floating-IP harvesting orchestrator.
//
// ## Architecture Overview
//
// This library provides the acquisition orchestrator:
// - **ResourceDriver**: trait for creating/listing/deleting floating IPs on
//   the remote allocation service
// - **Notifier**: trait for fire-and-forget status messages
// - **HarvestEngine**: round/cycle state machine coordinating everything
// - **RarityStore**: durable, dated per-subnet observation counts
// - **MutationThrottle**: sliding-window rate limit + settle delay
// - **FailureClassifier**: fatal-marker scanning of observed failure text
//
// ## Design Principles
//
// 1. **Separation of Concerns**: the engine owns all policy; drivers and
//    notifiers are single-shot collaborators behind traits
// 2. **Strict Sequencing**: one cycle, one strategy, one mutation in flight
// 3. **Observation over Trust**: re-list before every decision; a mutation's
//    own report is never authoritative
// 4. **Durable Bias**: rarity statistics persist across runs and steer the
//    rare strategy

pub mod config;
pub mod engine;
pub mod error;
pub mod fatal;
pub mod rarity;
pub mod report;
pub mod strategy;
pub mod targets;
pub mod throttle;
pub mod traits;

// Re-export core types for convenience
pub use config::HarvestConfig;
pub use engine::{CycleOutcome, HarvestEngine, should_stop_for_target_slot};
pub use error::{Error, Result};
pub use fatal::{FailureClassifier, MarkerClassifier};
pub use rarity::RarityStore;
pub use strategy::Strategy;
pub use throttle::MutationThrottle;
pub use traits::{
    CreateOutcome, DeleteOutcome, NoopNotifier, Notifier, ResourceDriver, ResourceEntry,
    ResourceStatus, Snapshot,
};
