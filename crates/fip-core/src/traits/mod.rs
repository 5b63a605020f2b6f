//! Core traits for the harvesting orchestrator
//!
//! This module defines the abstract interfaces the orchestrator's external
//! collaborators must follow.
//!
//! - [`ResourceDriver`]: create/list/delete floating IPs on the remote service
//! - [`Notifier`]: outbound status messages (fire-and-forget)

pub mod notifier;
pub mod resource_driver;

pub use notifier::{NoopNotifier, Notifier};
pub use resource_driver::{
    CreateOutcome, DeleteOutcome, ResourceDriver, ResourceEntry, ResourceStatus, Snapshot,
};
