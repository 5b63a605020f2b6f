// # Resource Driver Trait
//
// Defines the interface for mutating and observing the pool of floating IP
// addresses held by the account on the remote allocation service.
//
// ## Implementations
//
// - HTTP panel API: `fip-driver-http` crate
// - Test doubles: `tests/common` scripted driver
//
// ## Trust level
//
// Drivers are untrusted, single-shot collaborators:
//
// - one remote call per method invocation; no retry, no backoff, no
//   scheduling (all owned by the engine)
// - no knowledge of quotas, strategies or statistics
// - an ambiguous remote outcome is reported as `Pending`, never guessed at
//
// The engine never trusts a mutation's own report: it re-lists before
// deciding its next action.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Result of one allocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The service confirmed the allocation and reported the address
    Created(Ipv4Addr),
    /// The service accepted the request but has not finished it; the slot
    /// is occupied and the address may appear in a later listing
    Pending,
    /// The service rejected or lost the request
    Failed,
}

/// Result of one deletion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The resource is gone
    Deleted,
    /// Deletion is underway; the slot is still occupied
    Pending,
    /// The service rejected the request
    Failed,
}

/// Lifecycle state of a listed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Allocation still in progress
    Pending,
    /// Fully allocated
    Active,
}

/// One row of a resource listing
///
/// A pending row may not carry an address yet; it still occupies a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    pub address: Option<Ipv4Addr>,
    pub status: ResourceStatus,
}

impl ResourceEntry {
    pub fn active(address: Ipv4Addr) -> Self {
        Self {
            address: Some(address),
            status: ResourceStatus::Active,
        }
    }

    pub fn pending(address: Option<Ipv4Addr>) -> Self {
        Self {
            address,
            status: ResourceStatus::Pending,
        }
    }
}

/// Immutable view of the pool at one point in time
///
/// Built from a single `list_resources()` call and used only for diffing;
/// remote state is never assumed stable between two listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Every address currently visible, regardless of status
    pub addresses: BTreeSet<Ipv4Addr>,
    /// Pending rows that do not carry an address yet
    pub pending_slots: usize,
}

impl Snapshot {
    pub fn from_entries(entries: &[ResourceEntry]) -> Self {
        let mut addresses = BTreeSet::new();
        let mut pending_slots = 0;
        for entry in entries {
            match entry.address {
                Some(addr) => {
                    addresses.insert(addr);
                }
                None if entry.status == ResourceStatus::Pending => pending_slots += 1,
                None => {}
            }
        }
        Self {
            addresses,
            pending_slots,
        }
    }

    /// Occupied account slots: visible addresses plus address-less pending rows
    pub fn total_slots(&self) -> usize {
        self.addresses.len() + self.pending_slots
    }
}

/// Trait for resource driver implementations
///
/// All coordination (throttling, retries, quota arithmetic, failure
/// classification) is owned by the engine; implementations perform exactly
/// one remote interaction per call and report what they observed.
#[async_trait]
pub trait ResourceDriver: Send + Sync {
    /// Attempt one allocation.
    ///
    /// `Pending` is a legitimate outcome: the service may defer completion,
    /// in which case the new address surfaces via [`list_resources`] later.
    ///
    /// [`list_resources`]: ResourceDriver::list_resources
    async fn create_resource(&self) -> crate::Result<CreateOutcome>;

    /// Current snapshot of every resource held by the account
    async fn list_resources(&self) -> crate::Result<Vec<ResourceEntry>>;

    /// Attempt to delete `address`.
    ///
    /// Deleting an address that is already gone reports `Deleted`, keeping
    /// cleanup idempotent.
    async fn delete_resource(&self, address: Ipv4Addr) -> crate::Result<DeleteOutcome>;

    /// Best-effort raw content of the most recent failure response, for
    /// fatal-marker scanning. `None` when nothing could be observed —
    /// which is never itself evidence of a fatal service error.
    async fn observe_failure_text(&self) -> Option<String>;
}
