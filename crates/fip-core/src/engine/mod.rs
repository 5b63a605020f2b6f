//! Core harvesting engine
//!
//! The HarvestEngine is the round/cycle state machine. It drives repeated
//! create/delete operations against the [`ResourceDriver`] under quota and
//! goal constraints, records every observed address in the [`RarityStore`],
//! classifies addresses against the target ranges, throttles every mutation,
//! and decides pause/restart/stop outcomes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  HarvestEngine   │  one cycle at a time, one mutation in flight
//! └──────────────────┘
//!      │           │
//!      ▼           ▼
//! ┌──────────┐ ┌───────────┐   strategy loops (main / rare / single)
//! │ Strategy │ │ Throttle  │   live in the sibling modules
//! └──────────┘ └───────────┘
//!      │           │
//!      ▼           ▼
//! ┌──────────┐ ┌───────────┐ ┌──────────┐
//! │  Driver  │ │  Rarity   │ │ Notifier │
//! │ (remote) │ │ (durable) │ │ (chat)   │
//! └──────────┘ └───────────┘ └──────────┘
//! ```
//!
//! ## Cycle lifecycle
//!
//! selecting-strategy → running-strategy → cleaning-up → paused/restarting →
//! next cycle. Terminal success (goal reached) makes [`HarvestEngine::run`]
//! return `Ok(())`; fatal service errors surface as
//! [`Error::FatalCreate`]/[`Error::FatalDelete`].
//!
//! Everything runs on a single logical task: there is deliberately no
//! parallel resource creation, because account-level quotas and the
//! before/after diffing both require strict sequencing.

mod main_strategy;
mod rare;
mod single;

use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::fatal::FailureClassifier;
use crate::rarity::RarityStore;
use crate::rarity::format::{SubnetCounts, format_table};
use crate::report::format_duration;
use crate::strategy::{Strategy, choose_strategy};
use crate::targets;
use crate::throttle::MutationThrottle;
use crate::traits::{DeleteOutcome, Notifier, ResourceDriver, Snapshot};
use ipnet::Ipv4Net;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Result of one full cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycle finished its goal and cleaned up; pause, then start the next one
    Completed {
        /// Randomized inter-cycle pause
        pause: Duration,
    },
    /// Transient failure; pause, then restart from the top of a cycle
    Restart {
        pause: Duration,
        reason: String,
    },
    /// A stop condition was met; the process exits successfully
    GoalReached,
}

/// How a strategy's inner loop ended (cycle-internal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StrategyOutcome {
    Completed,
    Stop,
    Restart { pause: Duration, reason: String },
}

/// Observed effect of one deletion attempt
pub(crate) enum MutationStep {
    Done,
    Pending,
    Transient,
}

/// What a new target hit means for the main strategy
pub(crate) enum TargetAction {
    Stop,
    LongPause,
    Continue,
}

/// Single-strategy stop rule: a matched target address currently occupies
/// the last available account slot, so no further create can fit.
pub fn should_stop_for_target_slot(
    account_limit: usize,
    snapshot: &Snapshot,
    matched_target_ips: &HashSet<Ipv4Addr>,
) -> bool {
    if matched_target_ips.is_empty() {
        return false;
    }
    if snapshot.total_slots() < account_limit {
        return false;
    }
    matched_target_ips
        .iter()
        .any(|ip| snapshot.addresses.contains(ip))
}

/// Core harvesting engine
///
/// Owns every stateful component; collaborators are trait objects so tests
/// inject scripted doubles (the same seam the daemon uses for the real
/// driver and notifier).
pub struct HarvestEngine {
    driver: Box<dyn ResourceDriver>,
    notifier: Box<dyn Notifier>,
    classifier: Box<dyn FailureClassifier>,
    rarity: RarityStore,
    throttle: MutationThrottle,
    config: HarvestConfig,
    targets: Vec<Ipv4Net>,

    // process-lifetime bookkeeping, never cleared between cycles
    matched_target_ips: HashSet<Ipv4Addr>,
    matched_target_subnets: HashSet<Ipv4Net>,
    paused_after_first_target: bool,
    cycle_counts: SubnetCounts,
    cycle_index: u64,

    rng: StdRng,
}

impl HarvestEngine {
    /// Create a new engine
    ///
    /// Validates the configuration, parses the target CIDR list (malformed
    /// entries are skipped with a warning) and wires the rarity store and
    /// mutation throttle from it.
    pub fn new(
        driver: Box<dyn ResourceDriver>,
        notifier: Box<dyn Notifier>,
        classifier: Box<dyn FailureClassifier>,
        config: HarvestConfig,
    ) -> Result<Self> {
        config.validate()?;

        let targets = targets::parse_cidrs(&config.target_cidrs);
        let rarity = RarityStore::new(&config.stats_file);
        let throttle = MutationThrottle::new(
            config.max_rpm,
            config.mutation_cooldown_min_s,
            config.mutation_cooldown_max_s,
        );

        Ok(Self {
            driver,
            notifier,
            classifier,
            rarity,
            throttle,
            config,
            targets,
            matched_target_ips: HashSet::new(),
            matched_target_subnets: HashSet::new(),
            paused_after_first_target: false,
            cycle_counts: SubnetCounts::new(),
            cycle_index: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Target addresses acquired so far in this process
    pub fn matched_target_ips(&self) -> &HashSet<Ipv4Addr> {
        &self.matched_target_ips
    }

    /// Distinct target subnets hit so far in this process
    pub fn matched_target_subnets(&self) -> &HashSet<Ipv4Net> {
        &self.matched_target_subnets
    }

    /// Run cycles until a stop condition or a fatal error
    ///
    /// # Returns
    ///
    /// - `Ok(())`: a goal was reached; the process should exit 0
    /// - `Err(Error)`: fatal or unclassified failure, already notified;
    ///   map to an exit code with [`Error::exit_code`]
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::GoalReached) => {
                    info!("acquisition goal reached; exiting");
                    return Ok(());
                }
                Ok(CycleOutcome::Completed { pause }) => {
                    info!(
                        "cycle finished; final pause before a new cycle: {:.1}s",
                        pause.as_secs_f64()
                    );
                    self.notify_pause("final pause before a new cycle", pause).await;
                    sleep(pause).await;
                }
                Ok(CycleOutcome::Restart { pause, reason }) => {
                    info!("non-fatal failure: {reason}; pausing {:.1}s", pause.as_secs_f64());
                    self.notify_pause(&reason, pause).await;
                    sleep(pause).await;
                }
                Err(e) => {
                    self.notify_error(&e).await;
                    return Err(e);
                }
            }
        }
    }

    /// Drive one full cycle: strategy selection through cleanup.
    ///
    /// Public so contract tests can drive cycles without the infinite loop
    /// and inter-cycle pauses of [`run`](HarvestEngine::run).
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.cycle_index += 1;

        let Some(snapshot) = self.observe().await else {
            return Ok(CycleOutcome::Restart {
                pause: self.failure_pause(),
                reason: "could not observe current resources; restarting cycle".into(),
            });
        };
        let base = snapshot.addresses;
        info!("base addresses (protected this cycle): {}", base.len());

        let (strategy, rare_networks) = choose_strategy(
            &self.config.strategy_mode,
            self.config.strategy_auto_probability,
            &self.rarity,
            self.config.rare_subnet_top_n,
            self.config.rare_subnet_max_count,
            &mut self.rng,
        )
        .await;
        info!("strategy for this cycle: {strategy}");

        let mut details = format!(
            "Starting cycle #{}. Strategy: {strategy}. Base addresses: {}. Target ranges: {}.",
            self.cycle_index,
            base.len(),
            self.targets.len()
        );
        if strategy == Strategy::Rare {
            details.push_str(&format!(" Rare subnets in the bucket: {}.", rare_networks.len()));
        }
        self.notifier.send_text(&details).await;

        let outcome = match strategy {
            Strategy::Main => self.run_main(&base).await?,
            Strategy::Rare => self.run_rare(&base, &rare_networks).await?,
            Strategy::Single => self.run_single(&base).await?,
        };

        match outcome {
            StrategyOutcome::Restart { pause, reason } => {
                Ok(CycleOutcome::Restart { pause, reason })
            }
            StrategyOutcome::Stop => {
                if strategy != Strategy::Single && !self.cleanup_non_target().await? {
                    self.notifier
                        .send_text("Non-fatal error during final cleanup; stopping anyway.")
                        .await;
                }
                self.notify_cycle_stats().await;
                Ok(CycleOutcome::GoalReached)
            }
            StrategyOutcome::Completed => {
                if strategy == Strategy::Single {
                    info!("single strategy: skipping cleanup of non-target addresses");
                } else if !self.cleanup_non_target().await? {
                    return Ok(CycleOutcome::Restart {
                        pause: self.failure_pause(),
                        reason: "non-fatal error during final cleanup; restarting cycle".into(),
                    });
                }
                self.notify_cycle_stats().await;
                let pause =
                    self.sample_secs(self.config.final_pause_min_s, self.config.final_pause_max_s);
                Ok(CycleOutcome::Completed { pause })
            }
        }
    }

    /// List the pool, retrying the observation once.
    ///
    /// `None` means the remote state could not be observed at all; callers
    /// treat that as a transient failure, never as an empty pool.
    async fn observe(&self) -> Option<Snapshot> {
        for attempt in 1..=2 {
            match self.driver.list_resources().await {
                Ok(entries) => return Some(Snapshot::from_entries(&entries)),
                Err(e) => warn!("failed to list resources (attempt {attempt}): {e}"),
            }
        }
        None
    }

    /// Record a newly observed address and classify it against the targets.
    ///
    /// Returns the matched target network, if any. Target bookkeeping is
    /// process-lifetime: an address is never re-matched or re-notified.
    async fn register_address(&mut self, addr: Ipv4Addr) -> Option<Ipv4Net> {
        self.rarity
            .record_observation(addr, chrono::Local::now().date_naive())
            .await;
        let subnet = targets::subnet_of(addr).to_string();
        *self.cycle_counts.entry(subnet).or_insert(0) += 1;

        let hit = targets::first_containing(addr, &self.targets)?;
        self.matched_target_ips.insert(addr);
        self.matched_target_subnets.insert(hit);
        info!("target range hit: {addr} in {hit}");
        self.notifier
            .send_text(&format!(
                "Target address acquired: {addr} in {hit}. Totals: addresses={}, subnets={}.",
                self.matched_target_ips.len(),
                self.matched_target_subnets.len()
            ))
            .await;
        Some(hit)
    }

    /// Stop/pause policy applied after every target hit (main strategy)
    fn evaluate_target_progress(&mut self) -> TargetAction {
        if self.matched_target_subnets.len() >= self.config.target_goal_distinct_subnets {
            TargetAction::Stop
        } else if self.matched_target_ips.len() >= self.config.target_goal_ips {
            info!(
                "target address goal reached, distinct subnets so far: {}",
                self.matched_target_subnets.len()
            );
            TargetAction::Stop
        } else if !self.paused_after_first_target {
            // once per process: a long pause after the very first hit
            self.paused_after_first_target = true;
            TargetAction::LongPause
        } else {
            TargetAction::Continue
        }
    }

    /// Scan the most recent failure text for fatal markers.
    ///
    /// Unobtainable text is never fatal: a failed read is not evidence of a
    /// fatal service error.
    async fn failure_is_fatal(&self) -> bool {
        match self.driver.observe_failure_text().await {
            Some(text) => self.classifier.is_fatal(&text),
            None => false,
        }
    }

    /// Handle a failed create: fatal markers abort, otherwise the caller
    /// restarts the cycle.
    async fn create_failure(&self, context: &str) -> Result<()> {
        warn!("create failed or timed out ({context})");
        if self.failure_is_fatal().await {
            return Err(Error::fatal_create(format!(
                "service reported a fatal error while creating a resource ({context})"
            )));
        }
        Ok(())
    }

    /// One throttled deletion attempt
    async fn delete_one(&mut self, addr: Ipv4Addr, context: &str) -> Result<MutationStep> {
        self.throttle.acquire().await;
        let outcome = match self.driver.delete_resource(addr).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("delete call for {addr} failed: {e}");
                DeleteOutcome::Failed
            }
        };
        match outcome {
            DeleteOutcome::Deleted => Ok(MutationStep::Done),
            DeleteOutcome::Pending => {
                info!("deletion of {addr} in progress; slot occupied, continuing");
                Ok(MutationStep::Pending)
            }
            DeleteOutcome::Failed => {
                warn!("delete failed ({context})");
                if self.failure_is_fatal().await {
                    Err(Error::fatal_delete(format!(
                        "service reported a fatal error while deleting a resource ({context})"
                    )))
                } else {
                    Ok(MutationStep::Transient)
                }
            }
        }
    }

    /// Delete every address that is not a target match.
    ///
    /// `Ok(false)` is a transient cleanup failure; fatal markers escalate.
    async fn cleanup_non_target(&mut self) -> Result<bool> {
        let Some(snapshot) = self.observe().await else {
            warn!("could not list resources before final cleanup");
            return Ok(false);
        };

        let addresses: Vec<Ipv4Addr> = snapshot.addresses.iter().copied().collect();
        for addr in addresses {
            if targets::first_containing(addr, &self.targets).is_some() {
                continue;
            }
            match self.delete_one(addr, "final cleanup").await? {
                MutationStep::Done | MutationStep::Pending => {}
                MutationStep::Transient => {
                    warn!("delete failed during final cleanup");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    async fn notify_pause(&self, reason: &str, pause: Duration) {
        self.notifier
            .send_text(&format!(
                "Pause: {reason}. Duration: {}.",
                format_duration(pause.as_secs_f64())
            ))
            .await;
    }

    async fn notify_error(&self, error: &Error) {
        let prefix = if error.is_fatal() { "Fatal error" } else { "Error" };
        self.notifier.send_text(&format!("{prefix}: {error}")).await;
    }

    /// Per-subnet creation histogram, rendered like the rarity file tables
    async fn notify_cycle_stats(&self) {
        self.notifier
            .send_text(
                "Subnet statistics: how many addresses were created per /24 subnet this run.",
            )
            .await;
        self.notifier
            .send_table(format_table(&self.cycle_counts).trim_end_matches('\n'))
            .await;
    }

    fn failure_pause(&self) -> Duration {
        Duration::from_secs(self.config.failure_pause_s)
    }

    /// Uniform duration in `[min, max]` seconds
    fn sample_secs(&mut self, min: u64, max: u64) -> Duration {
        use rand::Rng;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.rng.gen_range(min as f64..=max as f64))
    }

    /// Short randomized delay between polls of remote state
    async fn poll_sleep(&mut self) {
        use rand::Rng;
        let max = self.config.poll_sleep_max_s;
        if max <= 0.0 {
            return;
        }
        let secs = self.rng.gen_range(self.config.poll_sleep_min_s..=max);
        sleep(Duration::from_secs_f64(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ResourceEntry;

    fn snapshot(active: &[&str], pending_slots: usize) -> Snapshot {
        let mut entries: Vec<ResourceEntry> = active
            .iter()
            .map(|a| ResourceEntry::active(a.parse().unwrap()))
            .collect();
        for _ in 0..pending_slots {
            entries.push(ResourceEntry::pending(None));
        }
        Snapshot::from_entries(&entries)
    }

    fn matched(addrs: &[&str]) -> HashSet<Ipv4Addr> {
        addrs.iter().map(|a| a.parse().unwrap()).collect()
    }

    #[test]
    fn stops_when_a_target_fills_the_last_slot() {
        let snap = snapshot(&["10.0.0.1", "79.174.91.5"], 0);
        assert!(should_stop_for_target_slot(2, &snap, &matched(&["79.174.91.5"])));
    }

    #[test]
    fn does_not_stop_below_the_account_limit() {
        let snap = snapshot(&["10.0.0.1", "79.174.91.5"], 0);
        assert!(!should_stop_for_target_slot(3, &snap, &matched(&["79.174.91.5"])));
    }

    #[test]
    fn does_not_stop_without_a_matched_target() {
        let snap = snapshot(&["10.0.0.1", "10.0.0.2"], 0);
        assert!(!should_stop_for_target_slot(2, &snap, &HashSet::new()));
    }

    #[test]
    fn pending_rows_count_toward_the_limit() {
        // target active, second slot consumed by an address-less pending row
        let snap = snapshot(&["79.174.91.5"], 1);
        assert!(should_stop_for_target_slot(2, &snap, &matched(&["79.174.91.5"])));
    }

    #[test]
    fn matched_target_must_still_be_active() {
        // matched earlier but deleted since; pool is full of other addresses
        let snap = snapshot(&["10.0.0.1", "10.0.0.2"], 0);
        assert!(!should_stop_for_target_slot(2, &snap, &matched(&["79.174.91.5"])));
    }
}
