//! Single strategy: one resource at a time
//!
//! The flattest loop: create one resource, wait out a slow creation if
//! needed, then delete it again unless it hit a target range. Runs in
//! fixed-size rounds with a randomized pause between them.
//!
//! Its distinctive stop rule: once a matched target address occupies the
//! last available account slot there is no room to keep probing, so the
//! strategy stops and the process exits successfully.

use super::{HarvestEngine, StrategyOutcome, should_stop_for_target_slot};
use crate::error::{Error, Result};
use crate::traits::{CreateOutcome, DeleteOutcome, Snapshot};
use rand::Rng;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

impl HarvestEngine {
    pub(crate) async fn run_single(
        &mut self,
        _base: &BTreeSet<Ipv4Addr>,
    ) -> Result<StrategyOutcome> {
        let goal = self
            .rng
            .gen_range(self.config.single_goal_created_min..=self.config.single_goal_created_max);
        let round_size = self.config.single_round_size.max(1);
        let mut total_created = 0usize;
        let mut round_created = 0usize;

        info!(
            "single strategy: goal {goal} created (range {}-{})",
            self.config.single_goal_created_min, self.config.single_goal_created_max
        );
        info!(
            "single strategy: round size={round_size}, pause {}-{}s",
            self.config.single_round_pause_min_s, self.config.single_round_pause_max_s
        );

        while total_created < goal {
            let Some(snapshot) = self.observe().await else {
                return Ok(self.single_restart(
                    "could not observe current resources (single strategy); restarting cycle",
                ));
            };

            if self.stop_if_target_holds_last_slot(&snapshot).await {
                return Ok(StrategyOutcome::Stop);
            }

            if snapshot.total_slots() >= self.config.account_limit {
                let pause = self.sample_secs(
                    self.config.single_round_pause_min_s,
                    self.config.single_round_pause_max_s,
                );
                info!(
                    "account limit reached; waiting {:.1}s before retrying",
                    pause.as_secs_f64()
                );
                self.notify_pause("account limit reached; waiting for a free slot", pause)
                    .await;
                sleep(pause).await;
                continue;
            }

            let before = snapshot.addresses.clone();
            self.throttle.acquire().await;
            let outcome = self.driver.create_resource().await;
            let created = if let Ok(CreateOutcome::Created(addr)) = &outcome {
                *addr
            } else {
                match &outcome {
                    Ok(CreateOutcome::Pending) => info!("creation pending; waiting for completion"),
                    Err(e) => warn!("create call failed: {e}; waiting for a late appearance"),
                    _ => warn!("create failed or timed out; waiting for a late appearance"),
                }
                match self.wait_for_new_address(&before).await? {
                    Some(addr) => addr,
                    None => {
                        warn!("creation did not complete after waiting; restarting cycle");
                        return Ok(self.single_restart(
                            "creation did not complete after waiting; restarting cycle",
                        ));
                    }
                }
            };

            total_created += 1;
            round_created += 1;
            info!("created: {created}");
            let hit = self.register_address(created).await;

            if hit.is_some() {
                // target hit: the address is kept permanently; deletion is
                // skipped and the slot condition re-checked right away
                let Some(snapshot) = self.observe().await else {
                    return Ok(self.single_restart(
                        "could not observe current resources (single strategy); restarting cycle",
                    ));
                };
                if self.stop_if_target_holds_last_slot(&snapshot).await {
                    return Ok(StrategyOutcome::Stop);
                }
            } else {
                self.throttle.acquire().await;
                match self.driver.delete_resource(created).await {
                    Ok(DeleteOutcome::Deleted) => {}
                    other => {
                        match &other {
                            Ok(DeleteOutcome::Pending) => {
                                info!("deletion in progress; waiting for completion")
                            }
                            Err(e) => warn!("delete call failed: {e}; waiting for removal"),
                            _ => warn!("delete failed; waiting for removal"),
                        }
                        if !self.wait_for_removal(created).await? {
                            warn!("deletion did not complete after waiting; restarting cycle");
                            return Ok(self.single_restart(
                                "deletion did not complete after waiting; restarting cycle",
                            ));
                        }
                    }
                }
            }

            if round_created >= round_size && total_created < goal {
                let pause = self.sample_secs(
                    self.config.single_round_pause_min_s,
                    self.config.single_round_pause_max_s,
                );
                info!("inter-round pause (single): {:.1}s", pause.as_secs_f64());
                self.notify_pause("pause between rounds (single strategy)", pause)
                    .await;
                sleep(pause).await;
                round_created = 0;
            }
        }

        Ok(StrategyOutcome::Completed)
    }

    async fn stop_if_target_holds_last_slot(&self, snapshot: &Snapshot) -> bool {
        if !should_stop_for_target_slot(
            self.config.account_limit,
            snapshot,
            &self.matched_target_ips,
        ) {
            return false;
        }
        info!("a target address occupies the last account slot; stopping single strategy");
        self.notifier
            .send_text("A target address occupies the last account slot; finishing up.")
            .await;
        true
    }

    fn single_restart(&self, reason: &str) -> StrategyOutcome {
        StrategyOutcome::Restart {
            pause: Duration::from_secs(self.config.single_restart_pause_s),
            reason: reason.into(),
        }
    }

    /// Wait for an address outside `before` to surface, re-observing the
    /// pool a bounded number of times.
    ///
    /// Fatal markers are checked on every iteration; an exhausted budget is
    /// a transient outcome (`Ok(None)`), not an error.
    async fn wait_for_new_address(
        &mut self,
        before: &BTreeSet<Ipv4Addr>,
    ) -> Result<Option<Ipv4Addr>> {
        let reload_every = Duration::from_secs(self.config.single_reload_every_s);
        let mut reloads = 0usize;
        let mut next_forced = Instant::now() + reload_every;

        loop {
            if self.failure_is_fatal().await {
                return Err(Error::fatal_create(
                    "service reported a fatal error while waiting for resource creation (single strategy)",
                ));
            }

            match self.driver.list_resources().await {
                Ok(entries) => {
                    let snapshot = Snapshot::from_entries(&entries);
                    if let Some(addr) = snapshot.addresses.iter().find(|a| !before.contains(a)) {
                        return Ok(Some(*addr));
                    }
                    if reloads >= self.config.single_max_reload_attempts {
                        return Ok(None);
                    }
                    if Instant::now() >= next_forced {
                        info!("still waiting for creation; re-observing the pool");
                        reloads += 1;
                        next_forced = Instant::now() + reload_every;
                        continue;
                    }
                    self.poll_sleep().await;
                }
                Err(e) => {
                    warn!("failed to list resources while waiting for creation: {e}");
                    reloads += 1;
                    if reloads >= self.config.single_max_reload_attempts {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Wait for `addr` to disappear from the pool, with the same bounded
    /// re-observation budget as [`wait_for_new_address`].
    ///
    /// [`wait_for_new_address`]: HarvestEngine::wait_for_new_address
    async fn wait_for_removal(&mut self, addr: Ipv4Addr) -> Result<bool> {
        let reload_every = Duration::from_secs(self.config.single_reload_every_s);
        let mut reloads = 0usize;
        let mut next_forced = Instant::now() + reload_every;

        loop {
            if self.failure_is_fatal().await {
                return Err(Error::fatal_delete(
                    "service reported a fatal error while waiting for resource deletion (single strategy)",
                ));
            }

            match self.driver.list_resources().await {
                Ok(entries) => {
                    let snapshot = Snapshot::from_entries(&entries);
                    if !snapshot.addresses.contains(&addr) {
                        return Ok(true);
                    }
                    if reloads >= self.config.single_max_reload_attempts {
                        return Ok(false);
                    }
                    if Instant::now() >= next_forced {
                        info!("still waiting for deletion; re-observing the pool");
                        reloads += 1;
                        next_forced = Instant::now() + reload_every;
                        continue;
                    }
                    self.poll_sleep().await;
                }
                Err(e) => {
                    warn!("failed to list resources while waiting for removal: {e}");
                    reloads += 1;
                    if reloads >= self.config.single_max_reload_attempts {
                        return Ok(false);
                    }
                }
            }
        }
    }
}
