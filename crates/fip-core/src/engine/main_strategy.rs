//! Main strategy: bulk create-and-release rounds
//!
//! Repeats rounds until `goal_total_created` resources were created this
//! cycle. Each round creates up to a random cap, then deletes its own
//! creations in reverse order, keeping base addresses and target hits.

use super::{HarvestEngine, MutationStep, StrategyOutcome, TargetAction};
use crate::error::Result;
use crate::traits::CreateOutcome;
use rand::Rng;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

impl HarvestEngine {
    pub(crate) async fn run_main(
        &mut self,
        base: &BTreeSet<Ipv4Addr>,
    ) -> Result<StrategyOutcome> {
        let goal = self.config.goal_total_created;
        let mut total_created = 0usize;
        // survives across rounds: diffing against it catches addresses that
        // appear late, after their create call reported pending or timed out
        let mut last_seen = base.clone();

        while total_created < goal {
            let round_cap = self
                .rng
                .gen_range(self.config.round_cap_min..=self.config.round_cap_max)
                .min(self.config.account_limit);
            info!("=== round start: cap={round_cap}, total={total_created}/{goal} ===");

            let mut round_created: Vec<Ipv4Addr> = Vec::new();
            let mut stop_after_cleanup = false;
            let mut long_pause_after_cleanup = false;
            let mut restart: Option<String> = None;

            loop {
                let Some(snapshot) = self.observe().await else {
                    restart = Some(
                        "could not observe current resources (main strategy); restarting cycle"
                            .into(),
                    );
                    break;
                };

                let fresh: Vec<Ipv4Addr> = snapshot
                    .addresses
                    .iter()
                    .filter(|a| !last_seen.contains(a))
                    .copied()
                    .collect();
                for addr in fresh {
                    total_created += 1;
                    info!("detected new address: {addr}");
                    if !round_created.contains(&addr) {
                        round_created.push(addr);
                    }
                    if self.register_address(addr).await.is_some() {
                        match self.evaluate_target_progress() {
                            TargetAction::Stop => stop_after_cleanup = true,
                            TargetAction::LongPause => long_pause_after_cleanup = true,
                            TargetAction::Continue => {}
                        }
                        if stop_after_cleanup || long_pause_after_cleanup {
                            break;
                        }
                    }
                }
                last_seen = snapshot.addresses.clone();
                if stop_after_cleanup || long_pause_after_cleanup {
                    break;
                }

                let slots = snapshot.total_slots();
                if slots >= round_cap {
                    info!("round cap reached");
                    break;
                }
                if slots >= self.config.account_limit {
                    info!("account limit reached");
                    break;
                }
                if total_created >= goal {
                    break;
                }

                self.throttle.acquire().await;
                match self.driver.create_resource().await {
                    Ok(CreateOutcome::Created(addr)) => {
                        last_seen.insert(addr);
                        round_created.push(addr);
                        total_created += 1;
                        info!("created: {addr}");
                        if self.register_address(addr).await.is_some() {
                            match self.evaluate_target_progress() {
                                TargetAction::Stop => stop_after_cleanup = true,
                                TargetAction::LongPause => long_pause_after_cleanup = true,
                                TargetAction::Continue => {}
                            }
                            if stop_after_cleanup || long_pause_after_cleanup {
                                break;
                            }
                        }
                    }
                    Ok(CreateOutcome::Pending) => {
                        info!("creation pending; slot occupied, continuing");
                    }
                    Ok(CreateOutcome::Failed) | Err(_) => {
                        self.create_failure("main strategy").await?;
                        restart =
                            Some("non-fatal create failure (main strategy); restarting cycle".into());
                        break;
                    }
                }
            }

            // round cleanup: this round's creations, newest first; base and
            // matched target addresses are protected
            if !round_created.is_empty() {
                info!("cleanup: deleting {} addresses", round_created.len());
            }
            let to_delete: Vec<Ipv4Addr> = round_created.iter().rev().copied().collect();
            for addr in to_delete {
                if base.contains(&addr) || self.matched_target_ips.contains(&addr) {
                    continue;
                }
                match self.delete_one(addr, "main strategy").await? {
                    MutationStep::Done | MutationStep::Pending => {}
                    MutationStep::Transient => {
                        restart =
                            Some("non-fatal delete failure (main strategy); restarting cycle".into());
                        break;
                    }
                }
            }

            if stop_after_cleanup {
                info!("target goal reached; finishing up");
                return Ok(StrategyOutcome::Stop);
            }
            if let Some(reason) = restart {
                return Ok(StrategyOutcome::Restart {
                    pause: self.failure_pause(),
                    reason,
                });
            }
            if long_pause_after_cleanup {
                let pause = Duration::from_secs(self.config.target_pause_s);
                info!(
                    "address from a target range acquired; pausing {:.1} h",
                    pause.as_secs_f64() / 3600.0
                );
                self.notify_pause("address from a target range acquired; pausing before continuing", pause)
                    .await;
                sleep(pause).await;
            }
            if total_created < goal {
                let pause =
                    self.sample_secs(self.config.round_pause_min_s, self.config.round_pause_max_s);
                info!("inter-round pause: {:.1}s", pause.as_secs_f64());
                self.notify_pause("pause between rounds", pause).await;
                sleep(pause).await;
            }
        }

        Ok(StrategyOutcome::Completed)
    }
}
