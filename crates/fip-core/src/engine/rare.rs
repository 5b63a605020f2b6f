//! Rare strategy: probe-and-keep churn biased toward rarely seen subnets
//!
//! A few probe slots are intentionally churned: each new address either
//! closes the strategy (target hit), is kept (rare-list hit or a subnet
//! never seen before, up to the cycle's keep cap), or is deleted to free
//! its slot for the next probe.

use super::{HarvestEngine, MutationStep, StrategyOutcome};
use crate::error::Result;
use crate::targets;
use crate::traits::CreateOutcome;
use ipnet::Ipv4Net;
use rand::Rng;
use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use tracing::info;

impl HarvestEngine {
    pub(crate) async fn run_rare(
        &mut self,
        base: &BTreeSet<Ipv4Addr>,
        rare_networks: &[Ipv4Net],
    ) -> Result<StrategyOutcome> {
        let probe_slots = self.config.rare_rotation_slots.max(1);
        let goal = self
            .rng
            .gen_range(self.config.rare_goal_created_min..=self.config.rare_goal_created_max);
        // how many non-base, non-target addresses this cycle may retain
        let keep_cap = (self.config.account_limit as i64
            - probe_slots as i64
            - base.len() as i64
            - self.matched_target_ips.len() as i64)
            .clamp(0, self.config.rare_keep_max as i64) as usize;

        let mut total_created = 0usize;
        let mut kept_rare: BTreeSet<Ipv4Addr> = BTreeSet::new();
        let mut known_subnets = self.rarity.known_subnets().await;
        let mut last_seen = base.clone();

        info!("rare strategy: keep up to {keep_cap} addresses (probe slots={probe_slots})");
        info!(
            "rare strategy: goal {goal} created (range {}-{})",
            self.config.rare_goal_created_min, self.config.rare_goal_created_max
        );
        info!("rare subnets in the bucket: {}", rare_networks.len());

        loop {
            if total_created >= goal {
                info!("rare strategy: goal reached ({total_created}/{goal})");
                break;
            }

            let Some(snapshot) = self.observe().await else {
                return Ok(StrategyOutcome::Restart {
                    pause: self.failure_pause(),
                    reason: "could not observe current resources (rare strategy); restarting cycle"
                        .into(),
                });
            };

            let fresh: Vec<Ipv4Addr> = snapshot
                .addresses
                .iter()
                .filter(|a| !last_seen.contains(a))
                .copied()
                .collect();
            let mut stop_rare = false;
            for addr in fresh {
                total_created += 1;
                info!("detected new address: {addr}");
                if self.register_address(addr).await.is_some() {
                    info!("probe slot closed permanently; rare strategy finished");
                    stop_rare = true;
                    break;
                }
                self.apply_rare_keep(addr, rare_networks, &mut known_subnets, &mut kept_rare, keep_cap);
            }
            last_seen = snapshot.addresses.clone();
            if stop_rare {
                break;
            }

            let probes: Vec<Ipv4Addr> = snapshot
                .addresses
                .iter()
                .filter(|a| {
                    !base.contains(a)
                        && !self.matched_target_ips.contains(a)
                        && !kept_rare.contains(a)
                })
                .copied()
                .collect();

            // out of slots: churn one probe to make room, or end the cycle
            // if everything left is protected
            if snapshot.total_slots() >= self.config.account_limit {
                if probes.is_empty() {
                    info!("no free probe slots left; finishing rare strategy");
                    break;
                }
                match self.delete_one(probes[0], "rare strategy").await? {
                    MutationStep::Done | MutationStep::Pending => continue,
                    MutationStep::Transient => {
                        return Ok(StrategyOutcome::Restart {
                            pause: self.failure_pause(),
                            reason:
                                "non-fatal delete failure (rare strategy); restarting cycle".into(),
                        });
                    }
                }
            }

            if probes.len() >= probe_slots {
                match self.delete_one(probes[0], "rare strategy").await? {
                    MutationStep::Done | MutationStep::Pending => continue,
                    MutationStep::Transient => {
                        return Ok(StrategyOutcome::Restart {
                            pause: self.failure_pause(),
                            reason:
                                "non-fatal delete failure (rare strategy); restarting cycle".into(),
                        });
                    }
                }
            }

            self.throttle.acquire().await;
            match self.driver.create_resource().await {
                Ok(CreateOutcome::Created(addr)) => {
                    last_seen.insert(addr);
                    total_created += 1;
                    info!("created: {addr}");
                    if self.register_address(addr).await.is_some() {
                        info!("probe slot closed permanently; rare strategy finished");
                        break;
                    }
                    self.apply_rare_keep(
                        addr,
                        rare_networks,
                        &mut known_subnets,
                        &mut kept_rare,
                        keep_cap,
                    );
                }
                Ok(CreateOutcome::Pending) => {
                    info!("creation pending; slot occupied, continuing");
                }
                Ok(CreateOutcome::Failed) | Err(_) => {
                    self.create_failure("rare strategy").await?;
                    return Ok(StrategyOutcome::Restart {
                        pause: self.failure_pause(),
                        reason: "non-fatal create failure (rare strategy); restarting cycle".into(),
                    });
                }
            }
        }

        Ok(StrategyOutcome::Completed)
    }

    /// Keep decision for one non-target address
    ///
    /// Kept when it hits the rare-network list, or when its subnet was never
    /// seen before in the statistics, as long as the keep cap allows.
    fn apply_rare_keep(
        &self,
        addr: Ipv4Addr,
        rare_networks: &[Ipv4Net],
        known_subnets: &mut HashSet<String>,
        kept_rare: &mut BTreeSet<Ipv4Addr>,
        keep_cap: usize,
    ) {
        let rare_hit = targets::first_containing(addr, rare_networks);
        let subnet = targets::subnet_of(addr).to_string();
        let is_new_subnet = !known_subnets.contains(&subnet);
        if is_new_subnet {
            known_subnets.insert(subnet.clone());
            info!("subnet never seen before: {subnet}");
        }

        if let Some(net) = rare_hit {
            if kept_rare.len() < keep_cap {
                kept_rare.insert(addr);
                info!("rare subnet hit: {addr} in {net}");
                info!("rare keep: {}/{keep_cap}", kept_rare.len());
            } else {
                info!("rare subnet hit (keep limit {keep_cap} reached); continuing to probe");
            }
        } else if is_new_subnet {
            if kept_rare.len() < keep_cap {
                kept_rare.insert(addr);
                info!("kept for new subnet: {subnet}");
                info!("rare keep: {}/{keep_cap}", kept_rare.len());
            } else {
                info!("new subnet (keep limit {keep_cap} reached); continuing to probe");
            }
        }
    }
}
