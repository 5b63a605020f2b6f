//! Configuration types for the harvesting orchestrator
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main harvester configuration
///
/// All durations are plain seconds; paired `_min`/`_max` fields describe a
/// uniform sampling range. Driver-specific settings (endpoints, credentials,
/// page timeouts) belong to the driver implementation, not to this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Hard ceiling on simultaneously held resources (active + pending)
    #[serde(default = "default_account_limit")]
    pub account_limit: usize,

    /// Main strategy: resources to create per cycle
    #[serde(default = "default_goal_total_created")]
    pub goal_total_created: usize,

    /// Main strategy: round cap range, clipped to the account limit
    #[serde(default = "default_round_cap_min")]
    pub round_cap_min: usize,
    #[serde(default = "default_round_cap_max")]
    pub round_cap_max: usize,

    /// Poll delay range while waiting for remote state to settle
    #[serde(default = "default_poll_sleep_min")]
    pub poll_sleep_min_s: f64,
    #[serde(default = "default_poll_sleep_max")]
    pub poll_sleep_max_s: f64,

    /// Mutations allowed within any sliding 60-second window
    #[serde(default = "default_max_rpm")]
    pub max_rpm: usize,

    /// Settle delay range imposed before every mutation
    #[serde(default = "default_mutation_cooldown_min")]
    pub mutation_cooldown_min_s: u64,
    #[serde(default = "default_mutation_cooldown_max")]
    pub mutation_cooldown_max_s: u64,

    /// Pause range between main-strategy rounds
    #[serde(default = "default_round_pause_min")]
    pub round_pause_min_s: u64,
    #[serde(default = "default_round_pause_max")]
    pub round_pause_max_s: u64,

    /// Pause range between cycles after a completed run
    #[serde(default = "default_final_pause_min")]
    pub final_pause_min_s: u64,
    #[serde(default = "default_final_pause_max")]
    pub final_pause_max_s: u64,

    /// Pause before restarting the cycle after a non-fatal failure
    #[serde(default = "default_failure_pause")]
    pub failure_pause_s: u64,

    /// CIDR ranges whose addresses are the acquisition targets
    #[serde(default)]
    pub target_cidrs: Vec<String>,

    /// Stop once this many distinct target addresses were acquired
    #[serde(default = "default_target_goal_ips")]
    pub target_goal_ips: usize,

    /// Stop once this many distinct target subnets were hit
    #[serde(default = "default_target_goal_distinct_subnets")]
    pub target_goal_distinct_subnets: usize,

    /// One-off pause after the first target hit of the process
    #[serde(default = "default_target_pause")]
    pub target_pause_s: u64,

    /// Path of the persisted rarity statistics file
    #[serde(default = "default_stats_file")]
    pub stats_file: String,

    /// Strategy mode: "auto", "main", "rare" or "single".
    /// Unknown values degrade to "main" with a warning.
    #[serde(default = "default_strategy_mode")]
    pub strategy_mode: String,

    /// Probability that "auto" attempts the rare strategy
    #[serde(default = "default_auto_probability")]
    pub strategy_auto_probability: f64,

    /// Single strategy: per-cycle creation goal range
    #[serde(default = "default_single_goal_min")]
    pub single_goal_created_min: usize,
    #[serde(default = "default_single_goal_max")]
    pub single_goal_created_max: usize,

    /// Single strategy: creations per round
    #[serde(default = "default_single_round_size")]
    pub single_round_size: usize,

    /// Single strategy: pause range between rounds
    #[serde(default = "default_single_round_pause_min")]
    pub single_round_pause_min_s: u64,
    #[serde(default = "default_single_round_pause_max")]
    pub single_round_pause_max_s: u64,

    /// Single strategy: forced re-observation interval while waiting
    #[serde(default = "default_single_reload_every")]
    pub single_reload_every_s: u64,

    /// Single strategy: re-observation attempts before giving up a wait
    #[serde(default = "default_single_max_reload_attempts")]
    pub single_max_reload_attempts: usize,

    /// Single strategy: pause before restarting after an exhausted wait
    #[serde(default = "default_single_restart_pause")]
    pub single_restart_pause_s: u64,

    /// Rare strategy: slots intentionally churned while probing
    #[serde(default = "default_rare_rotation_slots")]
    pub rare_rotation_slots: usize,

    /// Rare strategy: most non-target resources retained per cycle
    #[serde(default = "default_rare_keep_max")]
    pub rare_keep_max: usize,

    /// Rare strategy: per-cycle creation goal range
    #[serde(default = "default_rare_goal_min")]
    pub rare_goal_created_min: usize,
    #[serde(default = "default_rare_goal_max")]
    pub rare_goal_created_max: usize,

    /// Rare selection: aggregate count at or below which a subnet is rare
    #[serde(default = "default_rare_subnet_max_count")]
    pub rare_subnet_max_count: u64,

    /// Rare selection: take the N least-seen subnets instead (0 disables)
    #[serde(default)]
    pub rare_subnet_top_n: usize,

    /// Phrases whose presence in observed failure text aborts the run
    #[serde(default = "default_fatal_error_markers")]
    pub fatal_error_markers: Vec<String>,
}

impl HarvestConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            account_limit: default_account_limit(),
            goal_total_created: default_goal_total_created(),
            round_cap_min: default_round_cap_min(),
            round_cap_max: default_round_cap_max(),
            poll_sleep_min_s: default_poll_sleep_min(),
            poll_sleep_max_s: default_poll_sleep_max(),
            max_rpm: default_max_rpm(),
            mutation_cooldown_min_s: default_mutation_cooldown_min(),
            mutation_cooldown_max_s: default_mutation_cooldown_max(),
            round_pause_min_s: default_round_pause_min(),
            round_pause_max_s: default_round_pause_max(),
            final_pause_min_s: default_final_pause_min(),
            final_pause_max_s: default_final_pause_max(),
            failure_pause_s: default_failure_pause(),
            target_cidrs: Vec::new(),
            target_goal_ips: default_target_goal_ips(),
            target_goal_distinct_subnets: default_target_goal_distinct_subnets(),
            target_pause_s: default_target_pause(),
            stats_file: default_stats_file(),
            strategy_mode: default_strategy_mode(),
            strategy_auto_probability: default_auto_probability(),
            single_goal_created_min: default_single_goal_min(),
            single_goal_created_max: default_single_goal_max(),
            single_round_size: default_single_round_size(),
            single_round_pause_min_s: default_single_round_pause_min(),
            single_round_pause_max_s: default_single_round_pause_max(),
            single_reload_every_s: default_single_reload_every(),
            single_max_reload_attempts: default_single_max_reload_attempts(),
            single_restart_pause_s: default_single_restart_pause(),
            rare_rotation_slots: default_rare_rotation_slots(),
            rare_keep_max: default_rare_keep_max(),
            rare_goal_created_min: default_rare_goal_min(),
            rare_goal_created_max: default_rare_goal_max(),
            rare_subnet_max_count: default_rare_subnet_max_count(),
            rare_subnet_top_n: 0,
            fatal_error_markers: default_fatal_error_markers(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.account_limit == 0 {
            return Err(crate::Error::config("account_limit must be at least 1"));
        }
        if self.goal_total_created == 0 {
            return Err(crate::Error::config("goal_total_created must be at least 1"));
        }
        if self.round_cap_min == 0 || self.round_cap_min > self.round_cap_max {
            return Err(crate::Error::config(format!(
                "round cap range {}..{} is invalid",
                self.round_cap_min, self.round_cap_max
            )));
        }
        if self.max_rpm == 0 {
            return Err(crate::Error::config("max_rpm must be at least 1"));
        }
        if self.mutation_cooldown_min_s > self.mutation_cooldown_max_s {
            return Err(crate::Error::config("mutation cooldown range is inverted"));
        }
        if self.poll_sleep_min_s < 0.0 || self.poll_sleep_min_s > self.poll_sleep_max_s {
            return Err(crate::Error::config("poll sleep range is invalid"));
        }
        if self.round_pause_min_s > self.round_pause_max_s {
            return Err(crate::Error::config("round pause range is inverted"));
        }
        if self.final_pause_min_s > self.final_pause_max_s {
            return Err(crate::Error::config("final pause range is inverted"));
        }
        if self.single_round_pause_min_s > self.single_round_pause_max_s {
            return Err(crate::Error::config("single round pause range is inverted"));
        }
        if !(0.0..=1.0).contains(&self.strategy_auto_probability) {
            return Err(crate::Error::config(format!(
                "strategy_auto_probability {} must be within 0..=1",
                self.strategy_auto_probability
            )));
        }
        if self.single_goal_created_min == 0
            || self.single_goal_created_min > self.single_goal_created_max
        {
            return Err(crate::Error::config("single goal range is invalid"));
        }
        if self.rare_goal_created_min == 0 || self.rare_goal_created_min > self.rare_goal_created_max
        {
            return Err(crate::Error::config("rare goal range is invalid"));
        }
        if self.stats_file.is_empty() {
            return Err(crate::Error::config("stats_file cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_account_limit() -> usize {
    5
}

fn default_goal_total_created() -> usize {
    50
}

fn default_round_cap_min() -> usize {
    2
}

fn default_round_cap_max() -> usize {
    5
}

fn default_poll_sleep_min() -> f64 {
    1.2
}

fn default_poll_sleep_max() -> f64 {
    2.8
}

fn default_max_rpm() -> usize {
    6
}

fn default_mutation_cooldown_min() -> u64 {
    5
}

fn default_mutation_cooldown_max() -> u64 {
    16
}

fn default_round_pause_min() -> u64 {
    20
}

fn default_round_pause_max() -> u64 {
    120
}

fn default_final_pause_min() -> u64 {
    10 * 60
}

fn default_final_pause_max() -> u64 {
    45 * 60
}

fn default_failure_pause() -> u64 {
    30 * 60
}

fn default_target_goal_ips() -> usize {
    2
}

fn default_target_goal_distinct_subnets() -> usize {
    2
}

fn default_target_pause() -> u64 {
    6 * 60 * 60
}

fn default_stats_file() -> String {
    "daily_stats.txt".to_string()
}

fn default_strategy_mode() -> String {
    "auto".to_string()
}

fn default_auto_probability() -> f64 {
    0.4
}

fn default_single_goal_min() -> usize {
    120
}

fn default_single_goal_max() -> usize {
    180
}

fn default_single_round_size() -> usize {
    10
}

fn default_single_round_pause_min() -> u64 {
    30
}

fn default_single_round_pause_max() -> u64 {
    180
}

fn default_single_reload_every() -> u64 {
    5 * 60
}

fn default_single_max_reload_attempts() -> usize {
    3
}

fn default_single_restart_pause() -> u64 {
    15 * 60
}

fn default_rare_rotation_slots() -> usize {
    1
}

fn default_rare_keep_max() -> usize {
    4
}

fn default_rare_goal_min() -> usize {
    60
}

fn default_rare_goal_max() -> usize {
    80
}

fn default_rare_subnet_max_count() -> u64 {
    1
}

fn default_fatal_error_markers() -> Vec<String> {
    [
        "429",
        "too many requests",
        "service unavailable",
        "bad gateway",
        "gateway timeout",
        "internal server error",
        "something went wrong",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
