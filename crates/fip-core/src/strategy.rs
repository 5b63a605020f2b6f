//! Per-cycle strategy selection
//!
//! One strategy is chosen at the top of every cycle. "rare" needs a
//! non-empty rarity bucket; without one the selector degrades to "main"
//! rather than failing the cycle.

use crate::rarity::RarityStore;
use ipnet::Ipv4Net;
use rand::Rng;
use std::fmt;
use tracing::warn;

/// Acquisition strategy driven for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Bulk create-and-release rounds toward a per-cycle creation goal
    Main,
    /// Probe-and-keep churn biased toward rarely seen subnets
    Rare,
    /// One resource at a time, deleted unless it is a target hit
    Single,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Main => write!(f, "main"),
            Strategy::Rare => write!(f, "rare"),
            Strategy::Single => write!(f, "single"),
        }
    }
}

/// Choose the strategy for the next cycle.
///
/// `mode` is the configured strategy_mode string. "auto" draws a uniform
/// number and attempts the rare strategy with probability
/// `auto_probability`; an empty rarity selection silently falls back to
/// main (preserved behavior). Unknown modes degrade to main with a warning.
pub async fn choose_strategy(
    mode: &str,
    auto_probability: f64,
    rarity: &RarityStore,
    rare_top_n: usize,
    rare_max_count: u64,
    rng: &mut (impl Rng + ?Sized),
) -> (Strategy, Vec<Ipv4Net>) {
    match mode {
        "main" => (Strategy::Main, Vec::new()),
        "single" => (Strategy::Single, Vec::new()),
        "rare" => {
            let rare_networks = rarity.select_rare_networks(rare_top_n, rare_max_count).await;
            if rare_networks.is_empty() {
                warn!("rare strategy requested but no rare subnets found; falling back to main");
                (Strategy::Main, Vec::new())
            } else {
                (Strategy::Rare, rare_networks)
            }
        }
        "auto" => {
            if rng.gen_range(0.0..1.0) >= auto_probability {
                return (Strategy::Main, Vec::new());
            }
            let rare_networks = rarity.select_rare_networks(rare_top_n, rare_max_count).await;
            if rare_networks.is_empty() {
                (Strategy::Main, Vec::new())
            } else {
                (Strategy::Rare, rare_networks)
            }
        }
        other => {
            warn!("unknown strategy_mode={other}; treating as main");
            (Strategy::Main, Vec::new())
        }
    }
}
