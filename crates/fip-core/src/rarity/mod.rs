//! Durable rarity statistics
//!
//! A dated tally of how often each /24 subnet has been observed, persisted
//! as sectioned tabular text (see [`format`]). The store backs the rare
//! strategy's bias: subnets with low all-time counts are "rare".
//!
//! Storage failures are never allowed to take down the orchestrator: reads
//! fall back to an empty table with a warning, and write failures are
//! logged and swallowed. The file has a single writer (this process).

pub mod format;

use crate::targets::subnet_of;
use chrono::NaiveDate;
use format::{DateSections, aggregate_sections, format_sections, parse_sections};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File-backed store of per-subnet observation counts, partitioned by date
#[derive(Debug, Clone)]
pub struct RarityStore {
    path: PathBuf,
}

impl RarityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one observation of `addr` under the `today` partition.
    ///
    /// Read-modify-write of the whole file; the rewrite is atomic
    /// (temp file + rename). Storage errors are logged, never returned.
    pub async fn record_observation(&self, addr: Ipv4Addr, today: NaiveDate) {
        let subnet = subnet_of(addr).to_string();
        let date_str = today.format("%Y-%m-%d").to_string();

        let mut sections = self.load_sections(&date_str).await;
        let counts = sections.entry(date_str).or_default();
        *counts.entry(subnet).or_insert(0) += 1;

        if let Err(e) = self.write_sections(&sections).await {
            warn!("failed to write statistics {}: {e}", self.path.display());
        }
    }

    /// Subnets considered rare, parsed to networks.
    ///
    /// With `top_n > 0`, the N subnets with the lowest aggregate count
    /// (ties broken by subnet string ascending); otherwise every subnet
    /// whose aggregate count is at most `max_count`. Empty when the file
    /// is absent or holds nothing — callers fall back to the main strategy.
    pub async fn select_rare_networks(&self, top_n: usize, max_count: u64) -> Vec<Ipv4Net> {
        let totals = aggregate_sections(&self.load_sections_today().await);
        if totals.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<String> = if top_n > 0 {
            let mut items: Vec<(String, u64)> = totals.into_iter().collect();
            items.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            items.into_iter().take(top_n).map(|(s, _)| s).collect()
        } else {
            totals
                .into_iter()
                .filter(|&(_, count)| count <= max_count)
                .map(|(s, _)| s)
                .collect()
        };

        let mut networks = Vec::with_capacity(candidates.len());
        for subnet in candidates {
            match subnet.parse::<Ipv4Net>() {
                Ok(net) => networks.push(net),
                Err(e) => warn!("malformed subnet in statistics: {subnet} ({e})"),
            }
        }
        networks
    }

    /// Every subnet ever recorded, as strings
    pub async fn known_subnets(&self) -> HashSet<String> {
        aggregate_sections(&self.load_sections_today().await)
            .into_keys()
            .collect()
    }

    async fn load_sections_today(&self) -> DateSections {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        self.load_sections(&today).await
    }

    /// Load all partitions; unreadable or absent storage yields an empty
    /// table with a warning rather than an error
    async fn load_sections(&self, default_date: &str) -> DateSections {
        match fs::read_to_string(&self.path).await {
            Ok(text) => parse_sections(&text, default_date),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("statistics file {} does not exist yet", self.path.display());
                DateSections::new()
            }
            Err(e) => {
                warn!("failed to read statistics {}: {e}", self.path.display());
                DateSections::new()
            }
        }
    }

    /// Rewrite the whole file atomically (write temp, then rename)
    async fn write_sections(&self, sections: &DateSections) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        fs::write(&temp, format_sections(sections)).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}
