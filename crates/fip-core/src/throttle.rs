//! Mutation rate limiting
//!
//! Every create and delete call goes through one [`MutationThrottle`] owned
//! by the engine. Two independent limits apply: a sliding 60-second window
//! capped at `max_rpm` mutations, and a randomized settle delay before each
//! mutation. The throttle is an explicit component (not process-global
//! state) so tests can drive it on tokio's paused clock.

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Length of the sliding rate-limit window
const WINDOW: Duration = Duration::from_secs(60);

/// Jitter range added when sleeping out a full window, to avoid lockstep
/// retries against the remote service
const JITTER_MIN_S: f64 = 0.2;
const JITTER_MAX_S: f64 = 1.5;

/// Sliding-window rate limiter plus randomized inter-mutation settle delay
pub struct MutationThrottle {
    max_rpm: usize,
    cooldown_min_s: u64,
    cooldown_max_s: u64,
    window: VecDeque<Instant>,
    rng: StdRng,
}

impl MutationThrottle {
    pub fn new(max_rpm: usize, cooldown_min_s: u64, cooldown_max_s: u64) -> Self {
        Self {
            max_rpm,
            cooldown_min_s,
            cooldown_max_s,
            window: VecDeque::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Block until one create-or-delete call is safe, then record it.
    ///
    /// Never fails; all waiting is async sleeping, never spinning.
    pub async fn acquire(&mut self) {
        if self.max_rpm > 0 {
            loop {
                let now = Instant::now();
                while let Some(&oldest) = self.window.front() {
                    if now.duration_since(oldest) >= WINDOW {
                        self.window.pop_front();
                    } else {
                        break;
                    }
                }
                let Some(&oldest) = self.window.front() else { break };
                if self.window.len() < self.max_rpm {
                    break;
                }
                let until_free = (oldest + WINDOW).saturating_duration_since(now);
                let jitter = self.rng.gen_range(JITTER_MIN_S..=JITTER_MAX_S);
                debug!(
                    "mutation window full ({} in 60s); sleeping {:.1}s",
                    self.window.len(),
                    until_free.as_secs_f64() + jitter
                );
                sleep(until_free + Duration::from_secs_f64(jitter)).await;
            }
        }

        if self.cooldown_max_s > 0 {
            let settle = self
                .rng
                .gen_range(self.cooldown_min_s as f64..=self.cooldown_max_s as f64);
            info!("cooldown before mutation: {settle:.1}s");
            sleep(Duration::from_secs_f64(settle)).await;
        }

        self.window.push_back(Instant::now());
    }
}
