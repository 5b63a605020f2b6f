//! Fatal-error classification
//!
//! The remote service signals hard failures (rate limiting, gateway errors)
//! only through page or response text, so classification is a best-effort
//! substring scan. The classifier is a trait so the marker list can be
//! replaced without touching the engine's control flow.

use tracing::error;

/// Decides whether observed failure text means the whole run must abort
pub trait FailureClassifier: Send + Sync {
    /// True if `text` carries a fatal failure signal
    fn is_fatal(&self, text: &str) -> bool;
}

/// Case-insensitive substring scan against a configured marker list
pub struct MarkerClassifier {
    markers: Vec<String>,
}

impl MarkerClassifier {
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

impl FailureClassifier for MarkerClassifier {
    fn is_fatal(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        for marker in &self.markers {
            if lowered.contains(marker.as_str()) {
                error!("fatal error marker detected: {marker}");
                return true;
            }
        }
        false
    }
}
