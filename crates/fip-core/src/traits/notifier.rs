// # Notifier Trait
//
// Outbound status messages: cycle starts, pauses, target hits and
// end-of-cycle statistics. Notification is strictly fire-and-forget —
// implementations log their own transport failures and never surface them,
// so a broken notifier can never affect orchestrator control flow.

use async_trait::async_trait;

/// Trait for notification collaborators
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a plain-text message
    async fn send_text(&self, text: &str);

    /// Deliver a preformatted table; implementations choose the fixed-width
    /// rendering appropriate for their transport
    async fn send_table(&self, table: &str);
}

/// Notifier that discards every message
///
/// Useful for tests and for running without a notification channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_text(&self, _text: &str) {}

    async fn send_table(&self, _table: &str) {}
}
