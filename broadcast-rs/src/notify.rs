//! Best-effort owner notifications
//!
//! Notifications run in detached background tasks with their own error
//! boundary: a failed notification is logged and swallowed, and the critical
//! path never awaits delivery. The dispatcher bounds notification volume by
//! only emitting at progress-threshold crossings and terminal transitions.

use crate::gateway::MessagingGateway;
use std::sync::Arc;
use tracing::warn;

/// Fire-and-forget notifier over the messaging gateway
pub struct ProgressNotifier {
    gateway: Arc<dyn MessagingGateway>,
}

impl ProgressNotifier {
    pub fn new(gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { gateway }
    }

    /// Send `text` to an owner without blocking the caller
    ///
    /// A delivery failure must never affect the underlying operation's
    /// outcome, and the send is not retried.
    pub fn notify(&self, owner_id: &str, text: &str) {
        let gateway = Arc::clone(&self.gateway);
        let owner_id = owner_id.to_string();
        let text = text.to_string();

        tokio::spawn(async move {
            if let Err(e) = gateway.notify_owner(&owner_id, &text).await {
                warn!("Notification to {} failed: {}", owner_id, e);
            }
        });
    }
}
