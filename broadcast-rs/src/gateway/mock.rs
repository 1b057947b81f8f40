//! Mock messaging gateway for testing
//!
//! Records every send and notification, fails scripted destinations, and
//! can slow sends down to widen race windows in concurrency tests.

use super::MessagingGateway;
use crate::error::{EngineError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Recording gateway with scripted failures
#[derive(Clone, Default)]
pub struct MockGateway {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    notifications: Arc<Mutex<Vec<(String, String)>>>,
    failing_destinations: HashSet<String>,
    fail_notifications: bool,
    send_delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a destination to refuse every send
    pub fn fail_destination(mut self, destination_id: &str) -> Self {
        self.failing_destinations.insert(destination_id.to_string());
        self
    }

    /// Script owner notifications to fail
    pub fn fail_notifications(mut self) -> Self {
        self.fail_notifications = true;
        self
    }

    /// Add latency to every send
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Destination ids of every recorded send, in completion order
    pub async fn sent_destinations(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(d, _)| d.clone()).collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl MessagingGateway for MockGateway {
    async fn send_to_destination(&self, destination_id: &str, content: &str) -> Result<()> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_destinations.contains(destination_id) {
            debug!("Mock gateway refusing send to {}", destination_id);
            return Err(EngineError::Gateway(format!(
                "delivery refused by {}",
                destination_id
            )));
        }

        self.sent
            .lock()
            .await
            .push((destination_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn notify_owner(&self, owner_id: &str, text: &str) -> Result<()> {
        if self.fail_notifications {
            return Err(EngineError::Gateway("notification channel down".to_string()));
        }

        self.notifications
            .lock()
            .await
            .push((owner_id.to_string(), text.to_string()));
        Ok(())
    }
}
