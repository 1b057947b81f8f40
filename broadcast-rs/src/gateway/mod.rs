//! Messaging gateway abstraction
//!
//! The engine never talks to the external messaging transport directly; it
//! goes through this trait. Per-destination sends are bounded by the
//! gateway's own timeout, and a timeout surfaces as an ordinary send error.

use crate::error::Result;
use tracing::info;

pub mod mock;

pub use mock::MockGateway;

/// External messaging transport
#[async_trait::async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Deliver content to a single destination
    async fn send_to_destination(&self, destination_id: &str, content: &str) -> Result<()>;

    /// Best-effort message to an operation's owner
    async fn notify_owner(&self, owner_id: &str, text: &str) -> Result<()>;
}

/// Transport stand-in that logs every call and always succeeds
///
/// Wired by the binary when no real transport is configured.
pub struct LoggingGateway;

#[async_trait::async_trait]
impl MessagingGateway for LoggingGateway {
    async fn send_to_destination(&self, destination_id: &str, content: &str) -> Result<()> {
        info!("[gateway] -> {}: {} bytes", destination_id, content.len());
        Ok(())
    }

    async fn notify_owner(&self, owner_id: &str, text: &str) -> Result<()> {
        info!("[gateway] notify {}: {}", owner_id, text);
        Ok(())
    }
}
