//! broadcast-rs: Tier-gated broadcast automation engine
//!
//! A multi-tenant automation service core: subjects grouped into subscription
//! tiers trigger actions (posting, scheduling, editing) that fan out to many
//! external destinations.
//!
//! # Features
//!
//! - **Admission Control**: single decision point combining command,
//!   feature-flag, and quota checks per tier
//! - **Quota Tracking**: windowed usage metering with atomic store-level
//!   increments and advisory (soft) limits
//! - **Batch Dispatch**: bounded-concurrency fan-out with partial-failure
//!   tolerance, progress reporting, and cooperative cancellation
//! - **Operation Ledger**: durable, append-only history of terminal outcomes
//!
//! # Example
//!
//! ```no_run
//! use broadcast_rs::config::Config;
//! use broadcast_rs::tiers::TierCatalog;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let catalog = Arc::new(TierCatalog::default());
//!
//!     let tier = catalog.get("pro");
//!     println!("pro tier costs {} cents", tier.price_cents);
//!     println!("batch size: {}", config.engine.batch_size);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`tiers`]: Immutable subscription tier catalog
//! - [`quota`]: Windowed and active-count usage metering
//! - [`admission`]: Tier-gated admission control
//! - [`gateway`]: Messaging gateway abstraction
//! - [`notify`]: Best-effort owner notifications
//! - [`ledger`]: Append-only operation history
//! - [`dispatch`]: Batched bulk-operation execution engine
//! - [`api`]: Inbound HTTP surface

pub mod admission;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod quota;
pub mod tiers;

// Re-export commonly used types
pub use config::Config;
pub use error::{EngineError, Result};
