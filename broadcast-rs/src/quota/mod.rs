//! Usage metering and quota enforcement
//!
//! This module answers "is one more unit of a metric allowed for a subject"
//! and records consumption:
//! - Windowed counters (daily / monthly) with atomic store-level increments
//! - Active-count checks for limits on currently live entities
//! - Fail-open on store errors (availability over strict enforcement)
//!
//! Limits are advisory: read-then-decide races under heavy concurrent load
//! may briefly overrun a soft limit.

pub mod tracker;
pub mod types;

pub use tracker::QuotaTracker;
pub use types::{QuotaDecision, WindowKind};
