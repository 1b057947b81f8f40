//! Subscription tier catalog
//!
//! This module provides the immutable tier registry:
//! - Named tiers ordered by level, each bundling price, command access,
//!   numeric limits, and feature flags
//! - Lowest-tier fallback for unknown or unsubscribed subjects
//! - Upgrade-path lookups for denial messages

pub mod catalog;
pub mod types;

pub use catalog::TierCatalog;
pub use types::{CommandAccess, FeatureFlag, Metric, TierDefinition};
