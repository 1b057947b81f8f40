//! Tier-gated admission control
//!
//! The single decision point in front of every gated action. Combines:
//! - Command allowlisting (explicit set or wildcard per tier)
//! - Feature-flag gating with upgrade hints
//! - Quota delegation to the usage tracker
//!
//! Denials are structured results, never errors, so calling layers render
//! consistent upgrade prompts.

pub mod controller;
pub mod types;

pub use controller::AdmissionController;
pub use types::{Action, AuthorizationResult, DenyReason};
