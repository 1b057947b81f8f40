use crate::quota::{QuotaDecision, WindowKind};
use crate::tiers::{FeatureFlag, Metric};
use serde::{Deserialize, Serialize};

/// A gated user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Post,
    Edit,
    Delete,
    Schedule,
    BulkPost,
}

impl Action {
    /// The command name a tier allowlist is matched against
    pub fn command(&self) -> &'static str {
        match self {
            Action::Post => "post",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Schedule => "schedule",
            Action::BulkPost => "bulkpost",
        }
    }

    /// Feature required when the command is not explicitly allowlisted
    pub fn required_feature(&self) -> Option<FeatureFlag> {
        match self {
            Action::Post | Action::Delete => None,
            Action::Edit => Some(FeatureFlag::PostEditing),
            Action::Schedule => Some(FeatureFlag::Scheduling),
            Action::BulkPost => Some(FeatureFlag::BulkPosting),
        }
    }

    /// Windowed quota charged per invocation, if any
    ///
    /// These counters increment at check time; bulk sends are metered per
    /// successful delivery by the dispatcher instead.
    pub fn quota_metric(&self) -> Option<(Metric, WindowKind)> {
        match self {
            Action::Post => Some((Metric::PostsPerDay, WindowKind::Daily)),
            Action::Edit => Some((Metric::EditsPerDay, WindowKind::Daily)),
            Action::Delete | Action::Schedule | Action::BulkPost => None,
        }
    }
}

/// Why an action was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    FeatureNotAvailable,
    QuotaExceeded,
}

/// The admission verdict for one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    pub message: Option<String>,
    /// Name of the lowest tier that would resolve the denial
    pub upgrade_hint: Option<String>,
}

impl AuthorizationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            upgrade_hint: None,
        }
    }

    pub fn feature_denied(message: String, upgrade_hint: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(DenyReason::FeatureNotAvailable),
            message: Some(message),
            upgrade_hint,
        }
    }

    pub fn quota_denied(decision: &QuotaDecision, upgrade_hint: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(DenyReason::QuotaExceeded),
            message: decision.message.clone(),
            upgrade_hint,
        }
    }
}
