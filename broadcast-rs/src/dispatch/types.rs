use crate::tiers::{Metric, TierDefinition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Representative errors kept per operation
pub const MAX_RECORDED_ERRORS: usize = 3;

/// What a bulk operation does at each destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Post,
    Schedule,
    Edit,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Post => "post",
            OperationKind::Schedule => "schedule",
            OperationKind::Edit => "edit",
            OperationKind::Delete => "delete",
        }
    }
}

/// Operation lifecycle
///
/// `pending → executing → {completed | failed}`, with `executing →
/// cancelled` as the cooperative path. `failed` marks engine-level aborts;
/// destination-level failures complete normally with a nonzero fail count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Executing => "executing",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

/// An external addressable target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationRef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Running success/failure totals for one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResults {
    pub success_count: u32,
    pub fail_count: u32,
    /// First [`MAX_RECORDED_ERRORS`] errors, as "title: message"
    pub errors: Vec<String>,
}

impl OperationResults {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, destination_title: &str, error: &str) {
        self.fail_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(format!("{}: {}", destination_title, error));
        }
    }

    pub fn total(&self) -> u32 {
        self.success_count + self.fail_count
    }
}

/// Submission request for a bulk operation
#[derive(Debug, Clone, Deserialize)]
pub struct BulkOperationSpec {
    pub owner_id: String,
    pub kind: OperationKind,
    pub destinations: Vec<DestinationRef>,
    pub content: String,
}

/// One user-initiated fan-out job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    pub id: String,
    pub owner_id: String,
    pub kind: OperationKind,
    pub destinations: Vec<DestinationRef>,
    pub content: String,
    pub status: OperationStatus,
    /// Monotonically non-decreasing while executing
    pub progress_percent: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: OperationResults,
}

impl BulkOperation {
    pub fn new(spec: BulkOperationSpec) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: spec.owner_id,
            kind: spec.kind,
            destinations: spec.destinations,
            content: spec.content,
            status: OperationStatus::Pending,
            progress_percent: 0,
            started_at: None,
            completed_at: None,
            results: OperationResults::default(),
        }
    }

    /// `ceil(destinations / batch_size)`
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.destinations.len().div_ceil(batch_size.max(1))
    }
}

/// Per-submission caps derived from the owner's tier
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Maximum destinations per bulk operation; `-1` = unlimited
    pub max_destinations: i64,
    /// In-flight sends per batch; non-positive values fall back to the
    /// batch size
    pub concurrency: i64,
}

impl DispatchLimits {
    pub fn from_tier(tier: &TierDefinition) -> Self {
        Self {
            max_destinations: tier.limit(Metric::BulkDestinations),
            concurrency: tier.limit(Metric::ConcurrentOperations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destinations(n: usize) -> Vec<DestinationRef> {
        (0..n)
            .map(|i| DestinationRef {
                id: format!("d{}", i),
                title: format!("Chan {}", i),
                capabilities: vec![],
            })
            .collect()
    }

    fn op_with(n: usize) -> BulkOperation {
        BulkOperation::new(BulkOperationSpec {
            owner_id: "u1".to_string(),
            kind: OperationKind::Post,
            destinations: destinations(n),
            content: "hi".to_string(),
        })
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(op_with(12).batch_count(5), 3);
        assert_eq!(op_with(10).batch_count(5), 2);
        assert_eq!(op_with(1).batch_count(5), 1);
        assert_eq!(op_with(5).batch_count(5), 1);
        assert_eq!(op_with(6).batch_count(5), 2);
    }

    #[test]
    fn test_new_operation_is_pending() {
        let op = op_with(3);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.progress_percent, 0);
        assert!(op.started_at.is_none());
        assert_eq!(op.results.total(), 0);
    }

    #[test]
    fn test_results_error_truncation() {
        let mut results = OperationResults::default();
        for i in 0..5 {
            results.record_failure(&format!("Chan {}", i), "down");
        }

        assert_eq!(results.fail_count, 5);
        assert_eq!(results.errors.len(), MAX_RECORDED_ERRORS);
        assert_eq!(results.errors[0], "Chan 0: down");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Executing.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
    }
}
