//! The batch execution engine
//!
//! One `BatchDispatcher` instance owns the live-operation index: executor
//! tasks are the only writers, status queries only read. Quota counters are
//! the shared state many callers touch concurrently, and those stay atomic
//! at the store layer.

use crate::config::EngineConfig;
use crate::dispatch::clock::Clock;
use crate::dispatch::types::{
    BulkOperation, BulkOperationSpec, DispatchLimits, DestinationRef, OperationStatus,
};
use crate::error::{EngineError, Result};
use crate::gateway::MessagingGateway;
use crate::ledger::OperationLedger;
use crate::notify::ProgressNotifier;
use crate::quota::{QuotaTracker, WindowKind};
use crate::tiers::Metric;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one send: destination id on success, title and error on
/// failure. Never an exception; a failed send is data, not control flow.
type SendOutcome = std::result::Result<String, (String, String)>;

struct LiveOperation {
    op: BulkOperation,
    cancel: CancellationToken,
    /// Set at the terminal transition; eviction time in the live index
    expires_at: Option<DateTime<Utc>>,
}

/// Bounded-concurrency executor for bulk operations
#[derive(Clone)]
pub struct BatchDispatcher {
    gateway: Arc<dyn MessagingGateway>,
    quota: Arc<QuotaTracker>,
    ledger: Arc<OperationLedger>,
    notifier: Arc<ProgressNotifier>,
    clock: Arc<dyn Clock>,
    settings: EngineConfig,
    live: Arc<RwLock<HashMap<String, LiveOperation>>>,
}

impl BatchDispatcher {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        quota: Arc<QuotaTracker>,
        ledger: Arc<OperationLedger>,
        notifier: Arc<ProgressNotifier>,
        clock: Arc<dyn Clock>,
        settings: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            quota,
            ledger,
            notifier,
            clock,
            settings,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submit a bulk operation for execution
    ///
    /// The tier's destination cap is enforced here, once, not during
    /// execution. Returns the operation id; the operation itself runs in a
    /// background task.
    pub async fn submit(&self, spec: BulkOperationSpec, limits: DispatchLimits) -> Result<String> {
        if spec.destinations.is_empty() {
            return Err(EngineError::Engine(
                "bulk operation needs at least one destination".to_string(),
            ));
        }

        if limits.max_destinations >= 0 && spec.destinations.len() as i64 > limits.max_destinations
        {
            return Err(EngineError::DestinationLimit {
                count: spec.destinations.len(),
                limit: limits.max_destinations,
            });
        }

        let op = BulkOperation::new(spec);
        let id = op.id.clone();
        let cancel = CancellationToken::new();

        info!(
            "Submitting bulk {} {} for {}: {} destinations",
            op.kind.as_str(),
            id,
            op.owner_id,
            op.destinations.len()
        );

        self.live.write().await.insert(
            id.clone(),
            LiveOperation {
                op,
                cancel: cancel.clone(),
                expires_at: None,
            },
        );

        let dispatcher = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            dispatcher.run(&task_id, limits, cancel).await;
        });

        Ok(id)
    }

    /// Snapshot of an operation still in the live index
    pub async fn get_status(&self, id: &str) -> Option<BulkOperation> {
        self.live.read().await.get(id).map(|entry| entry.op.clone())
    }

    /// Request cooperative cancellation
    ///
    /// Only the owner may cancel. The in-flight batch settles; no further
    /// batch starts. Cancelling a terminal operation is a no-op.
    pub async fn request_cancel(&self, id: &str, requester: &str) -> Result<()> {
        let live = self.live.read().await;
        let entry = live
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if entry.op.owner_id != requester {
            return Err(EngineError::Unauthorized(format!(
                "operation {} belongs to another owner",
                id
            )));
        }

        if !entry.op.status.is_terminal() {
            info!("Cancellation requested for operation {}", id);
            entry.cancel.cancel();
        }

        Ok(())
    }

    /// Drop terminal operations whose retention window has passed
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut live = self.live.write().await;
        let before = live.len();

        live.retain(|_, entry| match entry.expires_at {
            Some(expires_at) => !entry.op.status.is_terminal() || expires_at > now,
            None => true,
        });

        before - live.len()
    }

    /// Periodic housekeeping: live-index eviction and stale usage windows
    pub async fn start_janitor(self) {
        info!("Starting dispatcher janitor");

        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;

            let evicted = self.evict_expired().await;
            if evicted > 0 {
                debug!("Evicted {} terminal operations from live index", evicted);
            }

            let cutoff = self.clock.now() - chrono::Duration::days(62);
            if let Err(e) = self.quota.purge_before(cutoff).await {
                warn!("Usage window purge failed: {}", e);
            }
        }
    }

    /// Executor entry point; owns all terminal transitions
    async fn run(&self, id: &str, limits: DispatchLimits, cancel: CancellationToken) {
        if let Err(e) = self.execute(id, limits, cancel).await {
            // Engine-level abort: freeze partial results and record them
            error!("Operation {} aborted: {}", id, e);
            self.finalize(id, OperationStatus::Failed, Some(e.to_string()))
                .await;
        }
    }

    async fn execute(
        &self,
        id: &str,
        limits: DispatchLimits,
        cancel: CancellationToken,
    ) -> Result<()> {
        let (owner_id, content, destinations) = {
            let mut live = self.live.write().await;
            let entry = live
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            entry.op.status = OperationStatus::Executing;
            entry.op.started_at = Some(self.clock.now());
            (
                entry.op.owner_id.clone(),
                entry.op.content.clone(),
                entry.op.destinations.clone(),
            )
        };

        let batch_size = self.settings.batch_size.max(1);
        let total_batches = destinations.len().div_ceil(batch_size);
        let concurrency = if limits.concurrency > 0 {
            limits.concurrency as usize
        } else {
            batch_size
        };
        let delay = Duration::from_millis(self.settings.inter_batch_delay_ms);
        let threshold = self.settings.progress_threshold_percent.max(1);
        let mut last_notified: u8 = 0;

        debug!(
            "Operation {}: {} destinations in {} batches (concurrency {})",
            id,
            destinations.len(),
            total_batches,
            concurrency
        );

        for (index, batch) in destinations.chunks(batch_size).enumerate() {
            // Cancellation is polled only here, at the batch boundary
            if cancel.is_cancelled() {
                info!(
                    "Operation {} cancelled before batch {}/{}",
                    id,
                    index + 1,
                    total_batches
                );
                self.finalize(id, OperationStatus::Cancelled, None).await;
                return Ok(());
            }

            let outcomes = self.dispatch_batch(batch, &content, concurrency).await;
            let successes = outcomes.iter().filter(|o| o.is_ok()).count() as i64;

            let progress = (((index + 1) as f64 / total_batches as f64) * 100.0).round() as u8;
            let snapshot = {
                let mut live = self.live.write().await;
                let entry = live
                    .get_mut(id)
                    .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
                for outcome in &outcomes {
                    match outcome {
                        Ok(_) => entry.op.results.record_success(),
                        Err((title, message)) => entry.op.results.record_failure(title, message),
                    }
                }
                entry.op.progress_percent = progress.max(entry.op.progress_percent);
                entry.op.results.clone()
            };

            // Quota is charged only for sends that actually happened
            if successes > 0 {
                if let Err(e) = self
                    .quota
                    .consume(&owner_id, Metric::PostsPerDay, WindowKind::Daily, successes)
                    .await
                {
                    warn!("Quota bookkeeping failed for {}: {}", owner_id, e);
                }
            }

            let final_batch = index + 1 == total_batches;
            if final_batch || progress >= last_notified.saturating_add(threshold) {
                last_notified = progress;
                self.notifier.notify(
                    &owner_id,
                    &format!(
                        "Bulk operation {}% complete ({} sent, {} failed)",
                        progress, snapshot.success_count, snapshot.fail_count
                    ),
                );
            }

            if !final_batch {
                tokio::time::sleep(delay).await;
            }
        }

        self.finalize(id, OperationStatus::Completed, None).await;
        Ok(())
    }

    /// Dispatch one batch concurrently and join on all of it settling
    ///
    /// One destination's failure never aborts sibling sends: each outcome is
    /// captured as a value.
    async fn dispatch_batch(
        &self,
        batch: &[DestinationRef],
        content: &str,
        concurrency: usize,
    ) -> Vec<SendOutcome> {
        futures::stream::iter(batch.iter().cloned())
            .map(|destination| {
                let gateway = Arc::clone(&self.gateway);
                let content = content.to_string();
                async move {
                    match gateway.send_to_destination(&destination.id, &content).await {
                        Ok(()) => Ok(destination.id),
                        Err(e) => {
                            warn!("Send to {} failed: {}", destination.title, e);
                            Err((destination.title, e.to_string()))
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Apply a terminal transition: freeze results, stamp times, schedule
    /// eviction, append the ledger record, and tell the owner
    async fn finalize(&self, id: &str, status: OperationStatus, engine_error: Option<String>) {
        let snapshot = {
            let mut live = self.live.write().await;
            let Some(entry) = live.get_mut(id) else {
                return;
            };
            entry.op.status = status;
            entry.op.completed_at = Some(self.clock.now());
            if status == OperationStatus::Completed {
                entry.op.progress_percent = 100;
            }
            entry.expires_at = Some(
                self.clock.now() + chrono::Duration::milliseconds(self.settings.retention_ms as i64),
            );
            entry.op.clone()
        };

        if let Err(e) = self.ledger.record(&snapshot).await {
            error!("Failed to record operation {} in ledger: {}", id, e);
        }

        let summary = match status {
            OperationStatus::Completed => format!(
                "Bulk {} finished: {} sent, {} failed",
                snapshot.kind.as_str(),
                snapshot.results.success_count,
                snapshot.results.fail_count
            ),
            OperationStatus::Cancelled => format!(
                "Bulk {} cancelled: {} sent, {} failed before stopping",
                snapshot.kind.as_str(),
                snapshot.results.success_count,
                snapshot.results.fail_count
            ),
            _ => format!(
                "Bulk {} aborted: {} ({} sent, {} failed)",
                snapshot.kind.as_str(),
                engine_error.unwrap_or_else(|| "internal error".to_string()),
                snapshot.results.success_count,
                snapshot.results.fail_count
            ),
        };
        self.notifier.notify(&snapshot.owner_id, &summary);

        info!(
            "Operation {} is {}: {}/{} destinations succeeded",
            id,
            status.as_str(),
            snapshot.results.success_count,
            snapshot.destinations.len()
        );
    }
}
