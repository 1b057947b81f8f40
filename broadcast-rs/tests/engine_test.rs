//! End-to-end engine tests
//!
//! Drives the real component stack (catalog, tracker, admission, dispatcher,
//! ledger) over in-memory SQLite and the mock gateway.

use broadcast_rs::admission::{Action, AdmissionController, DenyReason};
use broadcast_rs::config::EngineConfig;
use broadcast_rs::dispatch::{
    BatchDispatcher, BulkOperation, BulkOperationSpec, DestinationRef, DispatchLimits, ManualClock,
    OperationKind, OperationStatus,
};
use broadcast_rs::gateway::MockGateway;
use broadcast_rs::ledger::{OperationLedger, Page};
use broadcast_rs::notify::ProgressNotifier;
use broadcast_rs::quota::{QuotaTracker, WindowKind};
use broadcast_rs::tiers::{Metric, TierCatalog};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

struct Engine {
    catalog: Arc<TierCatalog>,
    quota: Arc<QuotaTracker>,
    admission: AdmissionController,
    dispatcher: BatchDispatcher,
    ledger: Arc<OperationLedger>,
    gateway: MockGateway,
}

async fn engine(gateway: MockGateway, settings: EngineConfig) -> Engine {
    let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let catalog = Arc::new(TierCatalog::default());
    let quota = Arc::new(QuotaTracker::new(db.clone()).await.unwrap());
    let ledger = Arc::new(OperationLedger::new(db).await.unwrap());
    let notifier = Arc::new(ProgressNotifier::new(Arc::new(gateway.clone())));
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let admission = AdmissionController::new(Arc::clone(&catalog), Arc::clone(&quota));
    let dispatcher = BatchDispatcher::new(
        Arc::new(gateway.clone()),
        Arc::clone(&quota),
        Arc::clone(&ledger),
        notifier,
        clock,
        settings,
    );

    Engine {
        catalog,
        quota,
        admission,
        dispatcher,
        ledger,
        gateway,
    }
}

fn fast_settings() -> EngineConfig {
    EngineConfig {
        batch_size: 5,
        inter_batch_delay_ms: 10,
        progress_threshold_percent: 25,
        retention_ms: 3_600_000,
    }
}

fn destinations(n: usize) -> Vec<DestinationRef> {
    (0..n)
        .map(|i| DestinationRef {
            id: format!("d{}", i),
            title: format!("Chan {}", i),
            capabilities: vec!["post".to_string()],
        })
        .collect()
}

async fn wait_terminal(dispatcher: &BatchDispatcher, id: &str) -> BulkOperation {
    timeout(Duration::from_secs(10), async {
        loop {
            if let Some(op) = dispatcher.get_status(id).await {
                if op.status.is_terminal() {
                    return op;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("operation did not reach a terminal state")
}

#[tokio::test]
async fn scenario_free_tier_daily_post_limit() {
    // free tier, posts_per_day limit 3, current usage 3
    let e = engine(MockGateway::new(), fast_settings()).await;

    e.quota
        .consume("user1", Metric::PostsPerDay, WindowKind::Daily, 3)
        .await
        .unwrap();

    let decision = e
        .quota
        .check("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
        .await;
    assert!(!decision.allowed);
    assert_eq!(decision.current, 3);
    assert_eq!(decision.limit, 3);
}

#[tokio::test]
async fn scenario_enterprise_unlimited_metric() {
    // limit -1 allows regardless of accumulated usage
    let e = engine(MockGateway::new(), fast_settings()).await;

    e.quota
        .consume("bigcorp", Metric::PostsPerDay, WindowKind::Daily, 100_000)
        .await
        .unwrap();

    let decision = e
        .quota
        .check("bigcorp", Metric::PostsPerDay, WindowKind::Daily, -1, 1)
        .await;
    assert!(decision.allowed);
    assert!(decision.unlimited);
}

#[tokio::test]
async fn scenario_free_user_denied_bulkpost() {
    let e = engine(MockGateway::new(), fast_settings()).await;

    let result = e
        .admission
        .authorize("user1", Some("free"), Action::BulkPost)
        .await;
    assert!(!result.allowed);
    assert_eq!(result.reason, Some(DenyReason::FeatureNotAvailable));
    assert_eq!(result.upgrade_hint.as_deref(), Some("pro"));
}

#[tokio::test]
async fn scenario_twelve_destinations_batch_split() {
    // 12 destinations, batch size 5, destination #7 failing
    let e = engine(MockGateway::new().fail_destination("d6"), fast_settings()).await;

    let admission = e
        .admission
        .authorize("pro_user", Some("pro"), Action::BulkPost)
        .await;
    assert!(admission.allowed);

    let tier = e.catalog.get("pro");
    let id = e
        .dispatcher
        .submit(
            BulkOperationSpec {
                owner_id: "pro_user".to_string(),
                kind: OperationKind::Post,
                destinations: destinations(12),
                content: "release notes".to_string(),
            },
            DispatchLimits::from_tier(tier),
        )
        .await
        .unwrap();

    let op = wait_terminal(&e.dispatcher, &id).await;
    assert_eq!(op.status, OperationStatus::Completed);
    assert_eq!(op.batch_count(5), 3);
    assert_eq!(op.results.success_count, 11);
    assert_eq!(op.results.fail_count, 1);
    assert_eq!(op.progress_percent, 100);

    // Success + fail always accounts for every destination
    assert_eq!(op.results.total() as usize, op.destinations.len());
}

#[tokio::test]
async fn scenario_cancellation_after_first_batch() {
    let e = engine(
        MockGateway::new(),
        EngineConfig {
            inter_batch_delay_ms: 200,
            ..fast_settings()
        },
    )
    .await;

    let id = e
        .dispatcher
        .submit(
            BulkOperationSpec {
                owner_id: "pro_user".to_string(),
                kind: OperationKind::Post,
                destinations: destinations(15),
                content: "x".to_string(),
            },
            DispatchLimits {
                max_destinations: -1,
                concurrency: 3,
            },
        )
        .await
        .unwrap();

    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(op) = e.dispatcher.get_status(&id).await {
                if op.results.total() >= 5 {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    e.dispatcher.request_cancel(&id, "pro_user").await.unwrap();

    let op = wait_terminal(&e.dispatcher, &id).await;
    assert_eq!(op.status, OperationStatus::Cancelled);
    assert_eq!(op.results.total(), 5);
    assert_eq!(e.gateway.sent_count().await, 5);
}

#[tokio::test]
async fn full_pipeline_records_history() {
    let e = engine(MockGateway::new(), fast_settings()).await;

    let admission = e
        .admission
        .authorize("pro_user", Some("pro"), Action::BulkPost)
        .await;
    assert!(admission.allowed);

    let tier = e.catalog.get("pro");
    let id = e
        .dispatcher
        .submit(
            BulkOperationSpec {
                owner_id: "pro_user".to_string(),
                kind: OperationKind::Post,
                destinations: destinations(7),
                content: "weekly digest".to_string(),
            },
            DispatchLimits::from_tier(tier),
        )
        .await
        .unwrap();

    let op = wait_terminal(&e.dispatcher, &id).await;
    assert_eq!(op.status, OperationStatus::Completed);

    // Quota charged once per successful send
    let decision = e
        .quota
        .check("pro_user", Metric::PostsPerDay, WindowKind::Daily, 50, 1)
        .await;
    assert_eq!(decision.current, 7);

    // History served from the ledger
    let records = e
        .ledger
        .query_by_owner("pro_user", Page::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].status, "completed");
    assert_eq!(records[0].destination_count, 7);
}

#[tokio::test]
async fn pro_tier_destination_cap_enforced_at_submission() {
    let e = engine(MockGateway::new(), fast_settings()).await;

    // pro allows 20 destinations per bulk operation
    let tier = e.catalog.get("pro");
    let result = e
        .dispatcher
        .submit(
            BulkOperationSpec {
                owner_id: "pro_user".to_string(),
                kind: OperationKind::Post,
                destinations: destinations(21),
                content: "x".to_string(),
            },
            DispatchLimits::from_tier(tier),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(e.gateway.sent_count().await, 0);
}
