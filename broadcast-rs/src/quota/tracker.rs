//! Windowed usage tracking backed by the persistent store
//!
//! Counters live in a `usage_windows` table keyed by subject, metric, and
//! window start. Increments are a single atomic upsert at the store layer;
//! there is no application-level locking. Old windows expire implicitly:
//! a new window start is a new row, and stale rows are purged by the
//! janitor.

use crate::error::Result;
use crate::quota::types::{QuotaDecision, WindowKind};
use crate::tiers::Metric;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use tracing::{debug, warn};

/// Usage metering for tier limits
pub struct QuotaTracker {
    db: SqlitePool,
}

impl QuotaTracker {
    /// Create the tracker, preparing its table
    pub async fn new(db: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_windows (
                subject_id TEXT NOT NULL,
                metric TEXT NOT NULL,
                window_kind TEXT NOT NULL,
                window_start TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (subject_id, metric, window_kind, window_start)
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }

    /// Current count in the window containing now
    async fn current_count(
        &self,
        subject_id: &str,
        metric: Metric,
        kind: WindowKind,
    ) -> Result<i64> {
        let window_start = kind.window_start(Utc::now()).to_rfc3339();

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT count FROM usage_windows
            WHERE subject_id = ? AND metric = ? AND window_kind = ? AND window_start = ?
            "#,
        )
        .bind(subject_id)
        .bind(metric.as_str())
        .bind(kind.as_str())
        .bind(&window_start)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.0).unwrap_or(0))
    }

    /// Check whether `amount` more units fit under `limit`
    ///
    /// `-1` limits short-circuit to allowed without touching the store. A
    /// store error fails open: the action is allowed and a warning logged.
    pub async fn check(
        &self,
        subject_id: &str,
        metric: Metric,
        kind: WindowKind,
        limit: i64,
        amount: i64,
    ) -> QuotaDecision {
        if limit == -1 {
            return QuotaDecision::unlimited();
        }

        match self.current_count(subject_id, metric, kind).await {
            Ok(current) => {
                if current + amount <= limit {
                    QuotaDecision::within(current, limit)
                } else {
                    debug!(
                        "Quota denied for {}: {} at {}/{}",
                        subject_id,
                        metric.as_str(),
                        current,
                        limit
                    );
                    QuotaDecision::exceeded(current, limit, metric.as_str())
                }
            }
            Err(e) => {
                warn!(
                    "Quota read failed for {} ({}), failing open: {}",
                    subject_id,
                    metric.as_str(),
                    e
                );
                QuotaDecision::within(0, limit)
            }
        }
    }

    /// Record consumption; returns the new windowed count
    ///
    /// The increment is a single upsert, atomic at the store layer.
    pub async fn consume(
        &self,
        subject_id: &str,
        metric: Metric,
        kind: WindowKind,
        amount: i64,
    ) -> Result<i64> {
        let window_start = kind.window_start(Utc::now()).to_rfc3339();

        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO usage_windows (subject_id, metric, window_kind, window_start, count)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (subject_id, metric, window_kind, window_start)
            DO UPDATE SET count = count + excluded.count
            RETURNING count
            "#,
        )
        .bind(subject_id)
        .bind(metric.as_str())
        .bind(kind.as_str())
        .bind(&window_start)
        .bind(amount)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Check and, when allowed, consume immediately
    ///
    /// For per-action counters whose success is implicit in being called
    /// (e.g. daily post count). Actions charged only after they succeed use
    /// [`check`](Self::check) followed by [`consume`](Self::consume).
    pub async fn check_and_consume(
        &self,
        subject_id: &str,
        metric: Metric,
        kind: WindowKind,
        limit: i64,
        amount: i64,
    ) -> QuotaDecision {
        let decision = self.check(subject_id, metric, kind, limit, amount).await;

        if decision.allowed && !decision.unlimited {
            if let Err(e) = self.consume(subject_id, metric, kind, amount).await {
                warn!(
                    "Quota increment failed for {} ({}), failing open: {}",
                    subject_id,
                    metric.as_str(),
                    e
                );
            }
        }

        decision
    }

    /// Gate a limit on currently active entities (pending scheduled items,
    /// connected destinations) by counting live rows instead of a window
    /// counter. The live count comes from a caller-supplied query.
    pub async fn check_active_count<F, Fut>(
        &self,
        subject_id: &str,
        metric: Metric,
        live_query: F,
        limit: i64,
    ) -> QuotaDecision
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64>>,
    {
        if limit == -1 {
            return QuotaDecision::unlimited();
        }

        match live_query().await {
            Ok(active) => {
                if active < limit {
                    QuotaDecision::within(active, limit)
                } else {
                    QuotaDecision::exceeded(active, limit, metric.as_str())
                }
            }
            Err(e) => {
                warn!(
                    "Active count failed for {} ({}), failing open: {}",
                    subject_id,
                    metric.as_str(),
                    e
                );
                QuotaDecision::within(0, limit)
            }
        }
    }

    /// Delete windows that started before `cutoff`
    ///
    /// Expired windows stop counting as soon as the window rolls over; this
    /// is housekeeping only.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM usage_windows WHERE window_start < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker() -> QuotaTracker {
        let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
        QuotaTracker::new(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_check_under_limit() {
        let tracker = tracker().await;

        let decision = tracker
            .check("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.current, 0);
        assert_eq!(decision.limit, 3);
    }

    #[tokio::test]
    async fn test_check_at_limit_denied() {
        let tracker = tracker().await;

        for _ in 0..3 {
            tracker
                .consume("user1", Metric::PostsPerDay, WindowKind::Daily, 1)
                .await
                .unwrap();
        }

        let decision = tracker
            .check("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.current, 3);
        assert_eq!(decision.limit, 3);
    }

    #[tokio::test]
    async fn test_unlimited_never_reads() {
        let tracker = tracker().await;

        for _ in 0..100 {
            tracker
                .consume("user1", Metric::PostsPerDay, WindowKind::Daily, 1)
                .await
                .unwrap();
        }

        let decision = tracker
            .check("user1", Metric::PostsPerDay, WindowKind::Daily, -1, 1)
            .await;
        assert!(decision.allowed);
        assert!(decision.unlimited);
    }

    #[tokio::test]
    async fn test_consume_returns_new_count() {
        let tracker = tracker().await;

        let count = tracker
            .consume("user1", Metric::EditsPerDay, WindowKind::Daily, 1)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let count = tracker
            .consume("user1", Metric::EditsPerDay, WindowKind::Daily, 4)
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_counters_isolated_by_subject_and_metric() {
        let tracker = tracker().await;

        tracker
            .consume("user1", Metric::PostsPerDay, WindowKind::Daily, 2)
            .await
            .unwrap();

        let other_user = tracker
            .check("user2", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert_eq!(other_user.current, 0);

        let other_metric = tracker
            .check("user1", Metric::EditsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert_eq!(other_metric.current, 0);
    }

    #[tokio::test]
    async fn test_check_and_consume_increments_immediately() {
        let tracker = tracker().await;

        for expected in 1..=3 {
            let decision = tracker
                .check_and_consume("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
                .await;
            assert!(decision.allowed, "attempt {} should pass", expected);
        }

        // Scenario: limit 3, current 3
        let decision = tracker
            .check_and_consume("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.current, 3);
        assert_eq!(decision.limit, 3);

        // A denied attempt must not consume
        let count = tracker
            .current_count("user1", Metric::PostsPerDay, WindowKind::Daily)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_check_fails_open_on_store_error() {
        let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let tracker = QuotaTracker::new(db.clone()).await.unwrap();
        db.close().await;

        let decision = tracker
            .check("user1", Metric::PostsPerDay, WindowKind::Daily, 3, 1)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_check_active_count() {
        let tracker = tracker().await;

        let decision = tracker
            .check_active_count("user1", Metric::ScheduledPosts, || async { Ok(2) }, 5)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.current, 2);

        let decision = tracker
            .check_active_count("user1", Metric::ScheduledPosts, || async { Ok(5) }, 5)
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_check_active_count_fails_open() {
        let tracker = tracker().await;

        let decision = tracker
            .check_active_count(
                "user1",
                Metric::ScheduledPosts,
                || async { Err(crate::error::EngineError::Engine("boom".to_string())) },
                5,
            )
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_purge_before() {
        let tracker = tracker().await;

        tracker
            .consume("user1", Metric::PostsPerDay, WindowKind::Daily, 1)
            .await
            .unwrap();

        // Today's window starts after yesterday's cutoff
        let purged = tracker
            .purge_before(Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 0);

        let purged = tracker
            .purge_before(Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
    }
}
