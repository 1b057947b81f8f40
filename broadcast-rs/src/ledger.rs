//! Append-only history of bulk operations
//!
//! One row per operation, written exactly once at the terminal transition.
//! Live progress is never written here; it is served from the dispatcher's
//! in-memory index while the operation executes. After the live index evicts
//! a terminal operation, this table is the only record of it.

use crate::dispatch::types::BulkOperation;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

/// One terminal-state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub status: String,
    pub destination_count: i64,
    pub success_count: i64,
    pub fail_count: i64,
    /// Up to the first 3 per-destination errors
    pub errors: Vec<String>,
    pub progress_percent: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

/// Pagination for history queries
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Page {
    fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 200),
            offset: self.offset.max(0),
        }
    }
}

/// Durable operation history
pub struct OperationLedger {
    db: SqlitePool,
}

impl OperationLedger {
    /// Create the ledger, preparing its table
    pub async fn new(db: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operation_ledger (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                destination_count INTEGER NOT NULL,
                success_count INTEGER NOT NULL,
                fail_count INTEGER NOT NULL,
                errors TEXT NOT NULL,
                progress_percent INTEGER NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ledger_owner ON operation_ledger (owner_id, recorded_at)",
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }

    /// Append one terminal snapshot
    pub async fn record(&self, op: &BulkOperation) -> Result<()> {
        info!(
            "Recording operation {} ({}) for {}: {} ok, {} failed",
            op.id,
            op.status.as_str(),
            op.owner_id,
            op.results.success_count,
            op.results.fail_count
        );

        sqlx::query(
            r#"
            INSERT INTO operation_ledger (
                id, owner_id, kind, status, destination_count,
                success_count, fail_count, errors, progress_percent,
                started_at, completed_at, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&op.id)
        .bind(&op.owner_id)
        .bind(op.kind.as_str())
        .bind(op.status.as_str())
        .bind(op.destinations.len() as i64)
        .bind(op.results.success_count as i64)
        .bind(op.results.fail_count as i64)
        .bind(serde_json::to_string(&op.results.errors)?)
        .bind(op.progress_percent as i64)
        .bind(op.started_at.map(|t| t.to_rfc3339()))
        .bind(op.completed_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Operation history for one owner, newest first
    pub async fn query_by_owner(&self, owner_id: &str, page: Page) -> Result<Vec<LedgerRecord>> {
        let page = page.clamped();

        let rows: Vec<(
            String,
            String,
            String,
            String,
            i64,
            i64,
            i64,
            String,
            i64,
            Option<String>,
            Option<String>,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, owner_id, kind, status, destination_count,
                   success_count, fail_count, errors, progress_percent,
                   started_at, completed_at, recorded_at
            FROM operation_ledger
            WHERE owner_id = ?
            ORDER BY recorded_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(owner_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(
                |(
                    id,
                    owner_id,
                    kind,
                    status,
                    destination_count,
                    success_count,
                    fail_count,
                    errors,
                    progress_percent,
                    started_at,
                    completed_at,
                    recorded_at,
                )| {
                    Ok(LedgerRecord {
                        id,
                        owner_id,
                        kind,
                        status,
                        destination_count,
                        success_count,
                        fail_count,
                        errors: serde_json::from_str(&errors)?,
                        progress_percent,
                        started_at: parse_timestamp_opt(started_at)?,
                        completed_at: parse_timestamp_opt(completed_at)?,
                        recorded_at: parse_timestamp(&recorded_at)?,
                    })
                },
            )
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| crate::error::EngineError::Engine(format!("bad ledger timestamp: {}", e)))
}

fn parse_timestamp_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(&s)).transpose()
}
