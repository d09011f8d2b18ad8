//! Turso Embedded / libSQL storage layer for regeneration run history.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one
//! [`RunStats`] row per regeneration run.
//!
//! **Access rules:**
//! - The server (scheduler) is the sole writer via [`Storage::open`]
//! - `sitemapgen stats` reads via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use sitemapgen_shared::{Result, RunStats, RunTrigger, SitemapError};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

const RUN_COLUMNS: &str = "run_id, run_trigger, started_at, total_pages, previous_total_pages,
     duration_ms, failed, error_message, partition_counts_json, failed_partitions_json";

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SitemapError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SitemapError::Storage(format!(
                "no run history at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SitemapError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SitemapError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Append a finished run.
    pub async fn insert_run_stats(&self, stats: &RunStats) -> Result<()> {
        self.check_writable()?;

        let counts = serde_json::to_string(&stats.per_partition_counts)
            .map_err(|e| SitemapError::Storage(e.to_string()))?;
        let failed_partitions = serde_json::to_string(&stats.failed_partitions)
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO run_stats (run_id, run_trigger, started_at, total_pages,
                   previous_total_pages, duration_ms, failed, error_message,
                   partition_counts_json, failed_partitions_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    stats.run_id.to_string(),
                    stats.trigger.as_str(),
                    stats.timestamp.to_rfc3339(),
                    stats.total_pages as i64,
                    stats.previous_total_pages.map(|n| n as i64),
                    stats.duration_ms as i64,
                    i64::from(stats.failed),
                    stats.error_message.as_deref(),
                    counts,
                    failed_partitions,
                ],
            )
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        tracing::debug!(run_id = %stats.run_id, failed = stats.failed, "recorded run");
        Ok(())
    }

    /// The most recently recorded run, successful or not.
    pub async fn latest_run_stats(&self) -> Result<Option<RunStats>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM run_stats ORDER BY seq DESC LIMIT 1");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run_stats(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(SitemapError::Storage(e.to_string())),
        }
    }

    /// Page total of the most recent successful run.
    pub async fn latest_successful_total(&self) -> Result<Option<usize>> {
        let mut rows = self
            .conn
            .query(
                "SELECT total_pages FROM run_stats WHERE failed = 0 ORDER BY seq DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let total: i64 = row
                    .get(0)
                    .map_err(|e| SitemapError::Storage(e.to_string()))?;
                Ok(Some(total.max(0) as usize))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SitemapError::Storage(e.to_string())),
        }
    }

    /// The last `limit` runs, newest first.
    pub async fn list_run_stats(&self, limit: u32) -> Result<Vec<RunStats>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM run_stats ORDER BY seq DESC LIMIT ?1");
        let mut rows = self
            .conn
            .query(&sql, params![limit])
            .await
            .map_err(|e| SitemapError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run_stats(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`RunStats`].
fn row_to_run_stats(row: &libsql::Row) -> Result<RunStats> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| SitemapError::Storage(e.to_string()))
    };
    let int = |idx: i32| -> Result<i64> {
        row.get::<i64>(idx)
            .map_err(|e| SitemapError::Storage(e.to_string()))
    };

    let run_id = text(0)?
        .parse()
        .map_err(|e| SitemapError::Storage(format!("invalid run id: {e}")))?;
    let trigger: RunTrigger = text(1)?.parse().map_err(SitemapError::Storage)?;
    let timestamp = DateTime::parse_from_rfc3339(&text(2)?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SitemapError::Storage(format!("invalid date: {e}")))?;
    let per_partition_counts: BTreeMap<String, usize> = serde_json::from_str(&text(8)?)
        .map_err(|e| SitemapError::Storage(e.to_string()))?;
    let failed_partitions: Vec<String> = serde_json::from_str(&text(9)?)
        .map_err(|e| SitemapError::Storage(e.to_string()))?;

    Ok(RunStats {
        run_id,
        trigger,
        timestamp,
        per_partition_counts,
        total_pages: int(3)?.max(0) as usize,
        previous_total_pages: row.get::<i64>(4).ok().map(|v| v.max(0) as usize),
        duration_ms: int(5)?.max(0) as u64,
        failed: int(6)? != 0,
        error_message: row.get::<String>(7).ok(),
        failed_partitions,
    })
}
