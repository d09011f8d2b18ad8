//! SQL migration definitions for the run history database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: run_stats",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per regeneration run, in completion order
CREATE TABLE IF NOT EXISTS run_stats (
    seq                    INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id                 TEXT NOT NULL UNIQUE,
    run_trigger            TEXT NOT NULL,
    started_at             TEXT NOT NULL,
    total_pages            INTEGER NOT NULL,
    previous_total_pages   INTEGER,
    duration_ms            INTEGER NOT NULL,
    failed                 INTEGER NOT NULL,
    error_message          TEXT,
    partition_counts_json  TEXT NOT NULL,
    failed_partitions_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_run_stats_failed ON run_stats(failed);

INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
