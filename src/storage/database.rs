//! Database Setup
//!
//! SQLite connection pooling and schema initialization for run records and
//! findings.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};

/// Shared connection pool type
pub type DbPool = Pool<SqliteConnectionManager>;

/// Open a pooled connection to a database file, creating it if needed.
pub fn open_file_pool(path: impl AsRef<Path>) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(path.as_ref());
    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| AppError::database(format!("Failed to build pool: {}", e)))?;
    init_schema(&pool)?;
    Ok(pool)
}

/// Open an in-memory database.
///
/// Capped at a single connection: each pooled in-memory connection would
/// otherwise get its own private database.
pub fn open_memory_pool() -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| AppError::database(format!("Failed to build pool: {}", e)))?;
    init_schema(&pool)?;
    Ok(pool)
}

/// Initialize the database schema.
pub fn init_schema(pool: &DbPool) -> AppResult<()> {
    let conn = pool
        .get()
        .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS analysis_runs (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL,
            item_id TEXT NOT NULL,
            revision_id TEXT NOT NULL,
            profile_id TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            executed_by TEXT NOT NULL,
            executed_at TEXT NOT NULL,
            status TEXT NOT NULL,
            analyzers TEXT NOT NULL,
            summary TEXT,
            error TEXT,
            provider_id TEXT,
            model TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runs_item_profile
         ON analysis_runs(item_type, item_id, profile_id, executed_at DESC)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS findings (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            analyzer_id TEXT NOT NULL,
            category TEXT NOT NULL,
            severity TEXT NOT NULL,
            title TEXT NOT NULL,
            explanation TEXT NOT NULL,
            evidence TEXT,
            suggested_fix TEXT,
            acknowledged_by TEXT,
            acknowledged_at TEXT,
            acknowledgement_note TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_findings_run_analyzer
         ON findings(run_id, analyzer_id)",
        [],
    )?;

    Ok(())
}
