//! Run Record Store
//!
//! Persistence for analysis runs, keyed by generated id with a secondary
//! lookup by (item type, item id, profile id) ordered by execution time
//! descending for "latest run" queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::models::run::AnalysisRun;
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

/// Storage interface for run records.
pub trait RunStore: Send + Sync {
    /// Persist a new run record.
    fn create(&self, run: &AnalysisRun) -> AppResult<()>;

    /// Persist updated state for an existing run record.
    fn save(&self, run: &AnalysisRun) -> AppResult<()>;

    /// Load a run by id.
    fn get(&self, id: &str) -> AppResult<Option<AnalysisRun>>;

    /// The most recent run for (item type, item id, profile).
    fn latest(
        &self,
        item_type: &str,
        item_id: &str,
        profile_id: &str,
    ) -> AppResult<Option<AnalysisRun>>;

    /// Recent runs for an item across profiles, newest first.
    fn list_for_item(
        &self,
        item_type: &str,
        item_id: &str,
        limit: usize,
    ) -> AppResult<Vec<AnalysisRun>>;

    /// Delete runs older than the given number of days. Returns the number
    /// of deleted rows.
    fn cleanup_older_than(&self, days: i64) -> AppResult<usize>;
}

/// SQLite-backed run store.
pub struct SqliteRunStore {
    pool: DbPool,
}

impl SqliteRunStore {
    /// Create a store over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRun> {
        let executed_at: String = row.get(7)?;
        let analyzers: String = row.get(9)?;
        let summary: Option<String> = row.get(10)?;
        let status: String = row.get(8)?;

        Ok(AnalysisRun {
            id: row.get(0)?,
            item_type: row.get(1)?,
            item_id: row.get(2)?,
            revision_id: row.get(3)?,
            profile_id: row.get(4)?,
            fingerprint: row.get(5)?,
            executed_by: row.get(6)?,
            executed_at: parse_timestamp(&executed_at),
            status: crate::models::run::RunStatus::parse(&status)
                .unwrap_or(crate::models::run::RunStatus::Failed),
            analyzers: serde_json::from_str(&analyzers).unwrap_or_default(),
            summary: summary.and_then(|s| serde_json::from_str(&s).ok()),
            error: row.get(11)?,
            provider_id: row.get(12)?,
            model: row.get(13)?,
        })
    }
}

/// Parse an RFC 3339 timestamp, falling back to the epoch on corrupt rows.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

const RUN_COLUMNS: &str = "id, item_type, item_id, revision_id, profile_id, fingerprint,
    executed_by, executed_at, status, analyzers, summary, error, provider_id, model";

impl RunStore for SqliteRunStore {
    fn create(&self, run: &AnalysisRun) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO analysis_runs
             (id, item_type, item_id, revision_id, profile_id, fingerprint,
              executed_by, executed_at, status, analyzers, summary, error, provider_id, model)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                run.id,
                run.item_type,
                run.item_id,
                run.revision_id,
                run.profile_id,
                run.fingerprint,
                run.executed_by,
                run.executed_at.to_rfc3339(),
                run.status.to_string(),
                serde_json::to_string(&run.analyzers)?,
                run.summary
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                run.error,
                run.provider_id,
                run.model,
            ],
        )?;
        Ok(())
    }

    fn save(&self, run: &AnalysisRun) -> AppResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE analysis_runs SET
                revision_id = ?2, fingerprint = ?3, executed_by = ?4, executed_at = ?5,
                status = ?6, analyzers = ?7, summary = ?8, error = ?9,
                provider_id = ?10, model = ?11
             WHERE id = ?1",
            params![
                run.id,
                run.revision_id,
                run.fingerprint,
                run.executed_by,
                run.executed_at.to_rfc3339(),
                run.status.to_string(),
                serde_json::to_string(&run.analyzers)?,
                run.summary
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                run.error,
                run.provider_id,
                run.model,
            ],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(format!("run {}", run.id)));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> AppResult<Option<AnalysisRun>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM analysis_runs WHERE id = ?1", RUN_COLUMNS),
            params![id],
            Self::map_row,
        );
        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Sqlite(e)),
        }
    }

    fn latest(
        &self,
        item_type: &str,
        item_id: &str,
        profile_id: &str,
    ) -> AppResult<Option<AnalysisRun>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM analysis_runs
                 WHERE item_type = ?1 AND item_id = ?2 AND profile_id = ?3
                 ORDER BY executed_at DESC, rowid DESC
                 LIMIT 1",
                RUN_COLUMNS
            ),
            params![item_type, item_id, profile_id],
            Self::map_row,
        );
        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Sqlite(e)),
        }
    }

    fn list_for_item(
        &self,
        item_type: &str,
        item_id: &str,
        limit: usize,
    ) -> AppResult<Vec<AnalysisRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM analysis_runs
             WHERE item_type = ?1 AND item_id = ?2
             ORDER BY executed_at DESC, rowid DESC
             LIMIT ?3",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![item_type, item_id, limit as i64], Self::map_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }

    fn cleanup_older_than(&self, days: i64) -> AppResult<usize> {
        let mut conn = self.conn()?;
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM findings WHERE run_id IN
             (SELECT id FROM analysis_runs WHERE executed_at < ?1)",
            params![cutoff],
        )?;
        let count = tx.execute(
            "DELETE FROM analysis_runs WHERE executed_at < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(count)
    }
}
