//! Finding Store
//!
//! Persistence for stored findings, keyed by generated id with a secondary
//! lookup by (run id, analyzer id). The finding set for a (run, analyzer)
//! pair is always replaced as a unit; there is no partial update of one
//! analyzer's findings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::models::finding::{Acknowledgement, Finding};
use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};
use content_review_core::{Evidence, ReportedFinding, Severity};

/// Storage interface for findings.
pub trait FindingStore: Send + Sync {
    /// Delete and recreate the findings for one (run, analyzer) pair.
    fn replace_for_analyzer(
        &self,
        run_id: &str,
        analyzer_id: &str,
        findings: &[Finding],
    ) -> AppResult<()>;

    /// All findings for a run.
    fn list_for_run(&self, run_id: &str) -> AppResult<Vec<Finding>>;

    /// Findings for one (run, analyzer) pair.
    fn list_for_analyzer(&self, run_id: &str, analyzer_id: &str) -> AppResult<Vec<Finding>>;

    /// Load a finding by id.
    fn get(&self, id: &str) -> AppResult<Option<Finding>>;

    /// Acknowledge a finding, overwriting any previous acknowledgement.
    /// Returns the updated finding.
    fn acknowledge(&self, id: &str, actor: &str, note: Option<&str>) -> AppResult<Finding>;
}

/// SQLite-backed finding store.
pub struct SqliteFindingStore {
    pool: DbPool,
}

impl SqliteFindingStore {
    /// Create a store over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Finding> {
        let severity: String = row.get(4)?;
        let evidence: Option<String> = row.get(7)?;
        let acknowledged_by: Option<String> = row.get(9)?;
        let acknowledged_at: Option<String> = row.get(10)?;
        let note: Option<String> = row.get(11)?;

        let acknowledgement = match (acknowledged_by, acknowledged_at) {
            (Some(by), Some(at)) => Some(Acknowledgement {
                acknowledged_by: by,
                acknowledged_at: DateTime::parse_from_rfc3339(&at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                note,
            }),
            _ => None,
        };

        Ok(Finding {
            id: row.get(0)?,
            run_id: row.get(1)?,
            analyzer_id: row.get(2)?,
            reported: ReportedFinding {
                category: row.get(3)?,
                severity: Severity::parse(&severity).unwrap_or(Severity::None),
                title: row.get(5)?,
                explanation: row.get(6)?,
                evidence: evidence.and_then(|e| serde_json::from_str::<Evidence>(&e).ok()),
                suggested_fix: row.get(8)?,
            },
            acknowledgement,
        })
    }
}

const FINDING_COLUMNS: &str = "id, run_id, analyzer_id, category, severity, title, explanation,
    evidence, suggested_fix, acknowledged_by, acknowledged_at, acknowledgement_note";

impl FindingStore for SqliteFindingStore {
    fn replace_for_analyzer(
        &self,
        run_id: &str,
        analyzer_id: &str,
        findings: &[Finding],
    ) -> AppResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM findings WHERE run_id = ?1 AND analyzer_id = ?2",
            params![run_id, analyzer_id],
        )?;

        for finding in findings {
            let evidence = finding
                .reported
                .evidence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let (acknowledged_by, acknowledged_at, note) = match &finding.acknowledgement {
                Some(ack) => (
                    Some(ack.acknowledged_by.clone()),
                    Some(ack.acknowledged_at.to_rfc3339()),
                    ack.note.clone(),
                ),
                None => (None, None, None),
            };

            tx.execute(
                "INSERT INTO findings
                 (id, run_id, analyzer_id, category, severity, title, explanation,
                  evidence, suggested_fix, acknowledged_by, acknowledged_at, acknowledgement_note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    finding.id,
                    finding.run_id,
                    finding.analyzer_id,
                    finding.reported.category,
                    finding.reported.severity.to_string(),
                    finding.reported.title,
                    finding.reported.explanation,
                    evidence,
                    finding.reported.suggested_fix,
                    acknowledged_by,
                    acknowledged_at,
                    note,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_for_run(&self, run_id: &str) -> AppResult<Vec<Finding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM findings WHERE run_id = ?1 ORDER BY rowid",
            FINDING_COLUMNS
        ))?;
        let findings = stmt
            .query_map(params![run_id], Self::map_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(findings)
    }

    fn list_for_analyzer(&self, run_id: &str, analyzer_id: &str) -> AppResult<Vec<Finding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM findings WHERE run_id = ?1 AND analyzer_id = ?2 ORDER BY rowid",
            FINDING_COLUMNS
        ))?;
        let findings = stmt
            .query_map(params![run_id, analyzer_id], Self::map_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(findings)
    }

    fn get(&self, id: &str) -> AppResult<Option<Finding>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM findings WHERE id = ?1", FINDING_COLUMNS),
            params![id],
            Self::map_row,
        );
        match result {
            Ok(finding) => Ok(Some(finding)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Sqlite(e)),
        }
    }

    fn acknowledge(&self, id: &str, actor: &str, note: Option<&str>) -> AppResult<Finding> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE findings SET
                acknowledged_by = ?2, acknowledged_at = ?3, acknowledgement_note = ?4
             WHERE id = ?1",
            params![id, actor, Utc::now().to_rfc3339(), note],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(format!("finding {}", id)));
        }
        drop(conn);
        self.get(id)?
            .ok_or_else(|| AppError::not_found(format!("finding {}", id)))
    }
}
