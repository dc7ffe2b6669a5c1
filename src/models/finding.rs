//! Stored Findings
//!
//! A stored finding is a reported finding bound to a run and analyzer, plus
//! its acknowledgement state. Findings are immutable once written except for
//! acknowledgement, and the set for a (run, analyzer) pair is replaced as a
//! unit whenever that analyzer re-executes.

use chrono::{DateTime, Utc};
use content_review_core::{ReportedFinding, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement state of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    /// Actor that acknowledged the finding
    pub acknowledged_by: String,
    /// When it was acknowledged
    pub acknowledged_at: DateTime<Utc>,
    /// Optional note
    #[serde(default)]
    pub note: Option<String>,
}

/// One stored finding row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Generated finding id
    pub id: String,
    /// Owning run id
    pub run_id: String,
    /// Analyzer that produced the finding
    pub analyzer_id: String,
    /// The reported payload (category, severity, title, evidence, fix)
    #[serde(flatten)]
    pub reported: ReportedFinding,
    /// Acknowledgement state; `None` until acknowledged
    #[serde(default)]
    pub acknowledgement: Option<Acknowledgement>,
}

impl Finding {
    /// Bind a reported finding to a run and analyzer.
    pub fn from_reported(
        run_id: impl Into<String>,
        analyzer_id: impl Into<String>,
        reported: ReportedFinding,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            analyzer_id: analyzer_id.into(),
            reported,
            acknowledgement: None,
        }
    }

    /// The finding's severity.
    pub fn severity(&self) -> Severity {
        self.reported.severity
    }

    /// Whether the finding has been acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement.is_some()
    }

    /// Acknowledge the finding. Re-acknowledging overwrites the previous
    /// actor, timestamp, and note.
    pub fn acknowledge(&mut self, actor: impl Into<String>, note: Option<String>) {
        self.acknowledgement = Some(Acknowledgement {
            acknowledged_by: actor.into(),
            acknowledged_at: Utc::now(),
            note,
        });
    }
}
