//! Analysis Run Records
//!
//! The aggregate unit of review work: one record per (content item, revision,
//! profile) combining overall status, the per-analyzer sub-status map,
//! severity counts, and the content fingerprint the run was computed against.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use content_review_core::{ContentItem, ItemRef, ReportedFinding, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// At least one enabled analyzer has not finished
    Pending,
    /// Every enabled analyzer reached a terminal sub-status
    Success,
    /// A run-level error aborted the run
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal for the run as a whole.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// Parse a status from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one analyzer within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerStatus {
    /// Not yet executed (or reset for re-execution)
    Pending,
    /// Completed; findings snapshot is authoritative
    Success,
    /// Failed terminally; error message and synthetic finding recorded
    Failed,
}

impl AnalyzerStatus {
    /// Whether this sub-status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalyzerStatus::Success | AnalyzerStatus::Failed)
    }
}

impl std::fmt::Display for AnalyzerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerStatus::Pending => write!(f, "pending"),
            AnalyzerStatus::Success => write!(f, "success"),
            AnalyzerStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-analyzer state within a run: sub-status, findings snapshot, error.
///
/// The findings snapshot here is the source of truth copied into the finding
/// store; aggregation re-derives the run-level list from these snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerState {
    /// Sub-status
    pub status: AnalyzerStatus,
    /// When this analyzer was last attempted
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Findings snapshot from the last successful or failed execution
    #[serde(default)]
    pub findings: Vec<ReportedFinding>,
    /// Error message when the analyzer failed
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalyzerState {
    /// A fresh pending state.
    pub fn pending() -> Self {
        Self {
            status: AnalyzerStatus::Pending,
            last_attempt_at: None,
            findings: Vec::new(),
            error: None,
        }
    }
}

/// Aggregated severity counts over all analyzer snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Number of high-severity findings
    pub high: u32,
    /// Number of medium-severity findings
    pub medium: u32,
    /// Number of low-severity findings
    pub low: u32,
    /// Maximum severity across all findings
    pub max_severity: Severity,
}

impl RunSummary {
    /// Fold a finding list into counts and max severity.
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a ReportedFinding>) -> Self {
        let mut summary = Self {
            high: 0,
            medium: 0,
            low: 0,
            max_severity: Severity::None,
        };
        for finding in findings {
            match finding.severity {
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::None => {}
            }
            if finding.severity > summary.max_severity {
                summary.max_severity = finding.severity;
            }
        }
        summary
    }
}

/// One analysis run for a (content item, revision, profile) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    /// Generated run id
    pub id: String,
    /// Target item type
    pub item_type: String,
    /// Target item id
    pub item_id: String,
    /// Revision the run analyzed (empty when the item could not be loaded)
    pub revision_id: String,
    /// Profile that configured the run
    pub profile_id: String,
    /// Content fingerprint the run was computed against
    pub fingerprint: String,
    /// Actor that requested the run
    pub executed_by: String,
    /// When the run (or its latest re-execution) was requested
    pub executed_at: DateTime<Utc>,
    /// Overall status
    pub status: RunStatus,
    /// Per-analyzer sub-status map
    #[serde(default)]
    pub analyzers: BTreeMap<String, AnalyzerState>,
    /// Aggregated counts, set at finalization
    #[serde(default)]
    pub summary: Option<RunSummary>,
    /// Run-level error message (set when the run failed outside any analyzer)
    #[serde(default)]
    pub error: Option<String>,
    /// Provider that served the run (informational)
    #[serde(default)]
    pub provider_id: Option<String>,
    /// Model that served the run (informational)
    #[serde(default)]
    pub model: Option<String>,
}

impl AnalysisRun {
    /// Create a pending run seeded with every enabled analyzer.
    pub fn new(
        item: &ContentItem,
        profile_id: impl Into<String>,
        fingerprint: impl Into<String>,
        executed_by: impl Into<String>,
        enabled_analyzers: &[String],
    ) -> Self {
        let analyzers = enabled_analyzers
            .iter()
            .map(|id| (id.clone(), AnalyzerState::pending()))
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            item_type: item.item_type.clone(),
            item_id: item.item_id.clone(),
            revision_id: item.revision_id.clone(),
            profile_id: profile_id.into(),
            fingerprint: fingerprint.into(),
            executed_by: executed_by.into(),
            executed_at: Utc::now(),
            status: RunStatus::Pending,
            analyzers,
            summary: None,
            error: None,
            provider_id: None,
            model: None,
        }
    }

    /// Create a run that failed before the item could be loaded. Sub-statuses
    /// stay empty; callers must treat this as "did not run".
    pub fn failed_for(
        item_ref: &ItemRef,
        profile_id: impl Into<String>,
        executed_by: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_type: item_ref.item_type.clone(),
            item_id: item_ref.item_id.clone(),
            revision_id: String::new(),
            profile_id: profile_id.into(),
            fingerprint: String::new(),
            executed_by: executed_by.into(),
            executed_at: Utc::now(),
            status: RunStatus::Failed,
            analyzers: BTreeMap::new(),
            summary: None,
            error: Some(error.into()),
            provider_id: None,
            model: None,
        }
    }

    /// Record one analyzer's terminal state.
    ///
    /// If the run had already finalized (single-analyzer re-run against a
    /// successful record), the overall status drops back to `Pending` before
    /// the write so finalization can re-run.
    pub fn record_analyzer(&mut self, analyzer_id: &str, state: AnalyzerState) {
        if self.status == RunStatus::Success {
            self.status = RunStatus::Pending;
        }
        self.analyzers.insert(analyzer_id.to_string(), state);
    }

    /// Reset one analyzer to pending for re-execution. Drops the overall
    /// status back to `Pending` when the run had finalized.
    pub fn reset_analyzer(&mut self, analyzer_id: &str, executed_by: &str) {
        self.analyzers
            .insert(analyzer_id.to_string(), AnalyzerState::pending());
        if self.status == RunStatus::Success {
            self.status = RunStatus::Pending;
        }
        self.executed_by = executed_by.to_string();
        self.executed_at = Utc::now();
    }

    /// Mark the whole run failed with a run-level error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
    }

    /// Current sub-status for one analyzer.
    pub fn analyzer_status(&self, analyzer_id: &str) -> Option<AnalyzerStatus> {
        self.analyzers.get(analyzer_id).map(|s| s.status)
    }

    /// Whether every analyzer in `enabled` has reached a terminal sub-status.
    /// Analyzers missing from the map count as non-terminal.
    pub fn all_terminal(&self, enabled: &[String]) -> bool {
        enabled.iter().all(|id| {
            self.analyzers
                .get(id)
                .map(|s| s.status.is_terminal())
                .unwrap_or(false)
        })
    }

    /// The run-level finding list: per-analyzer snapshots concatenated in
    /// analyzer-enumeration order, not completion order.
    pub fn aggregated_findings(&self, enabled_order: &[String]) -> Vec<ReportedFinding> {
        let mut findings = Vec::new();
        for id in enabled_order {
            if let Some(state) = self.analyzers.get(id) {
                findings.extend(state.findings.iter().cloned());
            }
        }
        findings
    }

    /// Fold all snapshots into the summary and mark the run successful.
    /// Idempotent for identical inputs; callers invoke it only once every
    /// enabled analyzer is terminal.
    pub fn aggregate(&mut self, enabled_order: &[String]) {
        let findings = self.aggregated_findings(enabled_order);
        self.summary = Some(RunSummary::from_findings(&findings));
        self.status = RunStatus::Success;
        // A finalized run carries no run-level error; analyzer-level errors
        // stay in their sub-status entries.
        self.error = None;
    }

    /// The run's maximum finding severity, `None`-severity when the run has
    /// not aggregated yet.
    pub fn max_severity(&self) -> Severity {
        self.summary.map(|s| s.max_severity).unwrap_or(Severity::None)
    }

    /// Age of the run in whole seconds at `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.executed_at).num_seconds()
    }
}
