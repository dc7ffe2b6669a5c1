//! Reported Findings
//!
//! The finding shape an analyzer emits. Stored findings (with run identity
//! and acknowledgement state) live in the application crate; analyzers only
//! produce this payload.

use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// A text excerpt locating a finding in the analyzed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Name of the source field the excerpt came from
    pub source_field: String,
    /// The offending text excerpt
    pub excerpt: String,
    /// Optional character offset range within the source field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_end: Option<usize>,
}

impl Evidence {
    /// Create evidence without character offsets.
    pub fn new(source_field: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            excerpt: excerpt.into(),
            offset_start: None,
            offset_end: None,
        }
    }

    /// Attach a character offset range.
    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.offset_start = Some(start);
        self.offset_end = Some(end);
        self
    }
}

/// One flagged issue produced by a single analyzer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedFinding {
    /// Free-form category tag (e.g. "clarity", "policy", "system")
    pub category: String,
    /// Severity on the fixed scale
    pub severity: Severity,
    /// Short title
    pub title: String,
    /// Longer explanation of the issue
    pub explanation: String,
    /// Optional evidence excerpt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    /// Optional suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl ReportedFinding {
    /// Create a finding with the required fields.
    pub fn new(
        category: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            severity,
            title: title.into(),
            explanation: explanation.into(),
            evidence: None,
            suggested_fix: None,
        }
    }

    /// Attach evidence.
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Attach a suggested fix.
    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// The synthetic finding recorded when an analyzer fails terminally,
    /// so that failures are visible in the same shape as real findings.
    pub fn system_failure(analyzer_id: &str, error: &str) -> Self {
        Self::new(
            "system",
            Severity::Low,
            format!("Analyzer '{}' did not complete", analyzer_id),
            format!("The analyzer failed to produce results: {}", error),
        )
    }
}
