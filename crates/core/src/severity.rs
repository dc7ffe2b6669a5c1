//! Finding Severity
//!
//! The ordered severity scale used by analyzers and the gating engine.
//! Comparisons always go through the fixed numeric ranks, never through
//! string comparison.

use serde::{Deserialize, Serialize};

/// Severity of a reported finding.
///
/// Total order: `None < Low < Medium < High`. The derived `Ord` relies on
/// declaration order matching the rank table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No issue, informational only
    None,
    /// Minor issue
    Low,
    /// Issue that should be addressed
    Medium,
    /// Serious issue
    High,
}

impl Severity {
    /// Fixed numeric rank: none=0, low=1, medium=2, high=3.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::None => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }

    /// Whether this severity meets or exceeds `threshold` on the rank scale.
    pub fn exceeds(&self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }

    /// Whether a finding with this severity qualifies against a gating
    /// threshold. Uses the threshold-only rank table, which excludes `None`:
    /// a `None` finding never qualifies regardless of the threshold.
    pub fn qualifies_for(&self, threshold: Severity) -> bool {
        !matches!(self, Severity::None) && self.rank() >= threshold.rank()
    }

    /// Parse a severity from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Severity::None),
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::None
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}
