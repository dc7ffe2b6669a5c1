//! Analyzer Trait
//!
//! The pluggable check interface. An analyzer declares which item types it
//! supports, builds the prompt pair sent to the inference provider, and
//! parses the raw response back into reported findings. Execution,
//! scheduling, and retry are the orchestrator's concern; analyzers stay
//! pure over their inputs.

use serde::{Deserialize, Serialize};

use crate::context::AnalysisContext;
use crate::error::CoreResult;
use crate::finding::ReportedFinding;

/// The prompt pair an analyzer hands to the inference provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerPrompt {
    /// System message (instructions + output contract)
    pub system: String,
    /// User message (the content under review)
    pub user: String,
}

/// A pluggable quality-review check.
pub trait Analyzer: Send + Sync {
    /// Stable analyzer identifier (referenced from profiles).
    fn id(&self) -> &str;

    /// Category tag for grouping/display ordering.
    fn category(&self) -> &str;

    /// Display weight within a category. Lower sorts first.
    fn weight(&self) -> i32 {
        0
    }

    /// Whether this analyzer can inspect the given item type.
    fn supports(&self, item_type: &str) -> bool;

    /// Build the prompt for the given context and per-analyzer config blob.
    fn build_prompt(
        &self,
        context: &AnalysisContext,
        config: &serde_json::Value,
    ) -> CoreResult<AnalyzerPrompt>;

    /// Parse the provider's raw response text into findings.
    fn parse_response(
        &self,
        raw: &str,
        config: &serde_json::Value,
    ) -> CoreResult<Vec<ReportedFinding>>;
}
