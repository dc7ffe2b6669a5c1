//! Response Parsing Helpers
//!
//! Shared tolerant JSON extraction for analyzer responses. Models frequently
//! wrap their JSON in prose or markdown fences, so parsing tries the raw
//! text first and then the widest `{...}` window.

use content_review_core::{CoreError, CoreResult, ReportedFinding};
use serde::Deserialize;

/// The JSON envelope analyzers ask the model to produce.
#[derive(Debug, Deserialize)]
pub struct AnalyzerResponse {
    #[serde(default)]
    pub findings: Vec<ReportedFinding>,
}

/// Extract findings from a raw model response.
///
/// Tries a direct JSON parse, then falls back to the substring between the
/// first `{` and the last `}`. Returns a parse error when neither works;
/// an unparseable response is a permanent analyzer failure, not a skip.
pub fn extract_findings(raw: &str) -> CoreResult<Vec<ReportedFinding>> {
    if let Ok(response) = serde_json::from_str::<AnalyzerResponse>(raw) {
        return Ok(response.findings);
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            let window = &raw[start..=end];
            if let Ok(response) = serde_json::from_str::<AnalyzerResponse>(window) {
                return Ok(response.findings);
            }
        }
    }

    Err(CoreError::parse(format!(
        "analyzer response was not valid JSON: {}",
        truncate(raw, 160)
    )))
}

fn truncate(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut cut = limit;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}
