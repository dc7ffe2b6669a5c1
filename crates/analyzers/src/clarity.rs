//! Clarity Analyzer
//!
//! Flags readability problems in the analyzable text: run-on sentences,
//! jargon without explanation, ambiguous references, and buried calls to
//! action. Asks the model for a strict JSON envelope of findings.

use content_review_core::{
    AnalysisContext, Analyzer, AnalyzerPrompt, CoreResult, ReportedFinding,
};
use serde::Deserialize;

use crate::parse::extract_findings;

/// Per-profile configuration for the clarity analyzer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClarityConfig {
    /// Optional extra instruction appended to the system prompt
    #[serde(default)]
    focus: Option<String>,
}

impl ClarityConfig {
    fn from_value(config: &serde_json::Value) -> Self {
        if config.is_null() {
            return Self::default();
        }
        serde_json::from_value(config.clone()).unwrap_or_default()
    }
}

/// Readability/clarity check.
pub struct ClarityAnalyzer {
    /// Item types this analyzer applies to; empty means all types
    item_types: Vec<String>,
}

impl ClarityAnalyzer {
    /// Create the analyzer, applying to all item types.
    pub fn new() -> Self {
        Self {
            item_types: Vec::new(),
        }
    }

    /// Restrict the analyzer to the given item types.
    pub fn with_item_types(mut self, item_types: Vec<String>) -> Self {
        self.item_types = item_types;
        self
    }
}

impl Default for ClarityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for ClarityAnalyzer {
    fn id(&self) -> &str {
        "clarity"
    }

    fn category(&self) -> &str {
        "editorial"
    }

    fn weight(&self) -> i32 {
        10
    }

    fn supports(&self, item_type: &str) -> bool {
        self.item_types.is_empty() || self.item_types.iter().any(|t| t == item_type)
    }

    fn build_prompt(
        &self,
        context: &AnalysisContext,
        config: &serde_json::Value,
    ) -> CoreResult<AnalyzerPrompt> {
        let cfg = ClarityConfig::from_value(config);

        let mut system = String::from(
            r#"You are an editorial clarity reviewer. Analyze the content for readability problems:
1. Run-on or convoluted sentences
2. Unexplained jargon or abbreviations
3. Ambiguous pronoun references
4. A missing or buried main point

Severity scale: "low" (stylistic), "medium" (hinders comprehension), "high" (reader will misunderstand).

Respond with JSON only, in this exact shape:
{
  "findings": [
    {
      "category": "clarity",
      "severity": "medium",
      "title": "Short label",
      "explanation": "Why this hurts readability",
      "evidence": {"sourceField": "body", "excerpt": "the offending text"},
      "suggestedFix": "Optional rewrite"
    }
  ]
}

If the content reads clearly, respond with {"findings": []}."#,
        );

        if let Some(focus) = &cfg.focus {
            system.push_str("\n\nAdditional focus: ");
            system.push_str(focus);
        }

        let mut user = String::new();
        for (key, value) in &context.meta {
            user.push_str(&format!("{}: {}\n", key, value));
        }
        user.push('\n');
        user.push_str(&context.combined_text);

        Ok(AnalyzerPrompt { system, user })
    }

    fn parse_response(
        &self,
        raw: &str,
        _config: &serde_json::Value,
    ) -> CoreResult<Vec<ReportedFinding>> {
        let mut findings = extract_findings(raw)?;
        // Keep the category stable regardless of what the model emitted.
        for finding in &mut findings {
            if finding.category.is_empty() {
                finding.category = "clarity".to_string();
            }
        }
        Ok(findings)
    }
}
