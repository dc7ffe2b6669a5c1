//! Policy Compliance Analyzer
//!
//! Checks content against the editorial policy carried in the analysis
//! context (or a default checklist when no policy text is configured) and
//! reports violations as findings.

use content_review_core::{
    AnalysisContext, Analyzer, AnalyzerPrompt, CoreResult, ReportedFinding,
};
use serde::Deserialize;

use crate::parse::extract_findings;

/// Fallback checklist applied when neither the context nor the config
/// carries policy text.
const DEFAULT_POLICY: &str = "\
- No unverified factual claims stated as certainties\n\
- No discriminatory or demeaning language\n\
- No undisclosed promotional content\n\
- Quotes must be attributed";

/// Per-profile configuration for the compliance analyzer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComplianceConfig {
    /// Policy text override; takes precedence over the context policy
    #[serde(default)]
    policy: Option<String>,
}

impl ComplianceConfig {
    fn from_value(config: &serde_json::Value) -> Self {
        if config.is_null() {
            return Self::default();
        }
        serde_json::from_value(config.clone()).unwrap_or_default()
    }
}

/// Editorial-policy compliance check.
pub struct PolicyComplianceAnalyzer {
    item_types: Vec<String>,
}

impl PolicyComplianceAnalyzer {
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

impl Default for PolicyComplianceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for PolicyComplianceAnalyzer {
    fn id(&self) -> &str {
        "policy_compliance"
    }

    fn category(&self) -> &str {
        "compliance"
    }

    fn weight(&self) -> i32 {
        20
    }

    fn supports(&self, item_type: &str) -> bool {
        self.item_types.is_empty() || self.item_types.iter().any(|t| t == item_type)
    }

    fn build_prompt(
        &self,
        context: &AnalysisContext,
        config: &serde_json::Value,
    ) -> CoreResult<AnalyzerPrompt> {
        let cfg = ComplianceConfig::from_value(config);
        let policy = cfg
            .policy
            .as_deref()
            .or(context.policy_text.as_deref())
            .unwrap_or(DEFAULT_POLICY);

        let system = format!(
            r#"You are an editorial policy reviewer. Check the content against this policy:

{}

Severity scale: "low" (borderline), "medium" (clear violation), "high" (must not publish).

Respond with JSON only, in this exact shape:
{{
  "findings": [
    {{
      "category": "policy",
      "severity": "high",
      "title": "Short label",
      "explanation": "Which policy rule is violated and how",
      "evidence": {{"sourceField": "body", "excerpt": "the violating text"}},
      "suggestedFix": "Optional compliant rewrite"
    }}
  ]
}}

If the content is fully compliant, respond with {{"findings": []}}."#,
            policy
        );

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
        for finding in &mut findings {
            if finding.category.is_empty() {
                finding.category = "policy".to_string();
            }
        }
        Ok(findings)
    }
}
