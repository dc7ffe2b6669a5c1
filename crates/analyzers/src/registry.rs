//! Analyzer Registry
//!
//! Manages the set of available analyzers (built-in + custom) with
//! enable/disable support and per-profile selection.

use std::sync::Arc;

use content_review_core::{Analyzer, ReviewProfile};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Managed analyzer entry with enabled state.
struct AnalyzerEntry {
    analyzer: Arc<dyn Analyzer>,
    enabled: bool,
    analyzer_type: String,
}

/// Information about a registered analyzer for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerInfo {
    /// Analyzer id
    pub id: String,
    /// Category tag
    pub category: String,
    /// Display weight
    pub weight: i32,
    /// Type: "builtin" or "custom"
    pub analyzer_type: String,
    /// Whether currently enabled
    pub enabled: bool,
}

/// Registry managing all analyzers with enable/disable and selection.
pub struct AnalyzerRegistry {
    entries: Vec<AnalyzerEntry>,
}

impl AnalyzerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a registry with the built-in analyzers enabled.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_builtin(Arc::new(crate::ClarityAnalyzer::new()), true);
        registry.add_builtin(Arc::new(crate::PolicyComplianceAnalyzer::new()), true);
        registry
    }

    /// Add a built-in analyzer.
    pub fn add_builtin(&mut self, analyzer: Arc<dyn Analyzer>, enabled: bool) {
        self.entries.push(AnalyzerEntry {
            analyzer,
            enabled,
            analyzer_type: "builtin".to_string(),
        });
    }

    /// Add a custom analyzer.
    pub fn add_custom(&mut self, analyzer: Arc<dyn Analyzer>, enabled: bool) {
        self.entries.push(AnalyzerEntry {
            analyzer,
            enabled,
            analyzer_type: "custom".to_string(),
        });
    }

    /// Enable or disable an analyzer by id. Disabled analyzers are invisible
    /// to `get` and `for_profile`.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        for entry in &mut self.entries {
            if entry.analyzer.id() == id {
                entry.enabled = enabled;
                return true;
            }
        }
        false
    }

    /// Check if an analyzer is registered and enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .iter()
            .find(|e| e.analyzer.id() == id)
            .map(|e| e.enabled)
            .unwrap_or(false)
    }

    /// Get an enabled analyzer by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Analyzer>> {
        self.entries
            .iter()
            .find(|e| e.enabled && e.analyzer.id() == id)
            .map(|e| Arc::clone(&e.analyzer))
    }

    /// List all registered analyzers with their info, ordered by category
    /// then weight.
    pub fn list(&self) -> Vec<AnalyzerInfo> {
        let mut infos: Vec<AnalyzerInfo> = self
            .entries
            .iter()
            .map(|e| AnalyzerInfo {
                id: e.analyzer.id().to_string(),
                category: e.analyzer.category().to_string(),
                weight: e.analyzer.weight(),
                analyzer_type: e.analyzer_type.clone(),
                enabled: e.enabled,
            })
            .collect();
        infos.sort_by(|a, b| a.category.cmp(&b.category).then(a.weight.cmp(&b.weight)));
        infos
    }

    /// Resolve the profile's enabled analyzers in profile order.
    ///
    /// Analyzer ids the profile lists but the registry doesn't know (or has
    /// disabled) are skipped with a warning rather than failing the run.
    pub fn for_profile(&self, profile: &ReviewProfile) -> Vec<Arc<dyn Analyzer>> {
        let mut analyzers = Vec::new();
        for id in &profile.enabled_analyzers {
            match self.get(id) {
                Some(analyzer) => analyzers.push(analyzer),
                None => {
                    warn!(analyzer = %id, profile = %profile.id, "profile references unknown or disabled analyzer");
                }
            }
        }
        analyzers
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
