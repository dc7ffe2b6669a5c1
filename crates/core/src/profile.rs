//! Review Profiles
//!
//! Typed configuration for one review profile: which analyzers run, how they
//! are scheduled and retried, how findings gate workflow transitions, and
//! which provider/model performs the analysis. All fields carry serde
//! defaults so profiles can be loaded from sparse TOML and validated once at
//! load time instead of defaulting ad hoc at every call site.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::severity::Severity;

/// How analyzer executions for a run are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Execute every analyzer in-process, sequentially
    Sync,
    /// Enqueue one deferred task per analyzer
    Deferred,
}

/// Scheduling, caching, and retry settings for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Run mode override; `None` falls back to the system-wide default
    #[serde(default)]
    pub run_mode: Option<RunMode>,
    /// How long a successful run may be reused. Zero disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Blocking pause between analyzers in sync mode (skipped before the first)
    #[serde(default = "default_step_delay_secs")]
    pub step_delay_secs: u64,
    /// Per-task delay offset in deferred mode (task i is delayed i × stagger)
    #[serde(default = "default_stagger_secs")]
    pub stagger_secs: u64,
    /// Whether transient provider errors are retried
    #[serde(default = "default_retry_enabled")]
    pub retry_enabled: bool,
    /// Maximum retry attempts after the initial one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff in seconds for the first retry
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
    /// Exponential backoff multiplier
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_step_delay_secs() -> u64 {
    2
}

fn default_stagger_secs() -> u64 {
    30
}

fn default_retry_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_secs() -> u64 {
    5
}

fn default_retry_multiplier() -> f64 {
    2.0
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            run_mode: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            step_delay_secs: default_step_delay_secs(),
            stagger_secs: default_stagger_secs(),
            retry_enabled: default_retry_enabled(),
            max_retries: default_max_retries(),
            retry_base_secs: default_retry_base_secs(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

/// Transition-gating settings for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingSettings {
    /// Whether findings gate workflow transitions at all
    #[serde(default)]
    pub enabled: bool,
    /// Findings at or above this severity block a gated transition
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: Severity,
    /// Workflow transition ids subject to gating
    #[serde(default)]
    pub blocked_transitions: Vec<String>,
    /// Whether qualifying findings must be individually acknowledged
    #[serde(default)]
    pub require_acknowledgement: bool,
    /// Whether a privileged actor may bypass the gate. Disabled by default
    /// until the permission wire-up lands.
    #[serde(default)]
    pub override_enabled: bool,
}

fn default_severity_threshold() -> Severity {
    Severity::Medium
}

impl Default for GatingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            severity_threshold: default_severity_threshold(),
            blocked_transitions: Vec::new(),
            require_acknowledgement: false,
            override_enabled: false,
        }
    }
}

/// Inference-provider settings for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    /// Provider identifier (informational, recorded on each run)
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    /// Model name requested from the provider
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Response token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_id() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One review profile: analyzer set + execution + gating + AI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewProfile {
    /// Stable profile identifier
    pub id: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    /// Enabled analyzer ids. This order is also the aggregation order for
    /// run-level finding lists.
    #[serde(default)]
    pub enabled_analyzers: Vec<String>,
    /// Per-analyzer configuration blobs, keyed by analyzer id
    #[serde(default)]
    pub analyzer_config: HashMap<String, serde_json::Value>,
    /// Scheduling, caching, and retry settings
    #[serde(default)]
    pub execution: ExecutionSettings,
    /// Transition-gating settings
    #[serde(default)]
    pub gating: GatingSettings,
    /// Provider/model settings
    #[serde(default)]
    pub ai: AiSettings,
}

impl ReviewProfile {
    /// Create a profile with default settings.
    pub fn new(id: impl Into<String>, enabled_analyzers: Vec<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            enabled_analyzers,
            analyzer_config: HashMap::new(),
            execution: ExecutionSettings::default(),
            gating: GatingSettings::default(),
            ai: AiSettings::default(),
        }
    }

    /// Configuration blob for one analyzer, or JSON null when absent.
    pub fn config_for(&self, analyzer_id: &str) -> serde_json::Value {
        self.analyzer_config
            .get(analyzer_id)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    /// Validate the profile. Called once after loading; the rest of the
    /// system may assume a validated profile.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::validation("profile id must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for analyzer_id in &self.enabled_analyzers {
            if analyzer_id.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "profile '{}' lists an empty analyzer id",
                    self.id
                )));
            }
            if !seen.insert(analyzer_id.as_str()) {
                return Err(CoreError::validation(format!(
                    "profile '{}' lists analyzer '{}' more than once",
                    self.id, analyzer_id
                )));
            }
        }
        if self.execution.retry_multiplier < 1.0 {
            return Err(CoreError::validation(format!(
                "profile '{}': retry multiplier must be >= 1.0",
                self.id
            )));
        }
        if self.gating.enabled && matches!(self.gating.severity_threshold, Severity::None) {
            return Err(CoreError::validation(format!(
                "profile '{}': gating threshold must be low, medium, or high",
                self.id
            )));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(CoreError::validation(format!(
                "profile '{}': temperature must be between 0.0 and 2.0",
                self.id
            )));
        }
        Ok(())
    }
}
