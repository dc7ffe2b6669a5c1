//! Gating Decision Engine
//!
//! Decides whether a proposed workflow transition for a content item is
//! allowed or blocked, based on the profile's gating settings and the
//! item's latest analysis run. The engine never errors on configuration
//! gaps: absent configuration collapses to allow, and only storage failures
//! surface as `Err`.

use std::collections::HashMap;
use std::sync::Arc;

use content_review_core::{ContentItem, ContextBuilder, ReviewProfile};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::run::RunStatus;
use crate::services::staleness::is_stale;
use crate::storage::{FindingStore, RunStore};
use crate::utils::error::AppResult;

/// The actor attempting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActor {
    /// Actor identifier
    pub id: String,
    /// Whether the actor holds the gate-override capability
    #[serde(default)]
    pub can_override_gate: bool,
}

impl ReviewActor {
    /// An actor without override capability.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            can_override_gate: false,
        }
    }

    /// Grant the override capability.
    pub fn with_override(mut self) -> Self {
        self.can_override_gate = true;
        self
    }
}

/// Resolves workflow transitions for item types.
pub trait TransitionOracle: Send + Sync {
    /// Whether the item type participates in the workflow system at all.
    fn participates(&self, item_type: &str) -> bool;

    /// The transition id for a state change, when one exists.
    fn resolve_transition(&self, item_type: &str, from: &str, to: &str) -> Option<String>;
}

/// Map-backed transition oracle for embedding and tests.
pub struct StaticTransitionOracle {
    transitions: HashMap<(String, String, String), String>,
}

impl StaticTransitionOracle {
    /// Create an empty oracle. Item types participate once they have at
    /// least one registered transition.
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    /// Register a transition.
    pub fn with_transition(
        mut self,
        item_type: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        transition_id: impl Into<String>,
    ) -> Self {
        self.transitions.insert(
            (item_type.into(), from.into(), to.into()),
            transition_id.into(),
        );
        self
    }
}

impl Default for StaticTransitionOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionOracle for StaticTransitionOracle {
    fn participates(&self, item_type: &str) -> bool {
        self.transitions.keys().any(|(t, _, _)| t == item_type)
    }

    fn resolve_transition(&self, item_type: &str, from: &str, to: &str) -> Option<String> {
        self.transitions
            .get(&(item_type.to_string(), from.to_string(), to.to_string()))
            .cloned()
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateDecision {
    /// The transition may proceed
    Allow,
    /// The transition is blocked
    Block {
        /// Human-readable reason
        reason: String,
    },
}

impl GateDecision {
    fn block(reason: impl Into<String>) -> Self {
        GateDecision::Block {
            reason: reason.into(),
        }
    }

    /// Whether the transition is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// The block reason, when blocked.
    pub fn reason(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Block { reason } => Some(reason),
        }
    }
}

/// The gating decision engine.
pub struct GatingEngine {
    runs: Arc<dyn RunStore>,
    findings: Arc<dyn FindingStore>,
    context_builder: Arc<dyn ContextBuilder>,
    oracle: Arc<dyn TransitionOracle>,
}

impl GatingEngine {
    /// Create an engine over its collaborators.
    pub fn new(
        runs: Arc<dyn RunStore>,
        findings: Arc<dyn FindingStore>,
        context_builder: Arc<dyn ContextBuilder>,
        oracle: Arc<dyn TransitionOracle>,
    ) -> Self {
        Self {
            runs,
            findings,
            context_builder,
            oracle,
        }
    }

    /// Evaluate a proposed state change.
    pub async fn evaluate(
        &self,
        item: &ContentItem,
        old_state: &str,
        new_state: &str,
        profile: &ReviewProfile,
        actor: &ReviewActor,
    ) -> AppResult<GateDecision> {
        if !profile.gating.enabled || !self.oracle.participates(&item.item_type) {
            return Ok(GateDecision::Allow);
        }

        if old_state == new_state {
            return Ok(GateDecision::Allow);
        }

        let transition_id =
            match self
                .oracle
                .resolve_transition(&item.item_type, old_state, new_state)
            {
                Some(id) => id,
                None => return Ok(GateDecision::Allow),
            };
        if !profile.gating.blocked_transitions.contains(&transition_id) {
            return Ok(GateDecision::Allow);
        }

        if profile.gating.override_enabled && actor.can_override_gate {
            info!(actor = %actor.id, item = %item.item_ref(), transition = %transition_id,
                  "gate bypassed via override capability");
            return Ok(GateDecision::Allow);
        }

        let run = match self
            .runs
            .latest(&item.item_type, &item.item_id, &profile.id)?
        {
            Some(run) => run,
            None => {
                return Ok(GateDecision::block(
                    "A quality review is required before this transition.",
                ))
            }
        };

        match run.status {
            RunStatus::Pending => {
                return Ok(GateDecision::block(
                    "The quality review is still in progress.",
                ))
            }
            RunStatus::Failed => {
                return Ok(GateDecision::block(
                    "The previous quality review failed. Run the analysis again.",
                ))
            }
            RunStatus::Success => {}
        }

        let current_fingerprint = self.context_builder.compute_fingerprint(item, profile);
        if is_stale(&run, &current_fingerprint) {
            return Ok(GateDecision::block(
                "Content has changed since the last review. Run the analysis again.",
            ));
        }

        let threshold = profile.gating.severity_threshold;
        if !run.max_severity().exceeds(threshold) {
            return Ok(GateDecision::Allow);
        }

        let all_findings = self.findings.list_for_run(&run.id)?;
        let qualifying: Vec<_> = all_findings
            .iter()
            .filter(|f| f.severity().qualifies_for(threshold))
            .collect();
        if qualifying.is_empty() {
            // The run-level max severity has no individually qualifying
            // finding behind it; observed behavior allows the transition.
            debug!(run = %run.id, "max severity exceeded threshold but no finding qualifies");
            return Ok(GateDecision::Allow);
        }

        if profile.gating.require_acknowledgement {
            let unacknowledged = qualifying.iter().filter(|f| !f.is_acknowledged()).count();
            if unacknowledged == 0 {
                return Ok(GateDecision::Allow);
            }
            return Ok(GateDecision::block(format!(
                "{} of {} blocking findings must be acknowledged before this transition.",
                unacknowledged,
                qualifying.len()
            )));
        }

        let summary = run.summary.unwrap_or_else(|| {
            crate::models::run::RunSummary::from_findings(std::iter::empty())
        });
        Ok(GateDecision::block(format!(
            "The quality review found blocking findings: {} high, {} medium severity.",
            summary.high, summary.medium
        )))
    }
}
