//! Review Execution Orchestrator
//!
//! The central service: decides whether a cached run can be reused, creates
//! run records, fans analyzer executions out synchronously or via the
//! deferred task transport, retries transient provider errors with
//! exponential backoff, records per-analyzer results, and finalizes runs
//! once every enabled analyzer is terminal.
//!
//! Failure semantics: analyzer-level failures are captured into the run
//! record and never abort sibling analyzers; run-level failures (item or
//! profile missing, provider wholly unavailable before any analyzer ran)
//! produce a `failed` run record instead of an error. Only storage failures
//! surface as `Err` to callers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use content_review_analyzers::AnalyzerRegistry;
use content_review_core::{
    Analyzer, AnalysisContext, ContentItem, ContextBuilder, ItemRef, ReportedFinding,
    ReviewProfile, RunMode,
};
use content_review_llm::{ChatProvider, ChatRequestOptions};
use tracing::{debug, info, warn};

use crate::models::finding::Finding;
use crate::models::run::{AnalysisRun, AnalyzerState, AnalyzerStatus};
use crate::services::queue::{ReviewTask, TaskTransport};
use crate::services::retry::{RetryDecision, RetryPolicy};
use crate::services::staleness::is_cache_valid;
use crate::storage::{ContentStore, FindingStore, ProfileStore, RunStore};
use crate::utils::error::{AppError, AppResult};

/// System-wide orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Run mode used when a profile does not specify one
    pub default_run_mode: RunMode,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_run_mode: RunMode::Sync,
        }
    }
}

/// Result of executing one analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutcome {
    /// Terminal sub-status for the analyzer
    pub status: AnalyzerStatus,
    /// Findings snapshot (one synthetic system finding on failure)
    pub findings: Vec<ReportedFinding>,
    /// Error message on failure
    pub error: Option<String>,
    /// Provider that served the execution
    pub provider_id: Option<String>,
    /// Model that served the execution
    pub model: Option<String>,
}

impl AnalyzerOutcome {
    /// Successful execution with findings.
    pub fn success(
        findings: Vec<ReportedFinding>,
        provider_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            status: AnalyzerStatus::Success,
            findings,
            error: None,
            provider_id: Some(provider_id.into()),
            model: Some(model.into()),
        }
    }

    /// The analyzer does not support the item's type. A skip is a success
    /// with an empty finding list, distinct from failure.
    pub fn skipped() -> Self {
        Self {
            status: AnalyzerStatus::Success,
            findings: Vec::new(),
            error: None,
            provider_id: None,
            model: None,
        }
    }

    /// Terminal failure. The finding list contains exactly one synthetic
    /// system-category, low-severity finding describing the failure.
    pub fn failure(analyzer_id: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: AnalyzerStatus::Failed,
            findings: vec![ReportedFinding::system_failure(analyzer_id, &error)],
            error: Some(error),
            provider_id: None,
            model: None,
        }
    }
}

/// Internal: distinguishes storage failures (propagated) from run-level
/// failures (converted to a failed run record).
enum StartError {
    Fatal(AppError),
    RunLevel(String),
}

impl From<AppError> for StartError {
    fn from(err: AppError) -> Self {
        StartError::Fatal(err)
    }
}

/// Internal: one failed analyzer attempt, with the retry policy when the
/// profile was reachable.
struct AttemptFailed {
    message: String,
    policy: Option<RetryPolicy>,
}

/// Internal: everything a provider attempt needs, loaded once.
struct PreparedAttempt {
    analyzer: Arc<dyn Analyzer>,
    context: AnalysisContext,
    config: serde_json::Value,
    policy: RetryPolicy,
    options: ChatRequestOptions,
}

/// The review execution orchestrator. All collaborators are injected;
/// there are no ambient lookups.
pub struct ReviewOrchestrator {
    runs: Arc<dyn RunStore>,
    findings: Arc<dyn FindingStore>,
    content: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileStore>,
    context_builder: Arc<dyn ContextBuilder>,
    registry: Arc<AnalyzerRegistry>,
    provider: Arc<dyn ChatProvider>,
    transport: Arc<dyn TaskTransport>,
    settings: OrchestratorSettings,
    /// Serializes run-record read-modify-write cycles so concurrent task
    /// executors cannot lose each other's sub-status updates.
    write_lock: tokio::sync::Mutex<()>,
}

impl ReviewOrchestrator {
    /// Create an orchestrator over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runs: Arc<dyn RunStore>,
        findings: Arc<dyn FindingStore>,
        content: Arc<dyn ContentStore>,
        profiles: Arc<dyn ProfileStore>,
        context_builder: Arc<dyn ContextBuilder>,
        registry: Arc<AnalyzerRegistry>,
        provider: Arc<dyn ChatProvider>,
        transport: Arc<dyn TaskTransport>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            runs,
            findings,
            content,
            profiles,
            context_builder,
            registry,
            provider,
            transport,
            settings,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run analysis for an item under a profile.
    ///
    /// With `force` false, a successful run whose fingerprint still matches
    /// and whose age is within the profile's cache TTL is returned unchanged.
    /// Otherwise a fresh run record is created and executed in the profile's
    /// run mode. Run-level errors yield a `failed` run record, not an `Err`.
    pub async fn run(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
        actor: &str,
        force: bool,
    ) -> AppResult<AnalysisRun> {
        match self.start_run(item_ref, profile_id, actor, force).await {
            Ok(run) => Ok(run),
            Err(StartError::Fatal(e)) => Err(e),
            Err(StartError::RunLevel(message)) => {
                warn!(item = %item_ref, profile = %profile_id, error = %message, "analysis run aborted");
                let run = AnalysisRun::failed_for(item_ref, profile_id, actor, message);
                self.runs.create(&run)?;
                Ok(run)
            }
        }
    }

    /// Re-run a single analyzer.
    ///
    /// Reuses the latest run record when one exists (preserving the other
    /// analyzers' findings and resetting only the target analyzer); creates
    /// a fresh record when none exists or `force` demands a clean run.
    pub async fn run_single(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
        analyzer_id: &str,
        actor: &str,
        force: bool,
    ) -> AppResult<AnalysisRun> {
        match self
            .start_single(item_ref, profile_id, analyzer_id, actor, force)
            .await
        {
            Ok(run) => Ok(run),
            Err(StartError::Fatal(e)) => Err(e),
            Err(StartError::RunLevel(message)) => {
                warn!(item = %item_ref, profile = %profile_id, analyzer = %analyzer_id,
                      error = %message, "single-analyzer run aborted");
                let run = AnalysisRun::failed_for(item_ref, profile_id, actor, message);
                self.runs.create(&run)?;
                Ok(run)
            }
        }
    }

    async fn start_run(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
        actor: &str,
        force: bool,
    ) -> Result<AnalysisRun, StartError> {
        let profile = self.load_profile(profile_id)?;
        let item = self.load_item(item_ref)?;
        let fingerprint = self.context_builder.compute_fingerprint(&item, &profile);

        if !force {
            if let Some(latest) =
                self.runs
                    .latest(&item_ref.item_type, &item_ref.item_id, profile_id)?
            {
                if is_cache_valid(
                    &latest,
                    &fingerprint,
                    profile.execution.cache_ttl_secs,
                    Utc::now(),
                ) {
                    debug!(run = %latest.id, "reusing cached analysis run");
                    return Ok(latest);
                }
            }
        }

        let enabled = self.resolved_analyzer_ids(&profile);
        let mut run = AnalysisRun::new(&item, profile_id, fingerprint, actor, &enabled);
        run.provider_id = Some(self.provider.id().to_string());
        run.model = Some(profile.ai.model.clone());

        if enabled.is_empty() {
            // Nothing to execute; the run finalizes immediately with no findings.
            run.aggregate(&enabled);
            self.runs.create(&run)?;
            return Ok(run);
        }

        self.check_provider().await?;
        self.runs.create(&run)?;
        info!(run = %run.id, item = %item_ref, profile = %profile_id, analyzers = enabled.len(),
              "created analysis run");

        self.dispatch(run, &profile, &enabled).await
    }

    async fn start_single(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
        analyzer_id: &str,
        actor: &str,
        force: bool,
    ) -> Result<AnalysisRun, StartError> {
        let profile = self.load_profile(profile_id)?;
        let item = self.load_item(item_ref)?;

        if !profile
            .enabled_analyzers
            .iter()
            .any(|id| id == analyzer_id)
        {
            return Err(StartError::RunLevel(format!(
                "analyzer '{}' is not enabled for profile '{}'",
                analyzer_id, profile_id
            )));
        }

        // Check the provider before touching any existing record, so an
        // outage doesn't leave a reset analyzer stranded in pending.
        self.check_provider().await?;

        let latest = if force {
            None
        } else {
            self.runs
                .latest(&item_ref.item_type, &item_ref.item_id, profile_id)?
        };

        let run = match latest {
            Some(mut run) => {
                run.reset_analyzer(analyzer_id, actor);
                self.runs.save(&run)?;
                run
            }
            None => {
                let fingerprint = self.context_builder.compute_fingerprint(&item, &profile);
                let enabled = self.resolved_analyzer_ids(&profile);
                let mut run = AnalysisRun::new(&item, profile_id, fingerprint, actor, &enabled);
                run.provider_id = Some(self.provider.id().to_string());
                run.model = Some(profile.ai.model.clone());
                self.runs.create(&run)?;
                run
            }
        };

        let mode = profile
            .execution
            .run_mode
            .unwrap_or(self.settings.default_run_mode);
        match mode {
            RunMode::Sync => {
                let outcome = self.execute_one(&run, analyzer_id, 0).await;
                let run = self.record_outcome(&run.id, analyzer_id, outcome).await?;
                Ok(run)
            }
            RunMode::Deferred => {
                self.transport
                    .schedule(
                        ReviewTask::RunAnalyzer {
                            run_id: run.id.clone(),
                            item: item_ref.clone(),
                            profile_id: profile_id.to_string(),
                            analyzer_id: analyzer_id.to_string(),
                            retry_count: 0,
                        },
                        Duration::ZERO,
                    )
                    .await?;
                Ok(run)
            }
        }
    }

    async fn dispatch(
        &self,
        run: AnalysisRun,
        profile: &ReviewProfile,
        enabled: &[String],
    ) -> Result<AnalysisRun, StartError> {
        let mode = profile
            .execution
            .run_mode
            .unwrap_or(self.settings.default_run_mode);

        match mode {
            RunMode::Sync => {
                for (index, analyzer_id) in enabled.iter().enumerate() {
                    if index > 0 && profile.execution.step_delay_secs > 0 {
                        tokio::time::sleep(Duration::from_secs(profile.execution.step_delay_secs))
                            .await;
                    }
                    let outcome = self.execute_one(&run, analyzer_id, 0).await;
                    self.record_outcome(&run.id, analyzer_id, outcome).await?;
                }
                let run = self
                    .runs
                    .get(&run.id)?
                    .ok_or_else(|| AppError::not_found(format!("run {}", run.id)))?;
                Ok(run)
            }
            RunMode::Deferred => {
                // Stagger independent tasks so they don't land on the
                // provider at once; there is no ordering dependency.
                for (index, analyzer_id) in enabled.iter().enumerate() {
                    let delay =
                        Duration::from_secs(index as u64 * profile.execution.stagger_secs);
                    self.transport
                        .schedule(
                            ReviewTask::RunAnalyzer {
                                run_id: run.id.clone(),
                                item: ItemRef::new(run.item_type.clone(), run.item_id.clone()),
                                profile_id: profile.id.clone(),
                                analyzer_id: analyzer_id.clone(),
                                retry_count: 0,
                            },
                            delay,
                        )
                        .await?;
                }
                Ok(run)
            }
        }
    }

    /// Execute one analyzer with in-process backoff on transient errors.
    ///
    /// Used by the synchronous path; the deferred path re-enqueues instead
    /// of sleeping (see [`Self::handle_task`]). Both consult the same retry
    /// policy. Terminates after at most `max_retries + 1` provider attempts.
    pub async fn execute_one(
        &self,
        run: &AnalysisRun,
        analyzer_id: &str,
        retry_count: u32,
    ) -> AnalyzerOutcome {
        let mut attempt = retry_count;
        loop {
            match self.execute_attempt(run, analyzer_id).await {
                Ok(outcome) => return outcome,
                Err(failed) => {
                    let decision = failed
                        .policy
                        .as_ref()
                        .map(|p| p.evaluate(&failed.message, attempt))
                        .unwrap_or(RetryDecision::GiveUp);
                    match decision {
                        RetryDecision::Retry { delay } => {
                            warn!(run = %run.id, analyzer = %analyzer_id, attempt,
                                  delay_secs = delay.as_secs(), "transient provider error, backing off");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::GiveUp => {
                            return AnalyzerOutcome::failure(analyzer_id, failed.message);
                        }
                    }
                }
            }
        }
    }

    /// One provider attempt, with prerequisites loaded fresh.
    async fn execute_attempt(
        &self,
        run: &AnalysisRun,
        analyzer_id: &str,
    ) -> Result<AnalyzerOutcome, AttemptFailed> {
        let prepared = match self.prepare_attempt(run, analyzer_id).await? {
            Some(prepared) => prepared,
            None => {
                debug!(run = %run.id, analyzer = %analyzer_id, "item type unsupported, skipping");
                return Ok(AnalyzerOutcome::skipped());
            }
        };

        let prompt = prepared
            .analyzer
            .build_prompt(&prepared.context, &prepared.config)
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: Some(prepared.policy.clone()),
            })?;

        let response = self
            .provider
            .chat(&prompt.system, &prompt.user, &prepared.options)
            .await
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: Some(prepared.policy.clone()),
            })?;

        let findings = prepared
            .analyzer
            .parse_response(&response.content, &prepared.config)
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: Some(prepared.policy.clone()),
            })?;

        Ok(AnalyzerOutcome::success(
            findings,
            response.provider_id,
            response.model,
        ))
    }

    /// Load everything an attempt needs. `Ok(None)` means the analyzer does
    /// not support the item's type (a skip).
    async fn prepare_attempt(
        &self,
        run: &AnalysisRun,
        analyzer_id: &str,
    ) -> Result<Option<PreparedAttempt>, AttemptFailed> {
        let profile = self
            .profiles
            .get(&run.profile_id)
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: None,
            })?
            .ok_or_else(|| AttemptFailed {
                message: format!("review profile '{}' not found", run.profile_id),
                policy: None,
            })?;
        let policy = RetryPolicy::from_settings(&profile.execution);

        let item = self
            .content
            .get(&ItemRef::new(run.item_type.clone(), run.item_id.clone()))
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: Some(policy.clone()),
            })?
            .ok_or_else(|| AttemptFailed {
                message: format!("content item {}/{} not found", run.item_type, run.item_id),
                policy: Some(policy.clone()),
            })?;

        let analyzer = self.registry.get(analyzer_id).ok_or_else(|| AttemptFailed {
            message: format!("analyzer '{}' is not registered", analyzer_id),
            policy: Some(policy.clone()),
        })?;

        if !analyzer.supports(&item.item_type) {
            return Ok(None);
        }

        let context = self
            .context_builder
            .build_context(&item, &profile)
            .await
            .map_err(|e| AttemptFailed {
                message: e.to_string(),
                policy: Some(policy.clone()),
            })?;

        let options = ChatRequestOptions {
            model: Some(profile.ai.model.clone()),
            temperature: Some(profile.ai.temperature),
            max_tokens: Some(profile.ai.max_tokens),
        };

        Ok(Some(PreparedAttempt {
            config: profile.config_for(analyzer_id),
            analyzer,
            context,
            policy,
            options,
        }))
    }

    /// Persist one analyzer's outcome and finalize the run when it was the
    /// last non-terminal analyzer.
    pub async fn record_outcome(
        &self,
        run_id: &str,
        analyzer_id: &str,
        outcome: AnalyzerOutcome,
    ) -> AppResult<AnalysisRun> {
        let _guard = self.write_lock.lock().await;
        let mut run = self
            .runs
            .get(run_id)?
            .ok_or_else(|| AppError::not_found(format!("run {}", run_id)))?;

        let state = AnalyzerState {
            status: outcome.status,
            last_attempt_at: Some(Utc::now()),
            findings: outcome.findings.clone(),
            error: outcome.error.clone(),
        };
        run.record_analyzer(analyzer_id, state);
        if outcome.provider_id.is_some() {
            run.provider_id = outcome.provider_id;
        }
        if outcome.model.is_some() {
            run.model = outcome.model;
        }

        let rows: Vec<Finding> = outcome
            .findings
            .into_iter()
            .map(|f| Finding::from_reported(run_id, analyzer_id, f))
            .collect();
        self.findings.replace_for_analyzer(run_id, analyzer_id, &rows)?;

        let seeded: Vec<String> = run.analyzers.keys().cloned().collect();
        if run.all_terminal(&seeded) {
            let order = self.aggregation_order(&run, &seeded)?;
            run.aggregate(&order);
            info!(run = %run.id, max_severity = %run.max_severity(), "analysis run finalized");
        }

        self.runs.save(&run)?;
        Ok(run)
    }

    /// Single entry point for deferred tasks. Re-validates run state before
    /// acting: a task whose analyzer is already terminal no-ops, so
    /// duplicate deliveries and superseded runs are harmless.
    pub async fn handle_task(&self, task: ReviewTask) -> AppResult<()> {
        match task {
            ReviewTask::RunAnalyzers {
                item,
                profile_id,
                requested_by,
            } => {
                self.run(&item, &profile_id, &requested_by, false).await?;
                Ok(())
            }
            ReviewTask::RunAnalyzer {
                run_id,
                item,
                profile_id,
                analyzer_id,
                retry_count,
            } => {
                let run = match self.runs.get(&run_id)? {
                    Some(run) => run,
                    None => {
                        warn!(run = %run_id, "deferred task references unknown run, dropping");
                        return Ok(());
                    }
                };
                match run.analyzer_status(&analyzer_id) {
                    Some(AnalyzerStatus::Pending) => {}
                    Some(_) => {
                        debug!(run = %run_id, analyzer = %analyzer_id,
                               "analyzer already terminal, dropping task");
                        return Ok(());
                    }
                    None => {
                        warn!(run = %run_id, analyzer = %analyzer_id,
                              "analyzer not part of run, dropping task");
                        return Ok(());
                    }
                }

                match self.execute_attempt(&run, &analyzer_id).await {
                    Ok(outcome) => {
                        self.record_outcome(&run_id, &analyzer_id, outcome).await?;
                    }
                    Err(failed) => {
                        let decision = failed
                            .policy
                            .as_ref()
                            .map(|p| p.evaluate(&failed.message, retry_count))
                            .unwrap_or(RetryDecision::GiveUp);
                        match decision {
                            RetryDecision::Retry { delay } => {
                                info!(run = %run_id, analyzer = %analyzer_id, retry_count,
                                      delay_secs = delay.as_secs(),
                                      "transient provider error, re-enqueueing");
                                self.transport
                                    .schedule(
                                        ReviewTask::RunAnalyzer {
                                            run_id,
                                            item,
                                            profile_id,
                                            analyzer_id,
                                            retry_count: retry_count + 1,
                                        },
                                        delay,
                                    )
                                    .await?;
                            }
                            RetryDecision::GiveUp => {
                                let outcome =
                                    AnalyzerOutcome::failure(&analyzer_id, failed.message);
                                self.record_outcome(&run_id, &analyzer_id, outcome).await?;
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Enqueue a whole-run analysis for deferred execution.
    pub async fn schedule_run(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
        actor: &str,
        delay: Duration,
    ) -> AppResult<()> {
        self.transport
            .schedule(
                ReviewTask::RunAnalyzers {
                    item: item_ref.clone(),
                    profile_id: profile_id.to_string(),
                    requested_by: actor.to_string(),
                },
                delay,
            )
            .await
    }

    /// The latest run for an item under a profile.
    pub fn latest_run(
        &self,
        item_ref: &ItemRef,
        profile_id: &str,
    ) -> AppResult<Option<AnalysisRun>> {
        self.runs
            .latest(&item_ref.item_type, &item_ref.item_id, profile_id)
    }

    fn load_profile(&self, profile_id: &str) -> Result<ReviewProfile, StartError> {
        self.profiles
            .get(profile_id)?
            .ok_or_else(|| StartError::RunLevel(format!("review profile '{}' not found", profile_id)))
    }

    fn load_item(&self, item_ref: &ItemRef) -> Result<ContentItem, StartError> {
        self.content
            .get(item_ref)?
            .ok_or_else(|| StartError::RunLevel(format!("content item {} not found", item_ref)))
    }

    async fn check_provider(&self) -> Result<(), StartError> {
        self.provider.health_check().await.map_err(|e| {
            StartError::RunLevel(format!("inference provider unavailable: {}", e))
        })
    }

    /// Profile analyzer ids resolved against the registry, in profile order.
    fn resolved_analyzer_ids(&self, profile: &ReviewProfile) -> Vec<String> {
        self.registry
            .for_profile(profile)
            .iter()
            .map(|a| a.id().to_string())
            .collect()
    }

    /// Aggregation order: the profile's enumeration order restricted to the
    /// run's seeded analyzers, falling back to the seeded order when the
    /// profile has disappeared mid-run.
    fn aggregation_order(&self, run: &AnalysisRun, seeded: &[String]) -> AppResult<Vec<String>> {
        match self.profiles.get(&run.profile_id)? {
            Some(profile) => Ok(profile
                .enabled_analyzers
                .iter()
                .filter(|id| seeded.contains(id))
                .cloned()
                .collect()),
            None => {
                warn!(run = %run.id, profile = %run.profile_id,
                      "profile missing at finalization, using seeded analyzer order");
                Ok(seeded.to_vec())
            }
        }
    }
}
