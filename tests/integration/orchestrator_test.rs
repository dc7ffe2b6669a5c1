//! Orchestrator integration tests: caching, staleness, execution modes,
//! retry bounds, finalization, and run-level failure conversion.

use std::time::Duration;

use chrono::Utc;
use content_review::analyzers::{AnalyzerRegistry, ClarityAnalyzer};
use content_review::llm::LlmError;
use content_review::services::{run_worker, InProcessTransport, ReviewTask};
use content_review::storage::{open_memory_pool, FindingStore, RunStore};
use content_review::{
    AnalyzerStatus, FieldContextBuilder, ItemRef, MemoryContentStore, OrchestratorSettings,
    ReviewOrchestrator, RunMode, RunStatus, Severity, SqliteFindingStore, SqliteRunStore,
    StaticProfileStore,
};
use std::sync::Arc;

use super::common::{
    clean_response, findings_response, harness, harness_with_registry, test_item, test_profile,
    MockProvider,
};

fn item_ref() -> ItemRef {
    ItemRef::new("article", "42")
}

#[tokio::test]
async fn test_sync_run_executes_all_analyzers_and_finalizes() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));
    h.provider
        .push_response(&findings_response("clarity", "low", "Wordy"));
    h.provider
        .push_response(&findings_response("policy", "high", "Unattributed quote"));

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(h.provider.call_count(), 2);
    assert_eq!(
        run.analyzer_status("clarity"),
        Some(AnalyzerStatus::Success)
    );
    assert_eq!(
        run.analyzer_status("policy_compliance"),
        Some(AnalyzerStatus::Success)
    );

    let summary = run.summary.unwrap();
    assert_eq!(summary.low, 1);
    assert_eq!(summary.high, 1);
    assert_eq!(summary.max_severity, Severity::High);
    assert_eq!(run.provider_id.as_deref(), Some("mock"));

    // Findings landed in the store under their analyzers.
    let stored = h.findings.list_for_run(&run.id).unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_cache_hit_returns_identical_run() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));

    let first = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();
    let calls_after_first = h.provider.call_count();

    let second = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.provider.call_count(), calls_after_first);
}

#[tokio::test]
async fn test_force_bypasses_cache() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));

    let first = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", true)
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_changed_content_forces_new_run() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));

    let first = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    // Edit the item; the fingerprint no longer matches.
    h.content
        .put(test_item("42").with_field("body", "A completely different body."));

    let second = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_expired_ttl_forces_new_run() {
    let mut profile = test_profile("editorial");
    profile.execution.cache_ttl_secs = 60;
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    let first = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    // Age the stored run past the TTL.
    let mut aged = h.runs.get(&first.id).unwrap().unwrap();
    aged.executed_at = Utc::now() - chrono::Duration::seconds(120);
    h.runs.save(&aged).unwrap();

    let second = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_zero_ttl_never_caches() {
    let mut profile = test_profile("editorial");
    profile.execution.cache_ttl_secs = 0;
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    let first = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_analyzer_failure_does_not_prevent_overall_success() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));
    h.provider.push_error(LlmError::AuthenticationFailed {
        message: "bad key".to_string(),
    });
    h.provider.push_response(&clean_response());

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    // One analyzer failed terminally, yet the run as a whole succeeded.
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.analyzer_status("clarity"), Some(AnalyzerStatus::Failed));
    assert_eq!(
        run.analyzer_status("policy_compliance"),
        Some(AnalyzerStatus::Success)
    );

    // The failure is visible as a synthetic low-severity system finding.
    let clarity_state = &run.analyzers["clarity"];
    assert_eq!(clarity_state.findings.len(), 1);
    assert_eq!(clarity_state.findings[0].category, "system");
    assert_eq!(clarity_state.findings[0].severity, Severity::Low);
    assert!(clarity_state.error.is_some());
}

#[tokio::test]
async fn test_retry_bound_is_max_retries_plus_one() {
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = vec!["clarity".to_string()];
    profile.execution.max_retries = 2;
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    // Every attempt rate-limits.
    for _ in 0..10 {
        h.provider.push_error(LlmError::RateLimited {
            message: "429 too many requests".to_string(),
            retry_after: None,
        });
    }

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 3);
    assert_eq!(run.analyzer_status("clarity"), Some(AnalyzerStatus::Failed));
    assert_eq!(run.status, RunStatus::Success);
}

#[tokio::test]
async fn test_transient_error_recovers_on_retry() {
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = vec!["clarity".to_string()];
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));
    h.provider.push_error(LlmError::RateLimited {
        message: "rate limit reached".to_string(),
        retry_after: None,
    });
    h.provider.push_response(&clean_response());

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 2);
    assert_eq!(
        run.analyzer_status("clarity"),
        Some(AnalyzerStatus::Success)
    );
}

#[tokio::test]
async fn test_deferred_mode_schedules_staggered_tasks() {
    let mut profile = test_profile("editorial");
    profile.execution.run_mode = Some(RunMode::Deferred);
    profile.execution.stagger_secs = 30;
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(h.provider.call_count(), 0);

    let tasks = h.transport.recorded();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].1, Duration::from_secs(0));
    assert_eq!(tasks[1].1, Duration::from_secs(30));
    match &tasks[0].0 {
        ReviewTask::RunAnalyzer {
            analyzer_id,
            retry_count,
            ..
        } => {
            assert_eq!(analyzer_id, "clarity");
            assert_eq!(*retry_count, 0);
        }
        other => panic!("unexpected task: {:?}", other),
    }
}

#[tokio::test]
async fn test_deferred_tasks_complete_and_finalize() {
    let mut profile = test_profile("editorial");
    profile.execution.run_mode = Some(RunMode::Deferred);
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    // Execute recorded tasks in reverse order; finalization must trigger
    // on whichever analyzer terminates last.
    let tasks = h.transport.drain();
    for (task, _) in tasks.into_iter().rev() {
        h.orchestrator.handle_task(task).await.unwrap();
    }

    let finalized = h.runs.get(&run.id).unwrap().unwrap();
    assert_eq!(finalized.status, RunStatus::Success);
    assert!(finalized.summary.is_some());
}

#[tokio::test]
async fn test_duplicate_deferred_task_noops() {
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = vec!["clarity".to_string()];
    profile.execution.run_mode = Some(RunMode::Deferred);
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    h.orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    let tasks = h.transport.drain();
    assert_eq!(tasks.len(), 1);
    let task = tasks[0].0.clone();

    h.orchestrator.handle_task(task.clone()).await.unwrap();
    let calls = h.provider.call_count();

    // At-least-once delivery: the second arrival must not re-execute.
    h.orchestrator.handle_task(task).await.unwrap();
    assert_eq!(h.provider.call_count(), calls);
}

#[tokio::test]
async fn test_deferred_rate_limit_reenqueues_with_backoff() {
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = vec!["clarity".to_string()];
    profile.execution.run_mode = Some(RunMode::Deferred);
    profile.execution.retry_base_secs = 5;
    profile.execution.retry_multiplier = 2.0;
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));
    h.provider.push_error(LlmError::RateLimited {
        message: "429 too many requests".to_string(),
        retry_after: None,
    });

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    let first_wave = h.transport.drain();
    h.orchestrator
        .handle_task(first_wave[0].0.clone())
        .await
        .unwrap();

    // The attempt rate-limited: a follow-up task carries retry_count 1 and
    // the base backoff delay, and the sub-status is still pending.
    let retries = h.transport.drain();
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].1, Duration::from_secs(5));
    match &retries[0].0 {
        ReviewTask::RunAnalyzer { retry_count, .. } => assert_eq!(*retry_count, 1),
        other => panic!("unexpected task: {:?}", other),
    }
    let pending = h.runs.get(&run.id).unwrap().unwrap();
    assert_eq!(
        pending.analyzer_status("clarity"),
        Some(AnalyzerStatus::Pending)
    );
}

#[tokio::test]
async fn test_finalization_order_permutations() {
    // Overall status must flip to success exactly when the last analyzer
    // terminates, whatever the completion order.
    for reverse in [false, true] {
        let mut profile = test_profile("editorial");
        profile.execution.run_mode = Some(RunMode::Deferred);
        let h = harness(vec![profile]);
        h.content.put(test_item("42"));

        let run = h
            .orchestrator
            .run(&item_ref(), "editorial", "amara", false)
            .await
            .unwrap();

        let mut tasks = h.transport.drain();
        if reverse {
            tasks.reverse();
        }

        let (first, _) = tasks.remove(0);
        h.orchestrator.handle_task(first).await.unwrap();
        let mid = h.runs.get(&run.id).unwrap().unwrap();
        assert_eq!(mid.status, RunStatus::Pending, "reverse={}", reverse);

        let (last, _) = tasks.remove(0);
        h.orchestrator.handle_task(last).await.unwrap();
        let done = h.runs.get(&run.id).unwrap().unwrap();
        assert_eq!(done.status, RunStatus::Success, "reverse={}", reverse);
    }
}

#[tokio::test]
async fn test_in_process_worker_drains_deferred_run() {
    let pool = open_memory_pool().unwrap();
    let runs = Arc::new(SqliteRunStore::new(pool.clone()));
    let findings = Arc::new(SqliteFindingStore::new(pool));
    let content = Arc::new(MemoryContentStore::new());
    let mut profile = test_profile("editorial");
    profile.execution.run_mode = Some(RunMode::Deferred);
    profile.execution.stagger_secs = 0;
    let profiles = Arc::new(StaticProfileStore::from_profiles(vec![profile]).unwrap());
    let provider = Arc::new(MockProvider::new());
    let (transport, rx) = InProcessTransport::channel();

    let orchestrator = Arc::new(ReviewOrchestrator::new(
        runs.clone(),
        findings,
        content.clone(),
        profiles,
        Arc::new(FieldContextBuilder::new()),
        Arc::new(AnalyzerRegistry::with_defaults()),
        provider,
        transport,
        OrchestratorSettings::default(),
    ));
    tokio::spawn(run_worker(rx, orchestrator.clone()));

    content.put(test_item("42"));
    let run = orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Pending);

    // The worker drains both analyzer tasks and the run finalizes.
    let mut finalized = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let current = runs.get(&run.id).unwrap().unwrap();
        if current.status == RunStatus::Success {
            finalized = Some(current);
            break;
        }
    }
    let finalized = finalized.expect("run should finalize via the worker");
    assert_eq!(finalized.analyzers.len(), 2);
    assert!(finalized.summary.is_some());
}

#[tokio::test]
async fn test_missing_item_yields_failed_run() {
    let h = harness(vec![test_profile("editorial")]);

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("not found"));
    assert!(run.analyzers.is_empty());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_missing_profile_yields_failed_run() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));

    let run = h
        .orchestrator
        .run(&item_ref(), "nonexistent", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_unavailable_provider_yields_failed_run() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));
    h.provider.set_unhealthy(LlmError::ProviderUnavailable {
        message: "connection refused".to_string(),
    });

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error
        .as_deref()
        .unwrap()
        .contains("provider unavailable"));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_unsupported_item_type_is_a_skip() {
    // A registry whose only analyzer is restricted to articles, applied to
    // a page: the execution skips with empty findings, not a failure.
    let mut registry = AnalyzerRegistry::new();
    registry.add_builtin(
        Arc::new(ClarityAnalyzer::new().with_item_types(vec!["article".to_string()])),
        true,
    );
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = vec!["clarity".to_string()];
    let h = harness_with_registry(vec![profile], registry);

    h.content.put(
        content_review::ContentItem::new("page", "7", "rev-1", "About us")
            .with_field("body", "Company history."),
    );

    let run = h
        .orchestrator
        .run(&ItemRef::new("page", "7"), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(h.provider.call_count(), 0);
    let state = &run.analyzers["clarity"];
    assert_eq!(state.status, AnalyzerStatus::Success);
    assert!(state.findings.is_empty());
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_run_single_preserves_other_analyzers() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));
    h.provider
        .push_response(&findings_response("clarity", "medium", "Wordy"));
    h.provider
        .push_response(&findings_response("policy", "high", "Quote"));

    let full = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();
    assert_eq!(full.status, RunStatus::Success);

    // Re-run only the clarity analyzer; this time it comes back clean.
    h.provider.push_response(&clean_response());
    let rerun = h
        .orchestrator
        .run_single(&item_ref(), "editorial", "clarity", "priya", false)
        .await
        .unwrap();

    // Same record, refreshed clarity state, preserved policy findings.
    assert_eq!(rerun.id, full.id);
    assert_eq!(rerun.status, RunStatus::Success);
    assert!(rerun.analyzers["clarity"].findings.is_empty());
    assert_eq!(rerun.analyzers["policy_compliance"].findings.len(), 1);

    let summary = rerun.summary.unwrap();
    assert_eq!(summary.high, 1);
    assert_eq!(summary.medium, 0);

    let stored = h.findings.list_for_run(&rerun.id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].analyzer_id, "policy_compliance");
}

#[tokio::test]
async fn test_run_single_without_prior_run_creates_record() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));
    h.provider.push_response(&clean_response());

    let run = h
        .orchestrator
        .run_single(&item_ref(), "editorial", "clarity", "amara", false)
        .await
        .unwrap();

    // Only the target analyzer ran; the other stays pending, so the run
    // does not finalize.
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(
        run.analyzer_status("clarity"),
        Some(AnalyzerStatus::Success)
    );
    assert_eq!(
        run.analyzer_status("policy_compliance"),
        Some(AnalyzerStatus::Pending)
    );
}

#[tokio::test]
async fn test_run_single_unknown_analyzer_fails_run_level() {
    let h = harness(vec![test_profile("editorial")]);
    h.content.put(test_item("42"));

    let run = h
        .orchestrator
        .run_single(&item_ref(), "editorial", "seo", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("seo"));
}

#[tokio::test]
async fn test_empty_analyzer_set_finalizes_immediately() {
    let mut profile = test_profile("editorial");
    profile.enabled_analyzers = Vec::new();
    let h = harness(vec![profile]);
    h.content.put(test_item("42"));

    let run = h
        .orchestrator
        .run(&item_ref(), "editorial", "amara", false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.summary.unwrap().max_severity, Severity::None);
    assert_eq!(h.provider.call_count(), 0);
}
