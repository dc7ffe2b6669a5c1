//! Shared test harness: scripted mock provider, recording task transport,
//! and a fully wired orchestrator over in-memory stores.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use content_review::analyzers::AnalyzerRegistry;
use content_review::llm::{
    ChatProvider, ChatRequestOptions, ChatResponse, LlmError, LlmResult, ProviderConfig,
};
use content_review::services::{
    GatingEngine, OrchestratorSettings, ReviewTask, StaticTransitionOracle, TaskTransport,
};
use content_review::storage::{open_memory_pool, SqliteFindingStore, SqliteRunStore};
use content_review::{
    AppResult, ContentItem, FieldContextBuilder, MemoryContentStore, ReviewOrchestrator,
    ReviewProfile, StaticProfileStore,
};

/// Scripted chat provider. Responses are consumed in order; when the script
/// runs out, every further call returns an empty findings envelope.
pub struct MockProvider {
    config: ProviderConfig,
    responses: Mutex<VecDeque<LlmResult<String>>>,
    calls: AtomicU32,
    health_error: Mutex<Option<LlmError>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::for_model("mock-model"),
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            health_error: Mutex::new(None),
        }
    }

    /// Queue a successful response.
    pub fn push_response(&self, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(body.to_string()));
    }

    /// Queue an error response.
    pub fn push_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Make health checks fail.
    pub fn set_unhealthy(&self, error: LlmError) {
        *self.health_error.lock().unwrap() = Some(error);
    }

    /// Number of chat calls served so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        _system: &str,
        _user: &str,
        options: &ChatRequestOptions,
    ) -> LlmResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                provider_id: "mock".to_string(),
                model: options
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.model.clone()),
            }),
            Some(Err(e)) => Err(e),
            None => Ok(ChatResponse {
                content: r#"{"findings": []}"#.to_string(),
                provider_id: "mock".to_string(),
                model: self.config.model.clone(),
            }),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        match self.health_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Transport that records scheduled tasks without executing them.
pub struct RecordingTransport {
    tasks: Mutex<Vec<(ReviewTask, Duration)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<(ReviewTask, Duration)> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn drain(&self) -> Vec<(ReviewTask, Duration)> {
        std::mem::take(&mut *self.tasks.lock().unwrap())
    }
}

#[async_trait]
impl TaskTransport for RecordingTransport {
    async fn schedule(&self, task: ReviewTask, delay: Duration) -> AppResult<()> {
        self.tasks.lock().unwrap().push((task, delay));
        Ok(())
    }
}

/// Everything a test needs, fully wired over in-memory storage.
pub struct Harness {
    pub orchestrator: ReviewOrchestrator,
    pub gating: GatingEngine,
    pub runs: Arc<SqliteRunStore>,
    pub findings: Arc<SqliteFindingStore>,
    pub content: Arc<MemoryContentStore>,
    pub provider: Arc<MockProvider>,
    pub transport: Arc<RecordingTransport>,
    pub context_builder: Arc<FieldContextBuilder>,
}

/// A profile with both built-in analyzers, fast retry timing, and gating on
/// the publish transition.
pub fn test_profile(id: &str) -> ReviewProfile {
    let mut profile = ReviewProfile::new(
        id,
        vec!["clarity".to_string(), "policy_compliance".to_string()],
    );
    profile.execution.step_delay_secs = 0;
    profile.execution.retry_base_secs = 0;
    profile.execution.max_retries = 2;
    profile.gating.blocked_transitions = vec!["publish".to_string()];
    profile
}

/// A sample article with body text.
pub fn test_item(item_id: &str) -> ContentItem {
    ContentItem::new("article", item_id, "rev-1", "Launch post")
        .with_field("body", "We are excited to announce the launch.")
        .with_meta("author", "amara")
}

/// Build a harness around the given profiles, using the default analyzer
/// registry.
pub fn harness(profiles: Vec<ReviewProfile>) -> Harness {
    harness_with_registry(profiles, AnalyzerRegistry::with_defaults())
}

/// Build a harness with a custom analyzer registry.
pub fn harness_with_registry(
    profiles: Vec<ReviewProfile>,
    registry: AnalyzerRegistry,
) -> Harness {
    let pool = open_memory_pool().expect("memory pool");
    let runs = Arc::new(SqliteRunStore::new(pool.clone()));
    let findings = Arc::new(SqliteFindingStore::new(pool));
    let content = Arc::new(MemoryContentStore::new());
    let profile_store =
        Arc::new(StaticProfileStore::from_profiles(profiles).expect("valid profiles"));
    let context_builder = Arc::new(FieldContextBuilder::new());
    let provider = Arc::new(MockProvider::new());
    let transport = Arc::new(RecordingTransport::new());

    let orchestrator = ReviewOrchestrator::new(
        runs.clone(),
        findings.clone(),
        content.clone(),
        profile_store.clone(),
        context_builder.clone(),
        Arc::new(registry),
        provider.clone(),
        transport.clone(),
        OrchestratorSettings::default(),
    );

    let oracle = Arc::new(
        StaticTransitionOracle::new()
            .with_transition("article", "draft", "published", "publish")
            .with_transition("article", "draft", "archived", "archive"),
    );
    let gating = GatingEngine::new(
        runs.clone(),
        findings.clone(),
        context_builder.clone(),
        oracle,
    );

    Harness {
        orchestrator,
        gating,
        runs,
        findings,
        content,
        provider,
        transport,
        context_builder,
    }
}

/// A findings envelope with one finding of the given severity.
pub fn findings_response(category: &str, severity: &str, title: &str) -> String {
    format!(
        r#"{{"findings": [{{"category": "{}", "severity": "{}", "title": "{}",
            "explanation": "explanation", "evidence": {{"sourceField": "body", "excerpt": "excerpt"}}}}]}}"#,
        category, severity, title
    )
}

/// The empty findings envelope.
pub fn clean_response() -> String {
    r#"{"findings": []}"#.to_string()
}
