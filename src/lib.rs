//! Content Review - Review Orchestration Engine
//!
//! Runs automated quality-review analyses against content items using
//! pluggable analyzers, tracks the asynchronous, partially-completable
//! execution of those checks, and uses the aggregated results to decide
//! whether a workflow transition (e.g., publish) should be blocked.
//!
//! - `models` - Run records and stored findings
//! - `services` - Orchestrator, gating engine, staleness, retry, task queue
//! - `storage` - SQLite persistence + collaborator store interfaces
//! - `utils` - Error types

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export the collaborating workspace crates.
pub use content_review_analyzers as analyzers;
pub use content_review_llm as llm;
pub use content_review_core::{
    AnalysisContext, Analyzer, AnalyzerPrompt, ContentItem, ContextBuilder, CoreError, CoreResult,
    Evidence, ItemRef, ReportedFinding, ReviewProfile, RunMode, Severity,
};

// Commonly used items
pub use models::{AnalysisRun, AnalyzerState, AnalyzerStatus, Finding, RunStatus, RunSummary};
pub use services::{
    FieldContextBuilder, GateDecision, GatingEngine, OrchestratorSettings, ReviewActor,
    ReviewOrchestrator,
};
pub use storage::{
    ContentStore, FindingStore, MemoryContentStore, ProfileStore, RunStore, SqliteFindingStore,
    SqliteRunStore, StaticProfileStore,
};
pub use utils::error::{AppError, AppResult};
