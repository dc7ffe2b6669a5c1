//! Services
//!
//! Business logic of the review engine: context building, staleness and
//! cache evaluation, retry policy, the execution orchestrator, the deferred
//! task queue, and the gating decision engine.

pub mod context_builder;
pub mod gating;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod staleness;

pub use context_builder::FieldContextBuilder;
pub use gating::{GateDecision, GatingEngine, ReviewActor, StaticTransitionOracle, TransitionOracle};
pub use orchestrator::{AnalyzerOutcome, OrchestratorSettings, ReviewOrchestrator};
pub use queue::{run_worker, InProcessTransport, ReviewTask, ScheduledTask, TaskTransport};
pub use retry::{is_rate_limit_error, RetryDecision, RetryPolicy};
pub use staleness::{is_cache_valid, is_stale};
