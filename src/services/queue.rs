//! Deferred Task Queue
//!
//! Typed task payloads for deferred analyzer execution, the transport
//! abstraction that schedules them, and an in-process tokio transport for
//! embedding and tests. Delivery is at-least-once with no ordering
//! guarantee; the single task-handling entry point on the orchestrator
//! re-validates run state before acting, so duplicate or superseded tasks
//! no-op.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use content_review_core::ItemRef;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::services::orchestrator::ReviewOrchestrator;
use crate::utils::error::{AppError, AppResult};

/// A deferred unit of review work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewTask {
    /// Run the whole analyzer set for an item under a profile
    RunAnalyzers {
        /// Target item
        item: ItemRef,
        /// Profile id
        profile_id: String,
        /// Actor recorded on the resulting run
        requested_by: String,
    },
    /// Execute one analyzer of an existing run
    RunAnalyzer {
        /// Run the execution belongs to
        run_id: String,
        /// Target item
        item: ItemRef,
        /// Profile id
        profile_id: String,
        /// Analyzer to execute
        analyzer_id: String,
        /// Zero-based retry attempt this delivery represents
        retry_count: u32,
    },
}

/// A task with its earliest allowed execution time.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// The task payload
    pub task: ReviewTask,
    /// Do not execute before this instant
    pub not_before: DateTime<Utc>,
}

/// Transport that delivers tasks after a delay.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// Schedule a task for delivery after `delay`.
    async fn schedule(&self, task: ReviewTask, delay: Duration) -> AppResult<()>;
}

/// In-process transport over a tokio channel. Pair it with [`run_worker`]
/// to execute tasks on the same runtime.
pub struct InProcessTransport {
    tx: mpsc::UnboundedSender<ScheduledTask>,
}

impl InProcessTransport {
    /// Create a transport and the receiver end for a worker.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<ScheduledTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl TaskTransport for InProcessTransport {
    async fn schedule(&self, task: ReviewTask, delay: Duration) -> AppResult<()> {
        let scheduled = ScheduledTask {
            task,
            not_before: Utc::now()
                + chrono::Duration::from_std(delay)
                    .unwrap_or_else(|_| chrono::Duration::seconds(0)),
        };
        self.tx
            .send(scheduled)
            .map_err(|_| AppError::internal("task queue receiver dropped"))?;
        Ok(())
    }
}

/// Consume scheduled tasks, spawning one tokio task per delivery so that
/// independent analyzer executions run concurrently after their delays.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<ScheduledTask>,
    orchestrator: Arc<ReviewOrchestrator>,
) {
    while let Some(scheduled) = rx.recv().await {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let wait = (scheduled.not_before - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            debug!(task = ?scheduled.task, "executing deferred task");
            if let Err(e) = orchestrator.handle_task(scheduled.task).await {
                error!(error = %e, "deferred task failed");
            }
        });
    }
}
