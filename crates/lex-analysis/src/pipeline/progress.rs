//! Progress reporting and cancellation for analysis runs.
//!
//! A run reports [`ProgressUpdate`]s to an optional [`ProgressReporter`] and
//! polls a shared [`CancellationToken`] between stages and before each task.
//!
//! ```rust,ignore
//! use lex_analysis::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let remote = token.clone();
//! std::thread::spawn(move || remote.cancel());
//!
//! match Pipeline::builder().cancellation_token(token).build()?.run(&df) {
//!     Err(e) if e.is_cancelled() => println!("cancelled"),
//!     other => println!("{:?}", other.map(|report| report.title)),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of an analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Initializing,
    Profiling,
    TaskEnumeration,
    AssumptionChecking,
    Selection,
    Execution,
    ReportAssembly,
    Complete,
    Cancelled,
    Failed,
}

impl AnalysisStage {
    /// Working stages in run order. Terminal stages are excluded.
    pub const WORKING: [AnalysisStage; 7] = [
        Self::Initializing,
        Self::Profiling,
        Self::TaskEnumeration,
        Self::AssumptionChecking,
        Self::Selection,
        Self::Execution,
        Self::ReportAssembly,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Profiling => "Profiling Columns",
            Self::TaskEnumeration => "Enumerating Tasks",
            Self::AssumptionChecking => "Checking Assumptions",
            Self::Selection => "Selecting Procedures",
            Self::Execution => "Running Analyses",
            Self::ReportAssembly => "Assembling Report",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole run spent in this stage. Working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Profiling => 0.18,
            Self::TaskEnumeration => 0.03,
            Self::AssumptionChecking => 0.12,
            Self::Selection => 0.05,
            Self::Execution => 0.50,
            Self::ReportAssembly => 0.10,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Overall progress when this stage starts.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
            stage => Self::WORKING
                .iter()
                .take_while(|s| *s != stage)
                .map(|s| s.weight())
                .sum(),
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: AnalysisStage,

    /// Finer-grained location, e.g. "Column: age" or "Task T004".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: AnalysisStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: (stage.base_progress() + stage.weight() * stage_progress).clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for the `current`-th of `total` items of a stage.
    pub fn with_items(
        stage: AnalysisStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = if total == 0 {
            0.0
        } else {
            current as f32 / total as f32
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, fraction, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(AnalysisStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(AnalysisStage::Cancelled, 0.0, "Analysis cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(AnalysisStage::Failed, 0.0, message)
    }
}

/// Receives progress updates, possibly from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag that asks a running analysis to stop.
///
/// Clones share state. A cancelled run returns a single
/// [`AnalysisError::Cancelled`](crate::error::AnalysisError::Cancelled) and
/// no partial report.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
