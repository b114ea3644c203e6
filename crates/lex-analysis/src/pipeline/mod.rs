//! Pipeline module.
//!
//! This module provides the analysis pipeline, the execution coordinator and
//! progress/cancellation plumbing.

mod builder;
mod executor;
pub mod progress;

pub use builder::{AnalysisPlan, Pipeline, PipelineBuilder};
pub use executor::{CompletedTask, ExecutionCoordinator, PlannedTask};
pub use progress::{
    AnalysisStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
