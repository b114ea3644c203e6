//! Exploratory Data Analysis Planning Library
//!
//! A rule-based engine that decides which analyses a tabular dataset calls
//! for, built with Rust and Polars.
//!
//! # Overview
//!
//! Given a cleaned dataset, the engine:
//!
//! - **Profiles** every column: semantic type, missingness, cardinality and descriptive statistics
//! - **Enumerates** univariate, bivariate and multivariate analysis tasks in a fixed order
//! - **Checks assumptions** (normality, equal variance, expected cell counts) per task
//! - **Selects** one test or summary and its charts per task from a closed decision table
//! - **Executes** the selected procedures on a worker pool, capturing per-task failures
//! - **Assembles** a renderer-agnostic report model with narrative and notes
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_analysis::{AnalysisConfig, Pipeline};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("survey.csv".into()))?
//!     .finish()?;
//!
//! let config = AnalysisConfig::builder()
//!     .alpha(0.01)
//!     .type_override("satisfaction", SemanticType::Ordinal)
//!     .build()?;
//!
//! let report = Pipeline::builder().config(config).build()?.run(&df)?;
//! println!("{}", report.outline());
//! ```
//!
//! # Boundaries
//!
//! Statistical routines sit behind [`stats::StatisticalBackend`] and chart
//! production behind [`charts::ChartRenderer`]. The defaults,
//! [`NativeBackend`] and [`ChartSpecRenderer`], can be replaced through the
//! [`PipelineBuilder`].
//!
//! # Progress Reporting
//!
//! ```rust,ignore
//! use lex_analysis::{AnalysisError, CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let result = Pipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message))
//!     .build()?
//!     .run(&df);
//!
//! match result {
//!     Ok(report) => println!("{} sections", report.root.children.len()),
//!     Err(AnalysisError::Cancelled) => println!("Cancelled by user"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod assumptions;
pub mod charts;
pub mod config;
pub mod decisions;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod profiler;
pub mod reporting;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use assumptions::{AssumptionChecker, AssumptionSet};
pub use charts::{ChartKind, ChartRenderer, ChartSpecRenderer, FigureHandle};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError};
pub use decisions::{Procedure, RuleBasedSelector, Selection, SelectionDecision, SkipReason, TestSelector};
pub use error::{AnalysisError, ExecutionFailure, FailureKind, ProfilingError, Result, ResultExt};
pub use pipeline::{
    AnalysisPlan, AnalysisStage, CancellationToken, ClosureProgressReporter, CompletedTask,
    Pipeline, PipelineBuilder, PlannedTask, ProgressReporter, ProgressUpdate,
};
pub use planner::TaskEnumerator;
pub use profiler::{DataProfiler, ProfiledDataset};
pub use reporting::{ReportAssembler, ReportModel, ReportWriter, Section};
pub use stats::{NativeBackend, StatisticalBackend};
pub use types::{
    AnalysisResult, AnalysisTask, AssumptionCheck, AssumptionResult, AssumptionStatus,
    ColumnProfile, DatasetProfile, SemanticType, TaskId, TaskKind, TaskStatus,
};
