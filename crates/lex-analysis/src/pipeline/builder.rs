//! Main analysis pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating a run: profile, enumerate, check assumptions, select,
//! execute, assemble.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::assumptions::AssumptionChecker;
use crate::charts::{ChartRenderer, ChartSpecRenderer};
use crate::config::{AnalysisConfig, ConfigValidationError};
use crate::decisions::{RuleBasedSelector, TestSelector};
use crate::error::{AnalysisError, Result};
use crate::pipeline::executor::{ExecutionCoordinator, PlannedTask};
use crate::pipeline::progress::{
    AnalysisStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::planner::TaskEnumerator;
use crate::profiler::{DataProfiler, ProfiledDataset};
use crate::reporting::{ReportAssembler, ReportModel};
use crate::stats::{NativeBackend, StatisticalBackend};
use crate::types::{DatasetProfile, TaskStatus};

const DEFAULT_TITLE: &str = "Exploratory Data Analysis Report";

/// Profiles, tasks and selection decisions of a run, without execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    pub profile: DatasetProfile,
    pub tasks: Vec<PlannedTask>,
}

impl AnalysisPlan {
    pub fn selected_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|p| p.task.status == TaskStatus::Selected)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|p| p.task.status == TaskStatus::Skipped)
            .count()
    }
}

/// The main analysis pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_analysis::{AnalysisConfig, CancellationToken, Pipeline};
///
/// let token = CancellationToken::new();
///
/// let report = Pipeline::builder()
///     .config(AnalysisConfig::builder().alpha(0.01).build()?)
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(&dataframe)?;
///
/// println!("{}", report.outline());
/// ```
pub struct Pipeline {
    config: AnalysisConfig,
    title: String,
    backend: Arc<dyn StatisticalBackend>,
    renderer: Arc<dyn ChartRenderer>,
    selector: Arc<dyn TestSelector>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

// A pipeline may be built on one thread and run on another.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full analysis and assemble the report model.
    ///
    /// # Errors
    ///
    /// Returns `Err(AnalysisError::Cancelled)` if the run was cancelled via
    /// the cancellation token; no partial report is returned in that case.
    /// Structural dataset problems (no rows, no usable column) also abort.
    pub fn run(&self, df: &DataFrame) -> Result<ReportModel> {
        self.finish(self.run_internal(df), "Analysis completed successfully")
    }

    /// Profile, enumerate and select without executing anything.
    pub fn plan(&self, df: &DataFrame) -> Result<AnalysisPlan> {
        let planned = self.prepare(df).map(|(data, tasks)| AnalysisPlan {
            profile: data.into_profile(),
            tasks,
        });
        self.finish(planned, "Planning completed")
    }

    fn finish<T>(&self, outcome: Result<T>, message: &str) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.report_progress(ProgressUpdate::complete(message));
                Ok(value)
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!("Analysis cancelled");
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    error!("Analysis error: {}", e);
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, df: &DataFrame) -> Result<ReportModel> {
        let start_time = Instant::now();
        let (data, planned) = self.prepare(df)?;

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Execution,
            0.0,
            "Running selected analyses...",
        ));
        info!("Step 5: Executing selected tasks...");
        let coordinator = ExecutionCoordinator::new(
            self.config.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&self.renderer),
        );
        let completed = coordinator.execute(
            planned,
            &data,
            &self.cancellation_token,
            self.progress_reporter.as_deref(),
        )?;

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::ReportAssembly,
            0.0,
            "Assembling report...",
        ));
        info!("Step 6: Assembling report model...");
        let report = ReportAssembler::new(self.title.clone(), self.config.alpha)
            .assemble(data.profile(), &completed);

        info!(
            "Analysis finished in {} ms",
            start_time.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Stages shared by [`run`](Self::run) and [`plan`](Self::plan).
    fn prepare(&self, df: &DataFrame) -> Result<(ProfiledDataset, Vec<PlannedTask>)> {
        info!(
            "Starting analysis of {} rows x {} columns (backend: {})",
            df.height(),
            df.width(),
            self.backend.name()
        );
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Initializing,
            0.0,
            "Starting analysis...",
        ));
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Profiling,
            0.0,
            "Profiling columns...",
        ));
        info!("Step 1: Profiling columns...");
        let data = DataProfiler::new(self.config.clone(), Arc::clone(&self.backend)).profile(df)?;
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::TaskEnumeration,
            0.0,
            "Enumerating tasks...",
        ));
        info!("Step 2: Enumerating tasks...");
        let tasks = TaskEnumerator::new(self.config.clone()).enumerate(data.profile());
        self.check_cancelled()?;

        info!("Step 3: Checking assumptions...");
        let checker = AssumptionChecker::new(self.config.clone(), Arc::clone(&self.backend));
        for (i, task) in tasks.iter().enumerate() {
            self.check_cancelled()?;
            checker.check(task, &data);
            self.report_progress(ProgressUpdate::with_items(
                AnalysisStage::AssumptionChecking,
                format!("Task {}", task.id),
                i + 1,
                tasks.len(),
                format!("Checked assumptions for {}", task.label()),
            ));
        }

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Selection,
            0.0,
            "Selecting procedures...",
        ));
        info!("Step 4: Selecting procedures...");
        let mut planned = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            let assumptions = checker.check(&task, &data);
            let decision = self.selector.select(&task, data.profile(), &assumptions);
            match decision.skip_reason() {
                Some(reason) => {
                    debug!("Task {} skipped: {}", task.id, reason);
                    task.advance(TaskStatus::Skipped)?;
                }
                None => task.advance(TaskStatus::Selected)?,
            }
            planned.push(PlannedTask { task, decision });
        }

        let skipped = planned
            .iter()
            .filter(|p| p.task.status == TaskStatus::Skipped)
            .count();
        info!(
            "Selected {} task(s), skipped {}",
            planned.len() - skipped,
            skipped
        );
        Ok((data, planned))
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started. Unset parts fall back to
/// [`AnalysisConfig::default()`], [`NativeBackend`], an in-memory
/// [`ChartSpecRenderer`] and the [`RuleBasedSelector`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<AnalysisConfig>,
    title: Option<String>,
    backend: Option<Arc<dyn StatisticalBackend>>,
    renderer: Option<Arc<dyn ChartRenderer>>,
    selector: Option<Arc<dyn TestSelector>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the analysis configuration.
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the report title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the statistical backend.
    pub fn backend(mut self, backend: Arc<dyn StatisticalBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the chart renderer.
    pub fn renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the test selector.
    pub fn selector(mut self, selector: Arc<dyn TestSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// Updates from the execution stage arrive from worker threads.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the run.
    ///
    /// Clone the token and call [`CancellationToken::cancel()`] from any
    /// thread. The pipeline checks it between stages and before every task
    /// and returns [`AnalysisError::Cancelled`].
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let selector = self
            .selector
            .unwrap_or_else(|| Arc::new(RuleBasedSelector::new(config.clone())));

        Ok(Pipeline {
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            backend: self.backend.unwrap_or_else(|| Arc::new(NativeBackend)),
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(ChartSpecRenderer::new())),
            selector,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            config,
        })
    }
}
