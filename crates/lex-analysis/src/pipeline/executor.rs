//! Execution Coordinator.
//!
//! Runs every selected task through the statistical backend and the chart
//! renderer on a scoped worker pool. Workers claim tasks from a shared cursor
//! and write each result into its own write-once slot, so results come back
//! in enumeration order whatever order the workers finish in. A failing
//! routine, or a panicking one, only fails its own task.

use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use super::progress::{AnalysisStage, CancellationToken, ProgressReporter, ProgressUpdate};
use crate::charts::{ChartData, ChartKind, ChartRenderer, FigureHandle, collapse_categories};
use crate::config::AnalysisConfig;
use crate::decisions::{GroupRoles, Procedure, SelectionDecision, SummaryStyle};
use crate::error::{AnalysisError, ExecutionFailure, FailureKind, Result};
use crate::profiler::{
    ProfiledDataset, complete_pairs, complete_rows, cross_tabulate, monthly_counts, group_by_label,
    present, monthly_means,
};
use crate::stats::{StatisticalBackend, TestInput, TestKind, TestStatistics};
use crate::types::{
    AnalysisResult, AnalysisTask, ColumnSummary, CorrelationMatrixOutput, CorrelationStrength,
    EffectMeasure, EffectSize, PcaSummary, ResultPayload, SummaryOutput, TaskStatus, TestOutcome,
};

/// A task with its selection decision, ready to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task: AnalysisTask,
    pub decision: SelectionDecision,
}

/// A task in its terminal state.
///
/// `result` is set exactly when the task was selected for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task: AnalysisTask,
    pub decision: SelectionDecision,
    pub result: Option<AnalysisResult>,
}

type TaskResult<T> = std::result::Result<T, ExecutionFailure>;

/// Executes selected tasks against a statistical backend and a chart renderer.
pub struct ExecutionCoordinator {
    config: AnalysisConfig,
    backend: Arc<dyn StatisticalBackend>,
    renderer: Arc<dyn ChartRenderer>,
}

impl ExecutionCoordinator {
    pub fn new(
        config: AnalysisConfig,
        backend: Arc<dyn StatisticalBackend>,
        renderer: Arc<dyn ChartRenderer>,
    ) -> Self {
        Self {
            config,
            backend,
            renderer,
        }
    }

    /// Execute every Selected task.
    ///
    /// Returns the tasks in input order with their terminal status, or
    /// [`AnalysisError::Cancelled`] if the token fired before all tasks ran.
    pub fn execute(
        &self,
        planned: Vec<PlannedTask>,
        data: &ProfiledDataset,
        cancel: &CancellationToken,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<Vec<CompletedTask>> {
        let runnable: Vec<(usize, &Procedure)> = planned
            .iter()
            .enumerate()
            .filter(|(_, p)| p.task.status == TaskStatus::Selected)
            .filter_map(|(i, p)| Some((i, p.decision.procedure()?)))
            .collect();
        let slots: Vec<OnceLock<AnalysisResult>> = runnable.iter().map(|_| OnceLock::new()).collect();
        let cursor = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);
        let workers = self.config.effective_workers().min(runnable.len()).max(1);

        info!(
            "Executing {} of {} task(s) on {} worker(s)",
            runnable.len(),
            planned.len(),
            workers
        );

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let claim = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some(&(index, procedure)) = runnable.get(claim) else {
                            break;
                        };
                        let item = &planned[index];
                        let result = self.run_guarded(item, procedure, data);
                        // Each claim is unique, so the slot is always empty here.
                        let _ = slots[claim].set(result);

                        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(reporter) = progress {
                            reporter.report(ProgressUpdate::with_items(
                                AnalysisStage::Execution,
                                format!("Task {}", item.task.id),
                                done,
                                runnable.len(),
                                format!("Ran {}", item.task.label()),
                            ));
                        }
                    }
                });
            }
        });

        if cancel.is_cancelled() {
            warn!("Execution cancelled after {} task(s)", finished.load(Ordering::SeqCst));
            return Err(AnalysisError::Cancelled);
        }

        let mut results: Vec<Option<AnalysisResult>> = slots.into_iter().map(OnceLock::into_inner).collect();
        let mut slot_of = vec![None; planned.len()];
        for (slot, &(index, _)) in runnable.iter().enumerate() {
            slot_of[index] = Some(slot);
        }

        planned
            .into_iter()
            .zip(slot_of)
            .map(|(PlannedTask { mut task, decision }, slot)| {
                let result = match slot {
                    Some(slot) => {
                        let result = results[slot].take().ok_or_else(|| {
                            AnalysisError::Internal(format!("task {} produced no result", task.id))
                        })?;
                        let next = if result.is_success() {
                            TaskStatus::Executed
                        } else {
                            TaskStatus::Failed
                        };
                        task.advance(next)?;
                        Some(result)
                    }
                    None => None,
                };
                Ok(CompletedTask {
                    task,
                    decision,
                    result,
                })
            })
            .collect()
    }

    fn run_guarded(
        &self,
        item: &PlannedTask,
        procedure: &Procedure,
        data: &ProfiledDataset,
    ) -> AnalysisResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_procedure(&item.task, procedure, item.decision.charts(), data)
        }))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ExecutionFailure::new(
                FailureKind::Internal,
                format!("routine panicked: {message}"),
            ))
        });

        match outcome {
            Ok(payload) => {
                debug!("Task {} executed: {}", item.task.id, procedure.display_name());
                AnalysisResult::success(&item.task, procedure.clone(), payload)
            }
            Err(failure) => {
                warn!("Task {} ({}) failed: {}", item.task.id, item.task.label(), failure);
                AnalysisResult::failure(&item.task, procedure.clone(), failure)
            }
        }
    }

    fn run_procedure(
        &self,
        task: &AnalysisTask,
        procedure: &Procedure,
        charts: &[ChartKind],
        data: &ProfiledDataset,
    ) -> TaskResult<ResultPayload> {
        let figures = Figures {
            renderer: self.renderer.as_ref(),
            task,
            charts,
        };
        let mut payload = ResultPayload::default();

        match procedure {
            Procedure::NumericSummary { style } => {
                let name = first_column(task)?;
                let values = present(numeric(data, name)?);
                let summary = data
                    .profile()
                    .column(name)
                    .and_then(|c| c.numeric())
                    .ok_or_else(|| invalid(format!("column '{name}' has no numeric summary")))?;
                payload.summary = Some(match style {
                    SummaryStyle::MeanSd => SummaryOutput::MeanSd {
                        n: summary.count,
                        mean: summary.mean,
                        std_dev: summary.std_dev,
                    },
                    SummaryStyle::MedianIqr => SummaryOutput::MedianIqr {
                        n: summary.count,
                        median: summary.median,
                        q1: summary.q1,
                        q3: summary.q3,
                        iqr: summary.iqr,
                    },
                });
                let chart_data = ChartData::Values {
                    column: name,
                    values: &values,
                };
                payload.figures = figures.render_all(chart_data)?;
            }
            Procedure::FrequencyTable => {
                let name = first_column(task)?;
                let profile = data
                    .profile()
                    .column(name)
                    .ok_or_else(|| invalid(format!("column '{name}' has no profile")))?;
                let categories = profile
                    .categorical()
                    .map(|c| c.categories.clone())
                    .ok_or_else(|| invalid(format!("column '{name}' has no category counts")))?;
                let bars = collapse_categories(&categories, self.config.max_category_bars);
                payload.figures = figures.render_all(ChartData::Frequencies {
                    column: name,
                    categories: &bars,
                })?;
                payload.summary = Some(SummaryOutput::Frequencies {
                    total: profile.non_null_count,
                    categories,
                });
            }
            Procedure::DatetimeSummary => {
                let name = first_column(task)?;
                let times = data
                    .column_data(name)
                    .and_then(|d| d.as_datetime())
                    .ok_or_else(|| invalid(format!("column '{name}' is not a datetime column")))?;
                let Some(ColumnSummary::Datetime(range)) =
                    data.profile().column(name).map(|c| &c.summary)
                else {
                    return Err(invalid(format!("column '{name}' has no date range")));
                };
                payload.summary = Some(SummaryOutput::DateRange {
                    min: range.min,
                    max: range.max,
                    range_days: range.range_days,
                });
                let counts = monthly_counts(times);
                payload.figures = figures.render_all(ChartData::MonthlyCounts {
                    column: name,
                    counts: &counts,
                })?;
            }
            Procedure::TextSummary => {
                let name = first_column(task)?;
                let Some(ColumnSummary::Text(text)) = data.profile().column(name).map(|c| &c.summary)
                else {
                    return Err(invalid(format!("column '{name}' has no text summary")));
                };
                payload.summary = Some(SummaryOutput::TopValues {
                    distinct: text.distinct_count,
                    values: text.top_values.clone(),
                });
            }
            Procedure::Correlation { method } => {
                let (x_name, y_name) = pair(task)?;
                let (x, y) = complete_pairs(numeric(data, x_name)?, numeric(data, y_name)?);
                let stats = self
                    .backend
                    .run_test(method.test_kind(), TestInput::Paired { x: &x, y: &y })?;
                payload.test = Some(self.outcome(method.test_kind(), stats, task, None));
                payload.figures = figures.render_all(ChartData::Paired {
                    x_column: x_name,
                    y_column: y_name,
                    x: &x,
                    y: &y,
                })?;
            }
            Procedure::StudentT { grouping }
            | Procedure::WelchT { grouping }
            | Procedure::OneWayAnova { grouping } => {
                let labels = labels(data, &grouping.group_column)?;
                let values = numeric(data, &grouping.value_column)?;
                let groups = group_by_label(labels, values);
                let samples: Vec<Vec<f64>> = groups.iter().map(|(_, v)| v.clone()).collect();
                let kind = procedure
                    .test_kind()
                    .ok_or_else(|| invalid("grouped comparison without a test"))?;
                let stats = self.backend.run_test(kind, TestInput::Groups(&samples))?;
                payload.test = Some(self.outcome(kind, stats, task, Some(grouping)));
                payload.figures = figures.render_all(ChartData::Grouped {
                    value_column: &grouping.value_column,
                    group_column: &grouping.group_column,
                    groups: &groups,
                })?;
            }
            Procedure::ChiSquare | Procedure::FisherExact => {
                let (row_name, col_name) = pair(task)?;
                let table = cross_tabulate(labels(data, row_name)?, labels(data, col_name)?);
                let kind = procedure
                    .test_kind()
                    .ok_or_else(|| invalid("contingency analysis without a test"))?;
                let stats = self.backend.run_test(kind, TestInput::Contingency(&table.counts))?;
                payload.test = Some(self.outcome(kind, stats, task, None));
                payload.figures = figures.render_all(ChartData::CrossTab {
                    row_column: row_name,
                    col_column: col_name,
                    row_labels: &table.row_labels,
                    col_labels: &table.col_labels,
                    counts: &table.counts,
                })?;
            }
            Procedure::TimeTrend {
                time_column,
                value_column,
            } => {
                let times = data
                    .column_data(time_column)
                    .and_then(|d| d.as_datetime())
                    .ok_or_else(|| invalid(format!("column '{time_column}' is not a datetime column")))?;
                let points = monthly_means(times, numeric(data, value_column)?);
                payload.figures = figures.render_all(ChartData::TimeSeries {
                    time_column,
                    value_column,
                    points: &points,
                })?;
            }
            Procedure::CorrelationMatrix { method, pca } => {
                let columns: Vec<&[Option<f64>]> = task
                    .columns
                    .iter()
                    .map(|name| numeric(data, name))
                    .collect::<TaskResult<_>>()?;
                let complete = complete_rows(&columns);
                let values = self.backend.correlation_matrix(*method, &complete)?;
                if *pca {
                    payload.pca = Some(self.pca_summary(&complete)?);
                }
                payload.figures = figures.render_all(ChartData::Matrix {
                    columns: &task.columns,
                    values: &values,
                })?;
                payload.correlation_matrix = Some(CorrelationMatrixOutput {
                    method: *method,
                    columns: task.columns.clone(),
                    observations: complete.first().map_or(0, Vec::len),
                    values,
                });
            }
        }

        Ok(payload)
    }

    fn pca_summary(&self, columns: &[Vec<f64>]) -> TaskResult<PcaSummary> {
        let eigenvalues = self.backend.principal_components(columns)?;
        let total: f64 = eigenvalues.iter().sum();
        let explained_variance_ratio: Vec<f64> = eigenvalues.iter().map(|v| v / total).collect();
        let cumulative_variance_ratio = explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect();
        Ok(PcaSummary {
            eigenvalues,
            explained_variance_ratio,
            cumulative_variance_ratio,
        })
    }

    fn outcome(
        &self,
        kind: TestKind,
        stats: TestStatistics,
        task: &AnalysisTask,
        grouping: Option<&GroupRoles>,
    ) -> TestOutcome {
        let measure = match kind {
            TestKind::StudentT | TestKind::WelchT => EffectMeasure::CohensD,
            TestKind::OneWayAnova => EffectMeasure::EtaSquared,
            TestKind::ChiSquare => EffectMeasure::CramersV,
            TestKind::FisherExact => EffectMeasure::OddsRatio,
            TestKind::Pearson | TestKind::Spearman => EffectMeasure::Correlation,
        };
        let strength = matches!(kind, TestKind::Pearson | TestKind::Spearman)
            .then(|| CorrelationStrength::from_coefficient(stats.statistic));
        let (null_hypothesis, alternative_hypothesis) = hypotheses(kind, task, grouping);

        TestOutcome {
            test_name: kind.display_name().to_string(),
            statistic: stats.statistic,
            p_value: stats.p_value,
            effect_size: stats.effect_size.map(|value| EffectSize { measure, value }),
            degrees_of_freedom: stats.degrees_of_freedom,
            significant: stats.p_value < self.config.alpha,
            null_hypothesis,
            alternative_hypothesis,
            strength,
            extras: stats.extras,
        }
    }
}

/// Null and alternative hypothesis texts of a test.
fn hypotheses(kind: TestKind, task: &AnalysisTask, grouping: Option<&GroupRoles>) -> (String, String) {
    let a = task.columns.first().map(String::as_str).unwrap_or_default();
    let b = task.columns.get(1).map(String::as_str).unwrap_or_default();
    let (num, cat) = grouping
        .map(|g| (g.value_column.as_str(), g.group_column.as_str()))
        .unwrap_or((a, b));

    match kind {
        TestKind::StudentT | TestKind::WelchT => (
            format!("The mean of '{num}' is equal across the two groups in '{cat}'."),
            format!("The mean of '{num}' is different across the two groups in '{cat}'."),
        ),
        TestKind::OneWayAnova => (
            format!("The mean of '{num}' is equal across all groups in '{cat}'."),
            format!("At least one group mean of '{num}' in '{cat}' is different."),
        ),
        TestKind::ChiSquare | TestKind::FisherExact => (
            format!("'{a}' and '{b}' are independent."),
            format!("'{a}' and '{b}' are not independent."),
        ),
        TestKind::Pearson | TestKind::Spearman => (
            format!("There is no correlation between '{a}' and '{b}'."),
            format!("There is a correlation between '{a}' and '{b}'."),
        ),
    }
}

/// Renders each selected chart of a task.
struct Figures<'a> {
    renderer: &'a dyn ChartRenderer,
    task: &'a AnalysisTask,
    charts: &'a [ChartKind],
}

impl Figures<'_> {
    fn render_all(&self, data: ChartData<'_>) -> TaskResult<Vec<FigureHandle>> {
        self.charts
            .iter()
            .map(|&kind| {
                let id = format!("{}_{}", self.task.id, kind.slug());
                Ok(self.renderer.render_chart(&id, kind, &data)?)
            })
            .collect()
    }
}

fn invalid(message: impl Into<String>) -> ExecutionFailure {
    ExecutionFailure::new(FailureKind::InvalidInput, message)
}

fn first_column(task: &AnalysisTask) -> TaskResult<&str> {
    task.columns
        .first()
        .map(String::as_str)
        .ok_or_else(|| invalid(format!("task {} has no columns", task.id)))
}

fn pair(task: &AnalysisTask) -> TaskResult<(&str, &str)> {
    match task.columns.as_slice() {
        [a, b] => Ok((a, b)),
        other => Err(invalid(format!(
            "task {} expects two columns, got {}",
            task.id,
            other.len()
        ))),
    }
}

fn numeric<'d>(data: &'d ProfiledDataset, name: &str) -> TaskResult<&'d [Option<f64>]> {
    data.column_data(name)
        .and_then(|d| d.as_numeric())
        .ok_or_else(|| invalid(format!("column '{name}' is not numeric")))
}

fn labels<'d>(data: &'d ProfiledDataset, name: &str) -> TaskResult<&'d [Option<String>]> {
    data.column_data(name)
        .and_then(|d| d.as_labels())
        .ok_or_else(|| invalid(format!("column '{name}' has no labels")))
}
