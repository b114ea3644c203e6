//! Rule-based test selection.

use tracing::{debug, warn};

use super::{GroupRoles, Procedure, Selection, SelectionDecision, SkipReason, SummaryStyle, TestSelector};
use crate::assumptions::AssumptionSet;
use crate::charts::ChartKind;
use crate::config::AnalysisConfig;
use crate::stats::CorrelationMethod;
use crate::types::{
    AnalysisTask, AssumptionCheck, AssumptionResult, AssumptionStatus, ColumnProfile,
    DatasetProfile, SemanticType, TaskKind,
};

/// Decision-table selector.
///
/// | Task | Columns | Assumptions | Procedure |
/// |---|---|---|---|
/// | Univariate | Numeric | normal / not | mean and sd / median and IQR |
/// | Univariate | Categorical, Ordinal, Boolean | | frequency table |
/// | Univariate | Datetime | | date range |
/// | Univariate | Text | | top values |
/// | Bivariate | Numeric × Numeric | both normal / not | Pearson / Spearman |
/// | Bivariate | Numeric × grouping, 2 groups | equal variance pass / fail | Student t / Welch t |
/// | Bivariate | Numeric × grouping, >2 groups | equal variance pass | one-way ANOVA |
/// | Bivariate | grouping × grouping | expected counts pass | chi-square |
/// | Bivariate | grouping × grouping, 2×2 | expected counts fail | Fisher exact |
/// | Bivariate | Datetime × Numeric | | trend over time |
/// | Multivariate | Numeric | all normal / not | Pearson / Spearman matrix |
///
/// Every other combination is skipped with a recorded reason.
pub struct RuleBasedSelector {
    config: AnalysisConfig,
}

/// Selection plus the rationale and consulted assumptions, before it is tied
/// to a task id.
struct Verdict {
    selection: Selection,
    rationale: Vec<String>,
    assumptions: Vec<AssumptionResult>,
}

impl Verdict {
    fn run(procedure: Procedure, charts: Vec<ChartKind>) -> Self {
        Self {
            selection: Selection::Run { procedure, charts },
            rationale: Vec::new(),
            assumptions: Vec::new(),
        }
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            selection: Selection::Skip { reason },
            rationale: Vec::new(),
            assumptions: Vec::new(),
        }
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.rationale.push(reason.into());
        self
    }

    fn consulted(mut self, result: &AssumptionResult) -> Self {
        self.rationale.push(describe(result));
        self.assumptions.push(result.clone());
        self
    }
}

fn describe(result: &AssumptionResult) -> String {
    let status = match result.status {
        AssumptionStatus::Passed => "passed",
        AssumptionStatus::Failed => "failed",
        AssumptionStatus::InsufficientData => "insufficient data",
        AssumptionStatus::SkippedByPolicy => "skipped by policy",
    };
    format!(
        "{} check on {} {}: {}",
        result.check.name(),
        result.columns.join(", "),
        status,
        result.detail
    )
}

fn ambiguity(diagnostic: impl Into<String>) -> Verdict {
    Verdict::skip(SkipReason::SelectionAmbiguity {
        diagnostic: diagnostic.into(),
    })
}

impl RuleBasedSelector {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    fn univariate(&self, column: &ColumnProfile) -> Verdict {
        match column.semantic_type {
            SemanticType::Numeric => {
                let Some(normality) = column.normality() else {
                    return ambiguity(format!("numeric column '{}' has no summary", column.name));
                };
                let style = if normality.passed() {
                    SummaryStyle::MeanSd
                } else {
                    SummaryStyle::MedianIqr
                };
                Verdict::run(
                    Procedure::NumericSummary { style },
                    vec![ChartKind::Histogram, ChartKind::BoxPlot],
                )
                .consulted(normality)
            }
            t if t.is_grouping() => Verdict::run(Procedure::FrequencyTable, vec![ChartKind::BarChart])
                .because(format!("{} column summarized by category frequencies", t)),
            SemanticType::Datetime => Verdict::run(Procedure::DatetimeSummary, vec![ChartKind::Timeline])
                .because("datetime column summarized by its range and monthly counts"),
            _ => Verdict::run(Procedure::TextSummary, Vec::new())
                .because("text column is summarized, not tested"),
        }
    }

    fn bivariate(&self, a: &ColumnProfile, b: &ColumnProfile, assumptions: &AssumptionSet) -> Verdict {
        use SemanticType::{Datetime, Numeric, Text};

        match (a.semantic_type, b.semantic_type) {
            (Numeric, Numeric) => self.numeric_pair(a, b),
            (Datetime, Numeric) | (Numeric, Datetime) => {
                let (time, value) = if a.semantic_type == Datetime { (a, b) } else { (b, a) };
                Verdict::run(
                    Procedure::TimeTrend {
                        time_column: time.name.clone(),
                        value_column: value.name.clone(),
                    },
                    vec![ChartKind::LineChart],
                )
                .because(format!("'{}' plotted over '{}'; no test applies", value.name, time.name))
            }
            (Datetime, other) | (other, Datetime) if other != Text => {
                Verdict::skip(SkipReason::NoApplicableProcedure {
                    signature: format!("{} × {}", a.semantic_type, b.semantic_type),
                })
            }
            (x, y) if x.is_grouping() && y.is_grouping() => self.grouping_pair(assumptions),
            _ => match GroupRoles::resolve(a, b) {
                Some(roles) => self.grouped_numeric(roles, assumptions),
                None => ambiguity(format!(
                    "no decision-table row for {} × {}",
                    a.semantic_type, b.semantic_type
                )),
            },
        }
    }

    fn numeric_pair(&self, a: &ColumnProfile, b: &ColumnProfile) -> Verdict {
        let (Some(na), Some(nb)) = (a.normality(), b.normality()) else {
            return ambiguity("numeric pair without normality results");
        };
        let method = if na.passed() && nb.passed() {
            CorrelationMethod::Pearson
        } else {
            CorrelationMethod::Spearman
        };
        Verdict::run(Procedure::Correlation { method }, vec![ChartKind::ScatterPlot])
            .consulted(na)
            .consulted(nb)
    }

    fn grouped_numeric(&self, roles: GroupRoles, assumptions: &AssumptionSet) -> Verdict {
        let Some(equal_variance) = assumptions.get(AssumptionCheck::EqualVariance) else {
            return ambiguity(format!(
                "no equal-variance result for '{}' by '{}'",
                roles.value_column, roles.group_column
            ));
        };
        let groups = assumptions.group_count.unwrap_or(0);
        let grouping = format!(
            "'{}' is the grouping variable with {groups} group(s)",
            roles.group_column
        );
        let charts = vec![ChartKind::GroupedBoxPlot];

        if groups < 2 {
            return Verdict::skip(SkipReason::InsufficientData {
                detail: format!("'{}' has fewer than two non-empty groups", roles.group_column),
            })
            .because(grouping)
            .consulted(equal_variance);
        }

        let verdict = match (groups, equal_variance.status) {
            (2, AssumptionStatus::Passed) => {
                Verdict::run(Procedure::StudentT { grouping: roles }, charts)
            }
            (2, AssumptionStatus::Failed) => Verdict::run(Procedure::WelchT { grouping: roles }, charts),
            (_, AssumptionStatus::Passed) => {
                Verdict::run(Procedure::OneWayAnova { grouping: roles }, charts)
            }
            (_, AssumptionStatus::Failed) => Verdict::skip(SkipReason::AssumptionUnmet {
                check: AssumptionCheck::EqualVariance,
                detail: equal_variance.detail.clone(),
            }),
            (_, AssumptionStatus::InsufficientData | AssumptionStatus::SkippedByPolicy) => {
                Verdict::skip(SkipReason::InsufficientData {
                    detail: equal_variance.detail.clone(),
                })
            }
        };
        verdict.because(grouping).consulted(equal_variance)
    }

    fn grouping_pair(&self, assumptions: &AssumptionSet) -> Verdict {
        let Some(expected) = assumptions.get(AssumptionCheck::MinExpectedCount) else {
            return ambiguity("no expected-count result for categorical pair");
        };
        let charts = vec![ChartKind::StackedBar];

        let verdict = match expected.status {
            AssumptionStatus::Passed => Verdict::run(Procedure::ChiSquare, charts),
            AssumptionStatus::Failed => match assumptions.table_shape {
                Some((2, 2)) => Verdict::run(Procedure::FisherExact, charts)
                    .because("2×2 table: exact test replaces chi-square"),
                shape => Verdict::skip(SkipReason::InsufficientExpectedCounts {
                    min_expected: expected.statistic.unwrap_or(0.0),
                    threshold: self.config.min_expected_cell_count,
                    table_shape: shape.unwrap_or((0, 0)),
                }),
            },
            AssumptionStatus::InsufficientData | AssumptionStatus::SkippedByPolicy => {
                Verdict::skip(SkipReason::InsufficientData {
                    detail: expected.detail.clone(),
                })
            }
        };
        verdict.consulted(expected)
    }

    fn multivariate(&self, columns: &[&ColumnProfile]) -> Verdict {
        let normality: Vec<&AssumptionResult> = columns.iter().filter_map(|c| c.normality()).collect();
        if normality.len() != columns.len() {
            return ambiguity("multivariate group contains a column without normality results");
        }
        let method = if normality.iter().all(|r| r.passed()) {
            CorrelationMethod::Pearson
        } else {
            CorrelationMethod::Spearman
        };
        let mut verdict = Verdict::run(
            Procedure::CorrelationMatrix {
                method,
                pca: self.config.include_pca,
            },
            vec![ChartKind::Heatmap],
        )
        .because(format!(
            "{} numeric columns; {} correlation {}",
            columns.len(),
            method.display_name(),
            if method == CorrelationMethod::Pearson {
                "since every column passed normality"
            } else {
                "since at least one column is not normal"
            }
        ));
        for result in normality {
            verdict.assumptions.push(result.clone());
        }
        verdict
    }
}

impl TestSelector for RuleBasedSelector {
    fn select(
        &self,
        task: &AnalysisTask,
        profile: &DatasetProfile,
        assumptions: &AssumptionSet,
    ) -> SelectionDecision {
        let columns: Vec<&ColumnProfile> = task
            .columns
            .iter()
            .filter_map(|name| profile.column(name))
            .collect();

        let verdict = if columns.len() != task.columns.len() {
            ambiguity(format!("task {} references a column without a profile", task.id))
        } else {
            match (task.kind, columns.as_slice()) {
                (TaskKind::Univariate, [column]) => self.univariate(column),
                (TaskKind::Bivariate, [a, b]) => self.bivariate(a, b, assumptions),
                (TaskKind::Multivariate, cols) if cols.len() >= 2 => self.multivariate(cols),
                (kind, cols) => ambiguity(format!(
                    "{} task with {} column(s)",
                    kind.display_name(),
                    cols.len()
                )),
            }
        };

        match &verdict.selection {
            Selection::Run { procedure, .. } => {
                debug!("Task {} ({}): {}", task.id, task.label(), procedure.display_name());
            }
            Selection::Skip {
                reason: reason @ SkipReason::SelectionAmbiguity { .. },
            } => {
                warn!("Task {} ({}) skipped: {}", task.id, task.label(), reason);
            }
            Selection::Skip { reason } => {
                debug!("Task {} ({}) skipped: {}", task.id, task.label(), reason);
            }
        }

        SelectionDecision {
            task_id: task.id,
            selection: verdict.selection,
            rationale: verdict.rationale,
            assumptions: verdict.assumptions,
        }
    }
}
