use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::charts::FigureHandle;
use crate::decisions::Procedure;
use crate::error::{AnalysisError, ExecutionFailure, ProfilingError};

// ============================================================================
// Column profiles
// ============================================================================

/// Inferred statistical role of a column, distinct from its storage dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Ordinal,
    Datetime,
    Boolean,
    Text,
}

impl SemanticType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Categorical => "Categorical",
            Self::Ordinal => "Ordinal",
            Self::Datetime => "Datetime",
            Self::Boolean => "Boolean",
            Self::Text => "Text",
        }
    }

    /// Categorical, Ordinal and Boolean columns all group observations by label.
    pub fn is_grouping(&self) -> bool {
        matches!(self, Self::Categorical | Self::Ordinal | Self::Boolean)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Named statistical precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionCheck {
    Normality,
    EqualVariance,
    MinExpectedCount,
}

impl AssumptionCheck {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normality => "normality",
            Self::EqualVariance => "equal_variance",
            Self::MinExpectedCount => "min_expected_count",
        }
    }
}

/// Outcome of an assumption check.
///
/// Only `Passed` counts as a pass. `InsufficientData` and `SkippedByPolicy`
/// are recorded reasons, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionStatus {
    Passed,
    Failed,
    InsufficientData,
    SkippedByPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionResult {
    pub check: AssumptionCheck,
    /// Columns the check was evaluated on, in task order.
    pub columns: Vec<String>,
    pub status: AssumptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub detail: String,
}

impl AssumptionResult {
    pub fn new(
        check: AssumptionCheck,
        columns: Vec<String>,
        status: AssumptionStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            check,
            columns,
            status,
            statistic: None,
            p_value: None,
            detail: detail.into(),
        }
    }

    pub fn with_statistic(mut self, statistic: f64, p_value: Option<f64>) -> Self {
        self.statistic = Some(statistic);
        self.p_value = p_value;
        self
    }

    pub fn passed(&self) -> bool {
        self.status == AssumptionStatus::Passed
    }
}

/// Descriptive statistics of a Numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub p10: f64,
    pub p90: f64,
    /// Values outside the Tukey fences.
    pub outlier_count: usize,
    pub near_zero_variance: bool,
    pub normality: AssumptionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

/// Frequency information for Categorical, Ordinal and Boolean columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    /// Sorted by descending count, ties broken by label.
    pub categories: Vec<CategoryCount>,
    pub most_frequent: Option<String>,
    /// More than half of the rows carry a distinct value.
    pub high_cardinality: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeSummary {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
    pub range_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub distinct_count: usize,
    pub avg_length: f64,
    pub top_values: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Datetime(DatetimeSummary),
    Text(TextSummary),
}

/// Profile of one usable column. Created once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Position in the source dataset.
    pub index: usize,
    pub semantic_type: SemanticType,
    /// Storage dtype as reported by polars.
    pub dtype: String,
    /// Number of distinct non-null values.
    pub cardinality: usize,
    pub non_null_count: usize,
    pub missing_count: usize,
    pub missing_ratio: f64,
    pub sample_values: Vec<String>,
    pub summary: ColumnSummary,
}

impl ColumnProfile {
    pub fn numeric(&self) -> Option<&NumericSummary> {
        match &self.summary {
            ColumnSummary::Numeric(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn categorical(&self) -> Option<&CategoricalSummary> {
        match &self.summary {
            ColumnSummary::Categorical(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn is_near_zero_variance(&self) -> bool {
        self.numeric().is_some_and(|s| s.near_zero_variance)
    }

    /// Normality outcome for Numeric columns; `None` for every other type.
    pub fn normality(&self) -> Option<&AssumptionResult> {
        self.numeric().map(|s| &s.normality)
    }
}

/// A column that could not be profiled, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusableColumn {
    pub name: String,
    pub index: usize,
    pub error: ProfilingError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    /// Usable columns in dataset order.
    pub columns: Vec<ColumnProfile>,
    pub unusable: Vec<UnusableColumn>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn usable_count(&self) -> usize {
        self.columns.len()
    }

    pub fn count_of(&self, semantic_type: SemanticType) -> usize {
        self.columns
            .iter()
            .filter(|c| c.semantic_type == semantic_type)
            .count()
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Position of a task in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:03}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Univariate,
    Bivariate,
    Multivariate,
}

impl TaskKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Univariate => "Univariate",
            Self::Bivariate => "Bivariate",
            Self::Multivariate => "Multivariate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Selected,
    Executed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Pending -> Selected | Skipped, Selected -> Executed | Failed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Selected)
                | (Self::Pending, Self::Skipped)
                | (Self::Selected, Self::Executed)
                | (Self::Selected, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Skipped)
    }
}

/// One unit of analysis over specific columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Involved columns in dataset order.
    pub columns: Vec<String>,
    pub status: TaskStatus,
}

impl AnalysisTask {
    pub fn new(id: TaskId, kind: TaskKind, columns: Vec<String>) -> Self {
        Self {
            id,
            kind,
            columns,
            status: TaskStatus::Pending,
        }
    }

    /// Move the task to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), AnalysisError> {
        if !self.status.can_transition_to(next) {
            return Err(AnalysisError::Internal(format!(
                "task {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn label(&self) -> String {
        match self.kind {
            TaskKind::Bivariate => self.columns.join(" × "),
            TaskKind::Multivariate => format!("{} numeric columns", self.columns.len()),
            TaskKind::Univariate => self.columns.join(", "),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMeasure {
    CohensD,
    EtaSquared,
    CramersV,
    OddsRatio,
    Correlation,
}

impl EffectMeasure {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CohensD => "Cohen's d",
            Self::EtaSquared => "eta-squared",
            Self::CramersV => "Cramér's V",
            Self::OddsRatio => "odds ratio",
            Self::Correlation => "correlation coefficient",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub measure: EffectMeasure,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    /// Strong above 0.7, Moderate above 0.3, otherwise Weak.
    pub fn from_coefficient(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude > 0.7 {
            Self::Strong
        } else if magnitude > 0.3 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

/// Output of a hypothesis test or correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_name: String,
    pub statistic: f64,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_size: Option<EffectSize>,
    /// Degrees of freedom; ANOVA reports (between, within).
    pub degrees_of_freedom: Vec<f64>,
    pub significant: bool,
    pub null_hypothesis: String,
    pub alternative_hypothesis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<CorrelationStrength>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub extras: BTreeMap<String, f64>,
}

/// Descriptive output of a univariate procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum SummaryOutput {
    MeanSd {
        n: usize,
        mean: f64,
        std_dev: f64,
    },
    MedianIqr {
        n: usize,
        median: f64,
        q1: f64,
        q3: f64,
        iqr: f64,
    },
    Frequencies {
        total: usize,
        categories: Vec<CategoryCount>,
    },
    DateRange {
        min: NaiveDateTime,
        max: NaiveDateTime,
        range_days: f64,
    },
    TopValues {
        distinct: usize,
        values: Vec<CategoryCount>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrixOutput {
    pub method: crate::stats::CorrelationMethod,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
    /// Rows complete across every column.
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaSummary {
    pub eigenvalues: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance_ratio: Vec<f64>,
}

/// Numeric and figure outputs of a successful task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<TestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_matrix: Option<CorrelationMatrixOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca: Option<PcaSummary>,
    pub figures: Vec<FigureHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultOutcome {
    Success(ResultPayload),
    Failed(ExecutionFailure),
}

/// Result of one executed task: either outputs or a captured failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub columns: Vec<String>,
    pub procedure: Procedure,
    pub outcome: ResultOutcome,
}

impl AnalysisResult {
    pub fn success(task: &AnalysisTask, procedure: Procedure, payload: ResultPayload) -> Self {
        Self {
            task_id: task.id,
            kind: task.kind,
            columns: task.columns.clone(),
            procedure,
            outcome: ResultOutcome::Success(payload),
        }
    }

    pub fn failure(task: &AnalysisTask, procedure: Procedure, failure: ExecutionFailure) -> Self {
        Self {
            task_id: task.id,
            kind: task.kind,
            columns: task.columns.clone(),
            procedure,
            outcome: ResultOutcome::Failed(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResultOutcome::Success(_))
    }

    pub fn payload(&self) -> Option<&ResultPayload> {
        match &self.outcome {
            ResultOutcome::Success(payload) => Some(payload),
            ResultOutcome::Failed(_) => None,
        }
    }

    pub fn failure_detail(&self) -> Option<&ExecutionFailure> {
        match &self.outcome {
            ResultOutcome::Failed(failure) => Some(failure),
            ResultOutcome::Success(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
