//! Statistical routine boundary.
//!
//! The engine selects procedures; it never computes test statistics itself.
//! Every numeric routine goes through [`StatisticalBackend`], which either
//! returns its outputs or a typed [`StatsError`]. [`NativeBackend`] is the
//! default implementation, built on `statrs` distributions.

pub mod descriptive;
mod native;

pub use native::NativeBackend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Typed failure of a statistical routine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("degenerate input: {0}")]
    Degenerate(String),

    #[error("did not converge: {0}")]
    NonConvergence(String),

    #[error("matrix is singular")]
    SingularMatrix,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("distribution error: {0}")]
    Distribution(String),
}

/// Hypothesis tests and correlations the backend can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    StudentT,
    WelchT,
    OneWayAnova,
    ChiSquare,
    FisherExact,
    Pearson,
    Spearman,
}

impl TestKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::StudentT => "Independent t-test",
            Self::WelchT => "Welch's t-test",
            Self::OneWayAnova => "One-way ANOVA",
            Self::ChiSquare => "Chi-square test of independence",
            Self::FisherExact => "Fisher's exact test",
            Self::Pearson => "Pearson correlation",
            Self::Spearman => "Spearman rank correlation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn test_kind(&self) -> TestKind {
        match self {
            Self::Pearson => TestKind::Pearson,
            Self::Spearman => TestKind::Spearman,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pearson => "Pearson",
            Self::Spearman => "Spearman",
        }
    }
}

/// Column data handed to [`StatisticalBackend::run_test`].
#[derive(Debug, Clone, Copy)]
pub enum TestInput<'a> {
    /// Numeric observations per group, in group order.
    Groups(&'a [Vec<f64>]),
    /// Two equally long samples observed on the same rows.
    Paired { x: &'a [f64], y: &'a [f64] },
    /// Observed counts, rows by columns.
    Contingency(&'a [Vec<u64>]),
}

/// Statistic and p-value of an assumption check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckStatistics {
    pub statistic: f64,
    pub p_value: f64,
}

/// Outputs of a hypothesis test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestStatistics {
    pub statistic: f64,
    pub p_value: f64,
    pub effect_size: Option<f64>,
    pub degrees_of_freedom: Vec<f64>,
    pub extras: BTreeMap<String, f64>,
}

impl TestStatistics {
    pub(crate) fn new(statistic: f64, p_value: f64) -> Self {
        Self {
            statistic,
            p_value: p_value.clamp(0.0, 1.0),
            effect_size: None,
            degrees_of_freedom: Vec::new(),
            extras: BTreeMap::new(),
        }
    }

    pub(crate) fn with_effect_size(mut self, effect_size: f64) -> Self {
        self.effect_size = Some(effect_size);
        self
    }

    pub(crate) fn with_df(mut self, df: impl IntoIterator<Item = f64>) -> Self {
        self.degrees_of_freedom = df.into_iter().collect();
        self
    }

    pub(crate) fn with_extra(mut self, key: &str, value: f64) -> Self {
        self.extras.insert(key.to_string(), value);
        self
    }
}

/// Narrow contract for every numeric routine the engine calls.
///
/// Implementations must be deterministic: the same inputs always produce the
/// same outputs.
pub trait StatisticalBackend: Send + Sync {
    /// Name of the backend, for logs and reports.
    fn name(&self) -> &'static str;

    /// Normality test of a single sample.
    fn normality(&self, sample: &[f64]) -> Result<CheckStatistics, StatsError>;

    /// Homogeneity-of-variance test across groups.
    fn levene(&self, groups: &[Vec<f64>]) -> Result<CheckStatistics, StatsError>;

    /// Run a hypothesis test or correlation.
    fn run_test(&self, kind: TestKind, input: TestInput<'_>) -> Result<TestStatistics, StatsError>;

    /// Pairwise correlation matrix of equally long columns.
    fn correlation_matrix(
        &self,
        method: CorrelationMethod,
        columns: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, StatsError>;

    /// Eigenvalues of the correlation matrix of `columns`, in descending order.
    fn principal_components(&self, columns: &[Vec<f64>]) -> Result<Vec<f64>, StatsError>;
}
