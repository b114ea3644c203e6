//! Test and visualization selection.
//!
//! The set of procedures is closed: every test or summary the engine can run
//! is a [`Procedure`] variant, and adding one means adding a variant and a
//! decision-table row. [`RuleBasedSelector`] maps a task, its column types and
//! its assumption outcomes to exactly one [`SelectionDecision`].

mod rule_engine;

pub use rule_engine::RuleBasedSelector;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assumptions::AssumptionSet;
use crate::charts::ChartKind;
use crate::stats::{CorrelationMethod, TestKind};
use crate::types::{
    AnalysisTask, AssumptionCheck, AssumptionResult, ColumnProfile, DatasetProfile, SemanticType,
    TaskId,
};

/// Trait for test selectors.
///
/// Implementations must be pure: the same task, profile and assumption set
/// always produce the same decision.
pub trait TestSelector: Send + Sync {
    fn select(
        &self,
        task: &AnalysisTask,
        profile: &DatasetProfile,
        assumptions: &AssumptionSet,
    ) -> SelectionDecision;
}

/// Which side of a Numeric × grouping pair is the grouping variable.
///
/// The grouping column is always the Categorical/Ordinal/Boolean side,
/// whatever the declaration order of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRoles {
    pub group_column: String,
    pub value_column: String,
}

impl GroupRoles {
    pub fn resolve(a: &ColumnProfile, b: &ColumnProfile) -> Option<Self> {
        let (group, value) = match (a.semantic_type, b.semantic_type) {
            (SemanticType::Numeric, t) if t.is_grouping() => (b, a),
            (t, SemanticType::Numeric) if t.is_grouping() => (a, b),
            _ => return None,
        };
        Some(Self {
            group_column: group.name.clone(),
            value_column: value.name.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    /// Mean and standard deviation.
    MeanSd,
    /// Median and interquartile range.
    MedianIqr,
}

/// Closed set of procedures the engine can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "procedure", rename_all = "snake_case")]
pub enum Procedure {
    NumericSummary { style: SummaryStyle },
    FrequencyTable,
    DatetimeSummary,
    TextSummary,
    Correlation { method: CorrelationMethod },
    StudentT { grouping: GroupRoles },
    WelchT { grouping: GroupRoles },
    OneWayAnova { grouping: GroupRoles },
    ChiSquare,
    FisherExact,
    TimeTrend { time_column: String, value_column: String },
    CorrelationMatrix { method: CorrelationMethod, pca: bool },
}

impl Procedure {
    pub fn display_name(&self) -> String {
        match self {
            Self::NumericSummary {
                style: SummaryStyle::MeanSd,
            } => "Descriptive statistics (mean and standard deviation)".to_string(),
            Self::NumericSummary {
                style: SummaryStyle::MedianIqr,
            } => "Descriptive statistics (median and IQR)".to_string(),
            Self::FrequencyTable => "Frequency table".to_string(),
            Self::DatetimeSummary => "Date range summary".to_string(),
            Self::TextSummary => "Text value summary".to_string(),
            Self::Correlation { method } => method.test_kind().display_name().to_string(),
            Self::CorrelationMatrix { method, pca } => {
                let base = format!("{} correlation matrix", method.display_name());
                if *pca { format!("{base} with PCA summary") } else { base }
            }
            Self::TimeTrend { .. } => "Trend over time".to_string(),
            other => other
                .test_kind()
                .map(|k| k.display_name().to_string())
                .unwrap_or_default(),
        }
    }

    /// Hypothesis test behind the procedure, if any.
    pub fn test_kind(&self) -> Option<TestKind> {
        match self {
            Self::Correlation { method } => Some(method.test_kind()),
            Self::StudentT { .. } => Some(TestKind::StudentT),
            Self::WelchT { .. } => Some(TestKind::WelchT),
            Self::OneWayAnova { .. } => Some(TestKind::OneWayAnova),
            Self::ChiSquare => Some(TestKind::ChiSquare),
            Self::FisherExact => Some(TestKind::FisherExact),
            _ => None,
        }
    }
}

/// Why a task was not run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("assumption '{}' not met: {detail}", check.name())]
    AssumptionUnmet {
        check: AssumptionCheck,
        detail: String,
    },

    #[error("insufficient data: {detail}")]
    InsufficientData { detail: String },

    #[error(
        "insufficient expected cell counts: smallest expected count {min_expected:.2} is below {threshold} and the {}×{} table is not 2×2",
        table_shape.0,
        table_shape.1
    )]
    InsufficientExpectedCounts {
        min_expected: f64,
        threshold: f64,
        table_shape: (usize, usize),
    },

    #[error("no applicable procedure for {signature}")]
    NoApplicableProcedure { signature: String },

    #[error("selection ambiguity: {diagnostic}")]
    SelectionAmbiguity { diagnostic: String },
}

/// Outcome of the decision table for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Selection {
    Run {
        procedure: Procedure,
        charts: Vec<ChartKind>,
    },
    Skip {
        reason: SkipReason,
    },
}

/// The procedure chosen for a task and the assumptions that drove the choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub task_id: TaskId,
    pub selection: Selection,
    pub rationale: Vec<String>,
    /// Assumption results consulted by the decision.
    pub assumptions: Vec<AssumptionResult>,
}

impl SelectionDecision {
    pub fn procedure(&self) -> Option<&Procedure> {
        match &self.selection {
            Selection::Run { procedure, .. } => Some(procedure),
            Selection::Skip { .. } => None,
        }
    }

    pub fn charts(&self) -> &[ChartKind] {
        match &self.selection {
            Selection::Run { charts, .. } => charts,
            Selection::Skip { .. } => &[],
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.selection {
            Selection::Skip { reason } => Some(reason),
            Selection::Run { .. } => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.skip_reason().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_test_kind() {
        let grouping = GroupRoles {
            group_column: "treatment".into(),
            value_column: "score".into(),
        };
        assert_eq!(
            Procedure::WelchT { grouping }.test_kind(),
            Some(TestKind::WelchT)
        );
        assert_eq!(Procedure::FrequencyTable.test_kind(), None);
        assert_eq!(Procedure::ChiSquare.display_name(), "Chi-square test of independence");
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::InsufficientExpectedCounts {
            min_expected: 3.0,
            threshold: 5.0,
            table_shape: (4, 3),
        };
        assert!(reason.to_string().contains("insufficient expected cell counts"));
        assert!(reason.to_string().contains("4×3"));
    }

    #[test]
    fn test_procedure_serialization() {
        let procedure = Procedure::Correlation {
            method: CorrelationMethod::Spearman,
        };
        let json = serde_json::to_value(&procedure).unwrap();
        assert_eq!(json["procedure"], "correlation");
        assert_eq!(json["method"], "spearman");
    }
}
