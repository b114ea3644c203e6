//! Assumption Checker.
//!
//! Runs the statistical preconditions that decide which test is valid for a
//! task: normality of numeric samples, homogeneity of variance across groups
//! and sufficiency of expected cell counts in a contingency table.
//!
//! Each check is a pure function of the profiled data. An unmet assumption is
//! a recorded [`AssumptionStatus`], never an error. Results are cached per task
//! so repeated selection queries reuse the first computation.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::decisions::GroupRoles;
use crate::profiler::{ProfiledDataset, cross_tabulate, group_by_label, Contingency};
use crate::stats::{StatisticalBackend, StatsError};
use crate::types::{AnalysisTask, AssumptionCheck, AssumptionResult, AssumptionStatus, SemanticType, TaskId, TaskKind};

// ============================================================================
// Individual checks
// ============================================================================

/// Normality of one numeric sample.
///
/// Samples below `normality_min_sample` are `InsufficientData`. Samples above
/// `normality_max_sample` are not tested and are assumed non-normal, recorded
/// as `SkippedByPolicy`.
pub fn check_normality(
    column: &str,
    values: &[f64],
    config: &AnalysisConfig,
    backend: &dyn StatisticalBackend,
) -> AssumptionResult {
    let columns = vec![column.to_string()];
    let n = values.len();

    if n < config.normality_min_sample {
        return AssumptionResult::new(
            AssumptionCheck::Normality,
            columns,
            AssumptionStatus::InsufficientData,
            format!(
                "{n} observations, normality test needs at least {}",
                config.normality_min_sample
            ),
        );
    }

    if n > config.normality_max_sample {
        return AssumptionResult::new(
            AssumptionCheck::Normality,
            columns,
            AssumptionStatus::SkippedByPolicy,
            format!(
                "{n} observations exceed the normality test limit of {}; assumed non-normal by policy",
                config.normality_max_sample
            ),
        );
    }

    match backend.normality(values) {
        Ok(stats) => {
            let status = if stats.p_value >= config.alpha {
                AssumptionStatus::Passed
            } else {
                AssumptionStatus::Failed
            };
            let verdict = if status == AssumptionStatus::Passed {
                "consistent with a normal distribution"
            } else {
                "departs from normality"
            };
            AssumptionResult::new(
                AssumptionCheck::Normality,
                columns,
                status,
                format!("W = {:.4}, p = {:.4}: {verdict}", stats.statistic, stats.p_value),
            )
            .with_statistic(stats.statistic, Some(stats.p_value))
        }
        Err(StatsError::InsufficientData(detail)) => AssumptionResult::new(
            AssumptionCheck::Normality,
            columns,
            AssumptionStatus::InsufficientData,
            detail,
        ),
        Err(err) => AssumptionResult::new(
            AssumptionCheck::Normality,
            columns,
            AssumptionStatus::Failed,
            format!("normality test not applicable ({err}); treated as non-normal"),
        ),
    }
}

/// Homogeneity of variance across groups (Levene).
///
/// Needs at least two non-empty groups, each with at least `min_group_size`
/// observations; anything less is `InsufficientData`.
pub fn check_equal_variance(
    columns: &[String],
    groups: &[(String, Vec<f64>)],
    config: &AnalysisConfig,
    backend: &dyn StatisticalBackend,
) -> AssumptionResult {
    let columns = columns.to_vec();
    let non_empty: Vec<&(String, Vec<f64>)> = groups.iter().filter(|(_, v)| !v.is_empty()).collect();

    if non_empty.len() < 2 {
        return AssumptionResult::new(
            AssumptionCheck::EqualVariance,
            columns,
            AssumptionStatus::InsufficientData,
            format!("{} non-empty group(s), at least two are required", non_empty.len()),
        );
    }

    if let Some((label, values)) = non_empty
        .iter()
        .find(|(_, v)| v.len() < config.min_group_size)
    {
        return AssumptionResult::new(
            AssumptionCheck::EqualVariance,
            columns,
            AssumptionStatus::InsufficientData,
            format!(
                "group '{label}' has {} observation(s), every group needs at least {}",
                values.len(),
                config.min_group_size
            ),
        );
    }

    let samples: Vec<Vec<f64>> = non_empty.iter().map(|(_, v)| v.clone()).collect();
    match backend.levene(&samples) {
        Ok(stats) => {
            let status = if stats.p_value >= config.alpha {
                AssumptionStatus::Passed
            } else {
                AssumptionStatus::Failed
            };
            let verdict = if status == AssumptionStatus::Passed {
                "variances are homogeneous"
            } else {
                "variances differ across groups"
            };
            AssumptionResult::new(
                AssumptionCheck::EqualVariance,
                columns,
                status,
                format!("Levene F = {:.4}, p = {:.4}: {verdict}", stats.statistic, stats.p_value),
            )
            .with_statistic(stats.statistic, Some(stats.p_value))
        }
        Err(StatsError::InsufficientData(detail)) => AssumptionResult::new(
            AssumptionCheck::EqualVariance,
            columns,
            AssumptionStatus::InsufficientData,
            detail,
        ),
        Err(err) => AssumptionResult::new(
            AssumptionCheck::EqualVariance,
            columns,
            AssumptionStatus::Failed,
            format!("variance comparison not applicable ({err})"),
        ),
    }
}

/// Minimum expected cell count of a contingency table.
///
/// The statistic is the smallest expected count. Tables smaller than 2×2
/// are `InsufficientData`.
pub fn check_expected_counts(
    columns: &[String],
    table: &Contingency,
    config: &AnalysisConfig,
) -> AssumptionResult {
    let columns = columns.to_vec();
    let (rows, cols) = table.shape();

    if rows < 2 || cols < 2 || table.total() == 0 {
        return AssumptionResult::new(
            AssumptionCheck::MinExpectedCount,
            columns,
            AssumptionStatus::InsufficientData,
            format!("contingency table is {rows}×{cols}, at least 2×2 is required"),
        );
    }

    let min_expected = table
        .expected_counts()
        .into_iter()
        .flatten()
        .fold(f64::INFINITY, f64::min);

    let (status, verdict) = if min_expected >= config.min_expected_cell_count {
        (AssumptionStatus::Passed, "sufficient")
    } else {
        (AssumptionStatus::Failed, "insufficient")
    };

    AssumptionResult::new(
        AssumptionCheck::MinExpectedCount,
        columns,
        status,
        format!(
            "{rows}×{cols} table, smallest expected count {min_expected:.2} (threshold {}): {verdict}",
            config.min_expected_cell_count
        ),
    )
    .with_statistic(min_expected, None)
}

// ============================================================================
// Per-task checker
// ============================================================================

/// Assumption outcomes of one task, plus the group structure they were
/// computed on.
#[derive(Debug, Clone, PartialEq)]
pub struct AssumptionSet {
    pub task_id: TaskId,
    pub results: Vec<AssumptionResult>,
    /// Number of non-empty groups for Numeric × grouping tasks.
    pub group_count: Option<usize>,
    /// Shape of the contingency table for grouping × grouping tasks.
    pub table_shape: Option<(usize, usize)>,
}

impl AssumptionSet {
    fn empty(task_id: TaskId) -> Self {
        Self {
            task_id,
            results: Vec::new(),
            group_count: None,
            table_shape: None,
        }
    }

    /// First result of the given check.
    pub fn get(&self, check: AssumptionCheck) -> Option<&AssumptionResult> {
        self.results.iter().find(|r| r.check == check)
    }
}

/// Runs and caches the checks each task needs.
pub struct AssumptionChecker {
    config: AnalysisConfig,
    backend: Arc<dyn StatisticalBackend>,
    cache: Mutex<HashMap<TaskId, Arc<AssumptionSet>>>,
}

impl AssumptionChecker {
    pub fn new(config: AnalysisConfig, backend: Arc<dyn StatisticalBackend>) -> Self {
        Self {
            config,
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Assumption results for `task`, computed on first request.
    pub fn check(&self, task: &AnalysisTask, data: &ProfiledDataset) -> Arc<AssumptionSet> {
        if let Some(cached) = self.cache.lock().get(&task.id) {
            return Arc::clone(cached);
        }

        let computed = Arc::new(self.compute(task, data));
        debug!(
            "Checked {} assumption(s) for task {} ({})",
            computed.results.len(),
            task.id,
            task.label()
        );
        Arc::clone(self.cache.lock().entry(task.id).or_insert(computed))
    }

    /// Number of tasks with cached results.
    pub fn cached_tasks(&self) -> usize {
        self.cache.lock().len()
    }

    fn compute(&self, task: &AnalysisTask, data: &ProfiledDataset) -> AssumptionSet {
        let mut set = AssumptionSet::empty(task.id);
        let profiles: Vec<_> = task
            .columns
            .iter()
            .filter_map(|name| data.profile().column(name))
            .collect();
        if profiles.len() != task.columns.len() {
            return set;
        }

        match task.kind {
            TaskKind::Univariate | TaskKind::Multivariate => {
                set.results = profiles
                    .iter()
                    .filter_map(|p| p.normality().cloned())
                    .collect();
            }
            TaskKind::Bivariate => {
                let (a, b) = (profiles[0], profiles[1]);
                match (a.semantic_type, b.semantic_type) {
                    (SemanticType::Numeric, SemanticType::Numeric) => {
                        set.results = [a, b]
                            .iter()
                            .filter_map(|p| p.normality().cloned())
                            .collect();
                    }
                    (x, y) if x.is_grouping() && y.is_grouping() => {
                        let (Some(rows), Some(cols)) = (
                            data.column_data(&a.name).and_then(|d| d.as_labels()),
                            data.column_data(&b.name).and_then(|d| d.as_labels()),
                        ) else {
                            return set;
                        };
                        let table = cross_tabulate(rows, cols);
                        set.table_shape = Some(table.shape());
                        set.results
                            .push(check_expected_counts(&task.columns, &table, &self.config));
                    }
                    _ => {
                        if let Some(roles) = GroupRoles::resolve(a, b) {
                            let (Some(labels), Some(values)) = (
                                data.column_data(&roles.group_column).and_then(|d| d.as_labels()),
                                data.column_data(&roles.value_column).and_then(|d| d.as_numeric()),
                            ) else {
                                return set;
                            };
                            let groups = group_by_label(labels, values);
                            set.group_count = Some(groups.iter().filter(|(_, v)| !v.is_empty()).count());
                            set.results.push(check_equal_variance(
                                &task.columns,
                                &groups,
                                &self.config,
                                self.backend.as_ref(),
                            ));
                        }
                    }
                }
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::DataProfiler;
    use crate::stats::NativeBackend;
    use polars::prelude::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    // ==================== normality tests ====================

    #[test]
    fn test_normality_insufficient_data() {
        let result = check_normality("x", &[1.0, 2.0, 3.0], &config(), &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::InsufficientData);
        assert!(result.statistic.is_none());
    }

    #[test]
    fn test_normality_above_bound_is_policy_skip() {
        let config = AnalysisConfig::builder()
            .normality_max_sample(10)
            .build()
            .unwrap();
        let values: Vec<f64> = (0..11).map(f64::from).collect();
        let result = check_normality("x", &values, &config, &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::SkippedByPolicy);
        assert!(result.detail.contains("assumed non-normal"));
        assert!(!result.passed());
    }

    #[test]
    fn test_normality_of_symmetric_sample_passes() {
        let values = [4.0, 5.0, 5.0, 6.0, 6.0, 6.0, 7.0, 7.0, 8.0, 5.5, 6.5];
        let result = check_normality("x", &values, &config(), &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::Passed);
        assert!(result.p_value.is_some());
    }

    // ==================== equal variance tests ====================

    #[test]
    fn test_equal_variance_requires_two_groups() {
        let groups = vec![("a".to_string(), vec![1.0, 2.0, 3.0])];
        let result = check_equal_variance(&["v".into(), "g".into()], &groups, &config(), &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::InsufficientData);
    }

    #[test]
    fn test_equal_variance_requires_group_size() {
        let groups = vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0]),
            ("b".to_string(), vec![4.0]),
        ];
        let result = check_equal_variance(&["v".into(), "g".into()], &groups, &config(), &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::InsufficientData);
        assert!(result.detail.contains("'b'"));
    }

    #[test]
    fn test_equal_variance_detects_difference() {
        let groups = vec![
            ("a".to_string(), vec![10.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3]),
            ("b".to_string(), vec![2.0, 25.0, 5.0, 18.0, -4.0, 30.0, 0.0, 14.0]),
        ];
        let result = check_equal_variance(&["v".into(), "g".into()], &groups, &config(), &NativeBackend);
        assert_eq!(result.status, AssumptionStatus::Failed);
    }

    // ==================== expected count tests ====================

    #[test]
    fn test_expected_counts_threshold() {
        let table = Contingency {
            row_labels: vec!["a".into(), "b".into()],
            col_labels: vec!["x".into(), "y".into()],
            counts: vec![vec![10, 10], vec![10, 10]],
        };
        let result = check_expected_counts(&["r".into(), "c".into()], &table, &config());
        assert_eq!(result.status, AssumptionStatus::Passed);
        assert_eq!(result.statistic, Some(10.0));

        let sparse = Contingency {
            counts: vec![vec![1, 5], vec![11, 3]],
            ..table
        };
        let result = check_expected_counts(&["r".into(), "c".into()], &sparse, &config());
        assert_eq!(result.status, AssumptionStatus::Failed);
    }

    #[test]
    fn test_expected_counts_single_row_is_insufficient() {
        let table = Contingency {
            row_labels: vec!["a".into()],
            col_labels: vec!["x".into(), "y".into()],
            counts: vec![vec![4, 6]],
        };
        let result = check_expected_counts(&["r".into(), "c".into()], &table, &config());
        assert_eq!(result.status, AssumptionStatus::InsufficientData);
    }

    // ==================== checker tests ====================

    #[test]
    fn test_checker_caches_per_task() {
        let df = df![
            "score" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "group" => ["a", "a", "a", "a", "b", "b", "b", "b"],
        ]
        .unwrap();
        let backend: Arc<dyn StatisticalBackend> = Arc::new(NativeBackend);
        let data = DataProfiler::new(config(), Arc::clone(&backend))
            .profile(&df)
            .unwrap();
        let checker = AssumptionChecker::new(config(), backend);
        let task = AnalysisTask::new(
            TaskId(2),
            TaskKind::Bivariate,
            vec!["score".into(), "group".into()],
        );

        let first = checker.check(&task, &data);
        let second = checker.check(&task, &data);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(checker.cached_tasks(), 1);
        assert_eq!(first.group_count, Some(2));
        assert!(first.get(AssumptionCheck::EqualVariance).is_some());
    }
}
