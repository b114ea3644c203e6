//! Task Enumerator.
//!
//! Turns the profiled schema into the ordered list of candidate analyses.
//! Order is fixed: univariate tasks in dataset column order, then bivariate
//! pairs by (first index, second index), then the single multivariate group.

use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::types::{AnalysisTask, ColumnProfile, DatasetProfile, SemanticType, TaskId, TaskKind};

pub struct TaskEnumerator {
    config: AnalysisConfig,
}

impl TaskEnumerator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Enumerate every candidate task. All tasks start Pending.
    pub fn enumerate(&self, profile: &DatasetProfile) -> Vec<AnalysisTask> {
        let mut columns: Vec<&ColumnProfile> = profile.columns.iter().collect();
        columns.sort_by_key(|c| c.index);

        let mut tasks = Vec::new();

        for column in &columns {
            tasks.push(AnalysisTask::new(
                TaskId(tasks.len()),
                TaskKind::Univariate,
                vec![column.name.clone()],
            ));
        }

        let paired: Vec<&ColumnProfile> = columns
            .iter()
            .copied()
            .filter(|c| Self::can_pair(c))
            .collect();
        for (i, first) in paired.iter().enumerate() {
            for second in &paired[i + 1..] {
                tasks.push(AnalysisTask::new(
                    TaskId(tasks.len()),
                    TaskKind::Bivariate,
                    vec![first.name.clone(), second.name.clone()],
                ));
            }
        }

        let numeric: Vec<String> = paired
            .iter()
            .filter(|c| c.semantic_type == SemanticType::Numeric)
            .map(|c| c.name.clone())
            .collect();
        if numeric.len() >= self.config.multivariate_min_columns {
            tasks.push(AnalysisTask::new(
                TaskId(tasks.len()),
                TaskKind::Multivariate,
                numeric,
            ));
        } else {
            debug!(
                "No multivariate task: {} eligible numeric column(s), {} required",
                numeric.len(),
                self.config.multivariate_min_columns
            );
        }

        info!(
            "Enumerated {} task(s) from {} usable column(s)",
            tasks.len(),
            columns.len()
        );
        tasks
    }

    /// Text columns and near-zero-variance columns take no part in pairs or
    /// the multivariate group.
    fn can_pair(column: &ColumnProfile) -> bool {
        column.semantic_type != SemanticType::Text && !column.is_near_zero_variance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::DataProfiler;
    use crate::stats::NativeBackend;
    use polars::prelude::*;
    use std::sync::Arc;

    fn enumerate(df: &DataFrame) -> Vec<AnalysisTask> {
        let config = AnalysisConfig::default();
        let data = DataProfiler::new(config.clone(), Arc::new(NativeBackend))
            .profile(df)
            .unwrap();
        TaskEnumerator::new(config).enumerate(data.profile())
    }

    fn spread(offset: f64) -> Vec<f64> {
        (0..30).map(|i| offset + ((i * 7) % 30) as f64).collect()
    }

    // ==================== ordering tests ====================

    #[test]
    fn test_univariate_then_pairs_in_index_order() {
        let df = df![
            "a" => spread(0.0),
            "b" => spread(5.0),
            "c" => (0..30).map(|i| if i % 2 == 0 { "x" } else { "y" }).collect::<Vec<_>>(),
        ]
        .unwrap();

        let tasks = enumerate(&df);
        let labels: Vec<(TaskKind, Vec<String>)> =
            tasks.iter().map(|t| (t.kind, t.columns.clone())).collect();
        assert_eq!(
            labels,
            vec![
                (TaskKind::Univariate, vec!["a".into()]),
                (TaskKind::Univariate, vec!["b".into()]),
                (TaskKind::Univariate, vec!["c".into()]),
                (TaskKind::Bivariate, vec!["a".into(), "b".into()]),
                (TaskKind::Bivariate, vec!["a".into(), "c".into()]),
                (TaskKind::Bivariate, vec!["b".into(), "c".into()]),
            ]
        );
        assert!(tasks.iter().enumerate().all(|(i, t)| t.id == TaskId(i)));
        assert!(tasks.iter().all(|t| t.status == crate::types::TaskStatus::Pending));
    }

    // ==================== exclusion tests ====================

    #[test]
    fn test_text_columns_only_get_univariate_tasks() {
        let notes: Vec<String> = (0..30).map(|i| format!("free text note {i}")).collect();
        let df = df![
            "a" => spread(0.0),
            "b" => spread(3.0),
            "notes" => notes,
        ]
        .unwrap();

        let tasks = enumerate(&df);
        let with_notes: Vec<&AnalysisTask> = tasks
            .iter()
            .filter(|t| t.columns.iter().any(|c| c == "notes"))
            .collect();
        assert_eq!(with_notes.len(), 1);
        assert_eq!(with_notes[0].kind, TaskKind::Univariate);
    }

    #[test]
    fn test_multivariate_requires_three_numeric_columns() {
        let df = df!["a" => spread(0.0), "b" => spread(1.0)].unwrap();
        assert!(enumerate(&df).iter().all(|t| t.kind != TaskKind::Multivariate));

        let df = df![
            "a" => spread(0.0),
            "b" => spread(1.0),
            "c" => spread(2.0),
            "d" => spread(3.0),
            "e" => spread(4.0),
        ]
        .unwrap();
        let tasks = enumerate(&df);
        let multivariate: Vec<&AnalysisTask> = tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Multivariate)
            .collect();
        assert_eq!(multivariate.len(), 1);
        assert_eq!(multivariate[0].columns.len(), 5);
        assert_eq!(tasks.last().unwrap().kind, TaskKind::Multivariate);
    }

    #[test]
    fn test_near_zero_variance_column_is_excluded_from_pairs() {
        let df = df![
            "a" => spread(0.0),
            "flat" => vec![1.0; 30],
            "b" => spread(1.0),
            "c" => spread(2.0),
        ]
        .unwrap();

        let tasks = enumerate(&df);
        let flat_tasks: Vec<&AnalysisTask> = tasks
            .iter()
            .filter(|t| t.columns.iter().any(|c| c == "flat"))
            .collect();
        assert_eq!(flat_tasks.len(), 1);
        assert_eq!(flat_tasks[0].kind, TaskKind::Univariate);

        let multivariate = tasks.iter().find(|t| t.kind == TaskKind::Multivariate).unwrap();
        assert_eq!(multivariate.columns, vec!["a", "b", "c"]);
    }
}
