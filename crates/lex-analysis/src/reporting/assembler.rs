use chrono::Local;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::narrative;
use super::{
    BIVARIATE_ANALYSIS, DATASET_OVERVIEW, DatasetOverview, MULTIVARIATE_ANALYSIS,
    NOTES_AND_LIMITATIONS, ReportModel, Section, TaskCounts, UNIVARIATE_ANALYSIS,
};
use crate::pipeline::CompletedTask;
use crate::types::{AssumptionStatus, DatasetProfile, ResultOutcome, TaskKind, TaskStatus};

/// Builds a [`ReportModel`] from a profile and completed tasks.
///
/// Purely structural: results are grouped and described, never recomputed.
/// Assembling the same inputs with the same timestamp yields an identical model.
pub struct ReportAssembler {
    title: String,
    alpha: f64,
}

impl ReportAssembler {
    pub fn new(title: impl Into<String>, alpha: f64) -> Self {
        Self {
            title: title.into(),
            alpha,
        }
    }

    pub fn assemble(&self, profile: &DatasetProfile, completed: &[CompletedTask]) -> ReportModel {
        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.assemble_at(profile, completed, generated_at)
    }

    /// Assemble with a caller-supplied timestamp.
    pub fn assemble_at(
        &self,
        profile: &DatasetProfile,
        completed: &[CompletedTask],
        generated_at: impl Into<String>,
    ) -> ReportModel {
        let mut ordered: Vec<&CompletedTask> = completed.iter().collect();
        ordered.sort_by_key(|c| c.task.id);

        let mut overview = Section::new(DATASET_OVERVIEW);
        overview.narrative = narrative::dataset_sentences(profile);

        let mut root = Section::new(self.title.clone());
        root.children = vec![
            overview,
            self.analysis_section(UNIVARIATE_ANALYSIS, TaskKind::Univariate, &ordered),
            self.analysis_section(BIVARIATE_ANALYSIS, TaskKind::Bivariate, &ordered),
            self.analysis_section(MULTIVARIATE_ANALYSIS, TaskKind::Multivariate, &ordered),
            self.notes_section(profile, &ordered),
        ];

        let tasks = count_tasks(&ordered);
        info!(
            "Assembled report: {} executed, {} failed, {} skipped",
            tasks.executed, tasks.failed, tasks.skipped
        );

        let mut type_counts = BTreeMap::new();
        for column in &profile.columns {
            *type_counts.entry(column.semantic_type).or_insert(0) += 1;
        }

        ReportModel {
            title: self.title.clone(),
            generated_at: generated_at.into(),
            dataset: DatasetOverview {
                profile: profile.clone(),
                type_counts,
                tasks,
            },
            root,
        }
    }

    fn analysis_section(&self, title: &str, kind: TaskKind, tasks: &[&CompletedTask]) -> Section {
        let mut section = Section::new(title);
        section.children = tasks
            .iter()
            .filter(|c| c.task.kind == kind && c.task.status == TaskStatus::Executed)
            .filter_map(|c| self.task_section(c))
            .collect();

        if section.children.is_empty() {
            section.narrative.push(format!(
                "No {} tasks applied to this dataset.",
                kind.display_name().to_lowercase()
            ));
        }
        debug!("Section '{}': {} task(s)", title, section.children.len());
        section
    }

    fn task_section(&self, completed: &CompletedTask) -> Option<Section> {
        let result = completed.result.as_ref()?;
        let payload = result.payload()?;
        let task = &completed.task;

        let mut section = Section::new(format!("{}: {}", task.id, task.label()));
        section
            .narrative
            .push(format!("Procedure: {}.", result.procedure.display_name()));
        section
            .narrative
            .extend(completed.decision.rationale.iter().cloned());

        if let Some(summary) = &payload.summary {
            let column = task.columns.first().map(String::as_str).unwrap_or_default();
            section
                .narrative
                .push(narrative::summary_sentence(column, summary));
        }
        if let Some(test) = &payload.test {
            section
                .narrative
                .extend(narrative::test_sentences(test, self.alpha));
        }
        if let Some(matrix) = &payload.correlation_matrix {
            section.narrative.extend(narrative::matrix_sentences(matrix));
        }
        if let Some(pca) = &payload.pca {
            section.narrative.push(narrative::pca_sentence(pca));
        }
        section
            .narrative
            .extend(payload.figures.iter().map(narrative::figure_sentence));

        section.results.push(result.clone());
        Some(section)
    }

    fn notes_section(&self, profile: &DatasetProfile, tasks: &[&CompletedTask]) -> Section {
        let mut section = Section::new(NOTES_AND_LIMITATIONS);

        section
            .narrative
            .extend(profile.unusable.iter().map(narrative::unusable_sentence));

        for column in &profile.columns {
            if let Some(normality) = column.normality()
                && normality.status == AssumptionStatus::SkippedByPolicy
            {
                section.narrative.push(format!(
                    "Normality of '{}' was not tested: {}.",
                    column.name, normality.detail
                ));
            }
        }

        for completed in tasks {
            let label = format!("{} ({})", completed.task.id, completed.task.label());
            match completed.task.status {
                TaskStatus::Skipped => {
                    if let Some(reason) = completed.decision.skip_reason() {
                        section
                            .narrative
                            .push(narrative::skipped_sentence(&label, reason));
                    }
                }
                TaskStatus::Failed => {
                    if let Some(result) = &completed.result
                        && let ResultOutcome::Failed(failure) = &result.outcome
                    {
                        section
                            .narrative
                            .push(narrative::failed_sentence(&label, failure));
                        section.results.push(result.clone());
                    }
                }
                _ => {}
            }
        }

        if section.narrative.is_empty() {
            section
                .narrative
                .push("Every column was usable and every task ran to completion.".to_string());
        }
        section
    }
}

fn count_tasks(tasks: &[&CompletedTask]) -> TaskCounts {
    let mut counts = TaskCounts {
        enumerated: tasks.len(),
        ..TaskCounts::default()
    };
    for completed in tasks {
        match completed.task.status {
            TaskStatus::Executed => counts.executed += 1,
            TaskStatus::Failed => counts.failed += 1,
            TaskStatus::Skipped => counts.skipped += 1,
            TaskStatus::Pending | TaskStatus::Selected => {}
        }
    }
    counts
}
