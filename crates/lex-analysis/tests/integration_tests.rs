//! Integration tests for the analysis pipeline.
//!
//! These tests verify end-to-end behavior on small CSV fixtures.

use lex_analysis::decisions::SummaryStyle;
use lex_analysis::reporting::{
    BIVARIATE_ANALYSIS, DATASET_OVERVIEW, MULTIVARIATE_ANALYSIS, NOTES_AND_LIMITATIONS,
    UNIVARIATE_ANALYSIS,
};
use lex_analysis::{
    AnalysisConfig, AnalysisError, AnalysisPlan, AssumptionCheck, AssumptionStatus,
    CancellationToken, ChartKind, ChartSpecRenderer, Pipeline, PlannedTask, Procedure,
    ProfilingError, SemanticType, SkipReason, TaskKind, TaskStatus,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn pipeline_with(config: AnalysisConfig) -> Pipeline {
    Pipeline::builder()
        .config(config)
        .build()
        .expect("Pipeline should build")
}

fn pipeline() -> Pipeline {
    pipeline_with(AnalysisConfig::default())
}

fn plan(filename: &str) -> AnalysisPlan {
    pipeline().plan(&load_csv(filename)).expect("Planning should succeed")
}

fn tasks_of(plan: &AnalysisPlan, kind: TaskKind) -> Vec<&PlannedTask> {
    plan.tasks.iter().filter(|p| p.task.kind == kind).collect()
}

// ============================================================================
// Concrete Scenarios
// ============================================================================

#[test]
fn test_normal_numeric_column_gets_mean_sd_and_histogram() {
    let plan = plan("ages.csv");
    let age = plan.profile.column("age").unwrap();
    assert_eq!(age.semantic_type, SemanticType::Numeric);
    assert_eq!(age.normality().unwrap().status, AssumptionStatus::Passed);

    assert_eq!(plan.tasks.len(), 1);
    let decision = &plan.tasks[0].decision;
    assert_eq!(
        decision.procedure(),
        Some(&Procedure::NumericSummary {
            style: SummaryStyle::MeanSd
        })
    );
    assert!(decision.charts().contains(&ChartKind::Histogram));

    let report = pipeline().run(&load_csv("ages.csv")).unwrap();
    let univariate = report.section(UNIVARIATE_ANALYSIS).unwrap();
    assert_eq!(univariate.children.len(), 1);
    let payload = univariate.children[0].results[0].payload().unwrap();
    assert!(payload.figures.iter().any(|f| f.kind == ChartKind::Histogram));
}

#[test]
fn test_two_groups_with_unequal_variances_select_welch() {
    let plan = plan("treatment_scores.csv");
    let bivariate = tasks_of(&plan, TaskKind::Bivariate);
    assert_eq!(bivariate.len(), 1);

    let decision = &bivariate[0].decision;
    assert!(matches!(
        decision.procedure(),
        Some(Procedure::WelchT { grouping }) if grouping.group_column == "treatment"
    ));
    let equal_variance = decision
        .assumptions
        .iter()
        .find(|a| a.check == AssumptionCheck::EqualVariance)
        .expect("Equal variance should be recorded");
    assert_eq!(equal_variance.status, AssumptionStatus::Failed);
    assert!(decision.rationale.iter().any(|r| r.contains("equal_variance") && r.contains("failed")));

    let report = pipeline().run(&load_csv("treatment_scores.csv")).unwrap();
    let section = report.section(BIVARIATE_ANALYSIS).unwrap();
    let test = section.children[0].results[0]
        .payload()
        .and_then(|p| p.test.as_ref())
        .expect("Welch test should produce an outcome");
    assert_eq!(test.test_name, "Welch's t-test");
    assert_eq!(
        test.null_hypothesis,
        "The mean of 'score' is equal across the two groups in 'treatment'."
    );
}

#[test]
fn test_sparse_four_by_three_table_is_skipped() {
    let plan = plan("region_outcome.csv");
    let bivariate = tasks_of(&plan, TaskKind::Bivariate);
    assert_eq!(bivariate.len(), 1);
    assert_eq!(bivariate[0].task.status, TaskStatus::Skipped);

    match bivariate[0].decision.skip_reason() {
        Some(SkipReason::InsufficientExpectedCounts {
            min_expected,
            table_shape,
            ..
        }) => {
            assert_eq!(*table_shape, (4, 3));
            assert!((min_expected - 3.0).abs() < 1e-9);
        }
        other => panic!("Expected insufficient expected counts, got {other:?}"),
    }

    let report = pipeline().run(&load_csv("region_outcome.csv")).unwrap();
    let notes = report.section(NOTES_AND_LIMITATIONS).unwrap();
    assert!(
        notes
            .narrative
            .iter()
            .any(|l| l.contains("region × outcome") && l.contains("insufficient expected cell counts"))
    );
    assert!(report.section(BIVARIATE_ANALYSIS).unwrap().children.is_empty());
}

#[test]
fn test_five_numeric_columns_give_one_multivariate_task() {
    let plan = plan("five_numeric.csv");
    let multivariate = tasks_of(&plan, TaskKind::Multivariate);
    assert_eq!(multivariate.len(), 1);
    assert_eq!(multivariate[0].task.columns.len(), 5);

    let report = pipeline().run(&load_csv("five_numeric.csv")).unwrap();
    let section = report.section(MULTIVARIATE_ANALYSIS).unwrap();
    let payload = section.children[0].results[0].payload().unwrap();
    let matrix = payload.correlation_matrix.as_ref().unwrap();
    assert_eq!(matrix.values.len(), 5);
    assert_eq!(matrix.observations, 40);
    let pca = payload.pca.as_ref().unwrap();
    assert!((pca.cumulative_variance_ratio.last().unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn test_near_zero_variance_column_is_left_out_of_multivariate() {
    let plan = plan("four_numeric_flat.csv");
    let multivariate = tasks_of(&plan, TaskKind::Multivariate);
    assert_eq!(multivariate.len(), 1);
    assert_eq!(multivariate[0].task.columns, vec!["height", "weight", "reach"]);

    assert!(
        tasks_of(&plan, TaskKind::Bivariate)
            .iter()
            .all(|p| !p.task.columns.iter().any(|c| c == "constant"))
    );
    assert_eq!(
        tasks_of(&plan, TaskKind::Univariate)
            .iter()
            .filter(|p| p.task.columns == ["constant"])
            .count(),
        1
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_fully_missing_column_is_unusable_and_never_referenced() {
    let plan = plan("survey.csv");
    let blank = plan
        .profile
        .unusable
        .iter()
        .find(|u| u.name == "blank")
        .expect("Blank column should be unusable");
    assert!(matches!(blank.error, ProfilingError::NoObservations { rows: 40 }));
    assert!(plan.tasks.iter().all(|p| !p.task.columns.iter().any(|c| c == "blank")));

    let report = pipeline().run(&load_csv("survey.csv")).unwrap();
    let notes = report.section(NOTES_AND_LIMITATIONS).unwrap();
    assert!(notes.narrative.iter().any(|l| l.contains("'blank'")));
}

#[test]
fn test_task_coverage() {
    let plan = plan("survey.csv");
    let profile = &plan.profile;

    let univariate = tasks_of(&plan, TaskKind::Univariate);
    assert_eq!(univariate.len(), profile.usable_count());
    for column in &profile.columns {
        assert_eq!(
            univariate.iter().filter(|p| p.task.columns == [column.name.clone()]).count(),
            1,
            "Exactly one univariate task for '{}'",
            column.name
        );
    }

    let pairable: Vec<&str> = profile
        .columns
        .iter()
        .filter(|c| c.semantic_type != SemanticType::Text && !c.is_near_zero_variance())
        .map(|c| c.name.as_str())
        .collect();
    let bivariate = tasks_of(&plan, TaskKind::Bivariate);
    assert_eq!(bivariate.len(), pairable.len() * (pairable.len() - 1) / 2);
    assert!(bivariate.iter().all(|p| !p.task.columns.iter().any(|c| c == "comment")));
    assert_eq!(profile.column("comment").unwrap().semantic_type, SemanticType::Text);
}

#[test]
fn test_column_types_of_mixed_dataset() {
    let plan = plan("survey.csv");
    let types: Vec<(&str, SemanticType)> = plan
        .profile
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.semantic_type))
        .collect();
    assert_eq!(
        types,
        vec![
            ("age", SemanticType::Numeric),
            ("income", SemanticType::Numeric),
            ("group", SemanticType::Categorical),
            ("subscribed", SemanticType::Boolean),
            ("signup_date", SemanticType::Datetime),
            ("comment", SemanticType::Text),
            ("satisfaction", SemanticType::Numeric),
        ]
    );
}

#[test]
fn test_ordinal_override() {
    let config = AnalysisConfig::builder()
        .type_override("satisfaction", SemanticType::Ordinal)
        .build()
        .unwrap();
    let plan = pipeline_with(config).plan(&load_csv("survey.csv")).unwrap();

    let satisfaction = plan.profile.column("satisfaction").unwrap();
    assert_eq!(satisfaction.semantic_type, SemanticType::Ordinal);
    assert_eq!(satisfaction.categorical().unwrap().categories.len(), 5);

    let pair = plan
        .tasks
        .iter()
        .find(|p| p.task.columns == ["age", "satisfaction"])
        .unwrap();
    let grouped = match pair.decision.procedure() {
        Some(Procedure::OneWayAnova { grouping }) => Some(grouping),
        _ => None,
    };
    assert!(
        grouped.is_some_and(|g| g.group_column == "satisfaction") || pair.decision.is_skip(),
        "Ordinal × Numeric is a grouped comparison"
    );
}

#[test]
fn test_normality_above_sample_limit_falls_back_to_median_iqr() {
    let config = AnalysisConfig::builder()
        .normality_max_sample(10)
        .build()
        .unwrap();
    let pipeline = pipeline_with(config);
    let df = load_csv("ages.csv");

    let plan = pipeline.plan(&df).unwrap();
    let age = plan.profile.column("age").unwrap();
    assert_eq!(
        age.normality().unwrap().status,
        AssumptionStatus::SkippedByPolicy
    );
    assert_eq!(
        plan.tasks[0].decision.procedure(),
        Some(&Procedure::NumericSummary {
            style: SummaryStyle::MedianIqr
        })
    );

    let report = pipeline.run(&df).unwrap();
    let notes = report.section(NOTES_AND_LIMITATIONS).unwrap();
    assert!(notes.narrative.iter().any(|l| {
        l.starts_with("Normality of 'age' was not tested")
            && l.contains("50 observations exceed the normality test limit of 10")
    }));
}

#[test]
fn test_overview_flags_skewed_column_with_outliers() {
    let report = pipeline().run(&load_csv("survey.csv")).unwrap();
    let overview = report.section(DATASET_OVERVIEW).unwrap();

    assert!(overview.narrative.iter().any(|l| l.starts_with("'income' is highly skewed")));
    assert!(
        overview
            .narrative
            .iter()
            .any(|l| l == "'income' has 2 value(s) outside the 1.5 × IQR fences.")
    );
    assert!(!overview.narrative.iter().any(|l| l.starts_with("'age' is highly skewed")));

    let income = report.dataset.profile.column("income").unwrap();
    assert_eq!(income.numeric().unwrap().outlier_count, 2);
}

#[test]
fn test_runs_are_deterministic_across_worker_counts() {
    let df = load_csv("survey.csv");
    let sequential = pipeline_with(AnalysisConfig::builder().worker_threads(1).build().unwrap());
    let parallel = pipeline_with(AnalysisConfig::builder().worker_threads(4).build().unwrap());

    let first = sequential.run(&df).unwrap();
    let second = parallel.run(&df).unwrap();
    assert!(first.structure_eq(&second));
    assert_eq!(first.root, second.root);

    assert_eq!(sequential.plan(&df).unwrap(), parallel.plan(&df).unwrap());
}

#[test]
fn test_report_has_fixed_sections() {
    let report = pipeline().run(&load_csv("survey.csv")).unwrap();
    let titles: Vec<&str> = report.root.children.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            DATASET_OVERVIEW,
            UNIVARIATE_ANALYSIS,
            BIVARIATE_ANALYSIS,
            MULTIVARIATE_ANALYSIS,
            NOTES_AND_LIMITATIONS
        ]
    );

    let counts = report.dataset.tasks;
    assert_eq!(
        counts.executed + counts.failed + counts.skipped,
        counts.enumerated
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["root"]["children"][4]["title"], NOTES_AND_LIMITATIONS);
}

// ============================================================================
// Error Handling
// ============================================================================

#[test]
fn test_cancelled_run_returns_cancelled_error() {
    let token = CancellationToken::new();
    token.cancel();

    let result = Pipeline::builder()
        .cancellation_token(token)
        .build()
        .unwrap()
        .run(&load_csv("survey.csv"));

    assert!(matches!(result, Err(AnalysisError::Cancelled)));
}

#[test]
fn test_empty_dataset_is_rejected() {
    let df = DataFrame::empty();
    let err = pipeline().run(&df).unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_DATASET");
}

#[test]
fn test_dataset_without_usable_columns_is_rejected() {
    let df = df![
        "a" => [None::<f64>, None, None],
        "b" => [None::<&str>, None, None],
    ]
    .unwrap();
    let err = pipeline().run(&df).unwrap_err();
    assert!(matches!(err, AnalysisError::NoUsableColumns(_)));
}

#[test]
fn test_chart_specs_are_persisted() {
    let dir = std::env::temp_dir().join(format!("lex-analysis-it-{}", std::process::id()));
    let report = Pipeline::builder()
        .renderer(Arc::new(ChartSpecRenderer::new().with_output_dir(&dir)))
        .build()
        .unwrap()
        .run(&load_csv("ages.csv"))
        .unwrap();

    let figure = &report.section(UNIVARIATE_ANALYSIS).unwrap().children[0].results[0]
        .payload()
        .unwrap()
        .figures[0];
    let path = figure.path.as_ref().expect("Figure should be persisted");
    assert!(path.exists());
    assert_eq!(path.file_name().unwrap(), "T000_histogram.json");

    std::fs::remove_dir_all(&dir).ok();
}
