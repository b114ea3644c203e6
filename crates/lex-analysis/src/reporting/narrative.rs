//! Plain-language sentences for report sections.
//!
//! Everything here formats numbers that were already computed. No statistic
//! is derived in this module.

use crate::charts::FigureHandle;
use crate::decisions::SkipReason;
use crate::error::ExecutionFailure;
use crate::types::{
    ColumnProfile, ColumnSummary, CorrelationMatrixOutput, DatasetProfile, PcaSummary,
    SummaryOutput, TestOutcome, UnusableColumn,
};

/// Absolute skewness above which a column is called highly skewed.
pub const HIGH_SKEWNESS: f64 = 1.0;
/// Excess kurtosis above which a column is called heavy-tailed.
pub const HEAVY_TAIL_KURTOSIS: f64 = 3.0;
/// Missing share above which a column is flagged.
pub const HIGH_MISSING_RATIO: f64 = 0.05;

/// Format a p-value the way it is usually reported.
pub fn format_p_value(p: f64) -> String {
    if p < 0.001 {
        "p < 0.001".to_string()
    } else {
        format!("p = {p:.3}")
    }
}

pub fn dataset_sentences(profile: &DatasetProfile) -> Vec<String> {
    let mut lines = vec![format!(
        "The dataset has {} rows and {} columns, of which {} are usable for analysis.",
        profile.row_count,
        profile.column_count,
        profile.usable_count()
    )];
    if profile.duplicate_count > 0 {
        lines.push(format!(
            "{} rows ({:.1}%) are exact duplicates of another row.",
            profile.duplicate_count, profile.duplicate_percentage
        ));
    }
    for column in &profile.columns {
        lines.push(column_sentence(column));
        lines.extend(column_flags(column));
    }
    lines
}

/// Distribution and missingness flags for one column.
pub fn column_flags(column: &ColumnProfile) -> Vec<String> {
    let mut flags = Vec::new();
    let name = &column.name;

    if let ColumnSummary::Numeric(s) = &column.summary
        && !s.near_zero_variance
    {
        if s.skewness.abs() > HIGH_SKEWNESS {
            flags.push(format!(
                "'{name}' is highly skewed (skewness = {:.2}); robust statistics such as the median describe it better than the mean.",
                s.skewness
            ));
        }
        if s.kurtosis > HEAVY_TAIL_KURTOSIS {
            flags.push(format!(
                "'{name}' has heavy tails (excess kurtosis = {:.2}), which can weaken tests that assume normality.",
                s.kurtosis
            ));
        }
        if s.outlier_count > 0 {
            flags.push(format!(
                "'{name}' has {} value(s) outside the 1.5 × IQR fences.",
                s.outlier_count
            ));
        }
    }

    if column.missing_ratio > HIGH_MISSING_RATIO {
        flags.push(format!(
            "'{name}' is missing {:.1}% of its values; analyses use its observed rows only.",
            column.missing_ratio * 100.0
        ));
    }
    flags
}

fn column_sentence(column: &ColumnProfile) -> String {
    let mut line = format!(
        "'{}' ({}): {} observations, {} missing ({:.1}%), {} distinct values.",
        column.name,
        column.semantic_type,
        column.non_null_count,
        column.missing_count,
        column.missing_ratio * 100.0,
        column.cardinality
    );
    match &column.summary {
        ColumnSummary::Numeric(s) if s.near_zero_variance => {
            line.push_str(" Its variance is near zero, so it is left out of pairwise and multivariate analysis.");
        }
        ColumnSummary::Categorical(s) if s.high_cardinality => {
            line.push_str(" More than half of its values are distinct.");
        }
        _ => {}
    }
    line
}

pub fn summary_sentence(column: &str, summary: &SummaryOutput) -> String {
    match summary {
        SummaryOutput::MeanSd { n, mean, std_dev } => {
            format!("'{column}' has mean {mean:.3} and standard deviation {std_dev:.3} (n = {n}).")
        }
        SummaryOutput::MedianIqr {
            n,
            median,
            q1,
            q3,
            iqr,
        } => format!(
            "'{column}' has median {median:.3} with interquartile range {iqr:.3} (Q1 = {q1:.3}, Q3 = {q3:.3}, n = {n})."
        ),
        SummaryOutput::Frequencies { total, categories } => match categories.first() {
            Some(top) => format!(
                "'{column}' takes {} distinct values over {total} observations; the most frequent is '{}' ({} occurrences).",
                categories.len(),
                top.label,
                top.count
            ),
            None => format!("'{column}' has no observed categories."),
        },
        SummaryOutput::DateRange {
            min,
            max,
            range_days,
        } => format!("'{column}' spans {min} to {max} ({range_days:.1} days)."),
        SummaryOutput::TopValues { distinct, values } => {
            let top: Vec<String> = values
                .iter()
                .take(3)
                .map(|v| format!("'{}' ({})", v.label, v.count))
                .collect();
            format!(
                "'{column}' has {distinct} distinct text values; the most common are {}.",
                top.join(", ")
            )
        }
    }
}

pub fn test_sentences(outcome: &TestOutcome, alpha: f64) -> Vec<String> {
    let df = match outcome.degrees_of_freedom.as_slice() {
        [] => String::new(),
        [df] => format!(", df = {df:.2}"),
        many => {
            let parts: Vec<String> = many.iter().map(|d| format!("{d:.0}")).collect();
            format!(", df = ({})", parts.join(", "))
        }
    };
    let mut lines = vec![format!(
        "{}: statistic = {:.3}{df}, {}.",
        outcome.test_name,
        outcome.statistic,
        format_p_value(outcome.p_value)
    )];

    if let Some(effect) = &outcome.effect_size {
        lines.push(format!(
            "Effect size ({}): {:.3}.",
            effect.measure.display_name(),
            effect.value
        ));
    }
    if let Some(strength) = outcome.strength {
        let direction = if outcome.statistic < 0.0 { "negative" } else { "positive" };
        lines.push(format!(
            "The correlation is {} and {direction}.",
            strength.display_name()
        ));
    }

    lines.push(if outcome.significant {
        format!(
            "The null hypothesis is rejected at α = {alpha}: {}",
            outcome.alternative_hypothesis
        )
    } else {
        format!(
            "The null hypothesis is not rejected at α = {alpha}: {}",
            outcome.null_hypothesis
        )
    });
    lines
}

pub fn matrix_sentences(matrix: &CorrelationMatrixOutput) -> Vec<String> {
    let mut lines = vec![format!(
        "{} correlation matrix over {} columns on {} complete rows.",
        matrix.method.display_name(),
        matrix.columns.len(),
        matrix.observations
    )];

    let mut strongest: Option<(usize, usize, f64)> = None;
    for (i, row) in matrix.values.iter().enumerate() {
        for (j, &r) in row.iter().enumerate().skip(i + 1) {
            if strongest.is_none_or(|(_, _, best)| r.abs() > best.abs()) {
                strongest = Some((i, j, r));
            }
        }
    }
    if let Some((i, j, r)) = strongest {
        lines.push(format!(
            "The strongest pairwise correlation is between '{}' and '{}' ({r:.3}).",
            matrix.columns[i], matrix.columns[j]
        ));
    }
    lines
}

pub fn pca_sentence(pca: &PcaSummary) -> String {
    let first = pca.explained_variance_ratio.first().copied().unwrap_or(0.0);
    let needed = pca
        .cumulative_variance_ratio
        .iter()
        .position(|&c| c >= 0.8)
        .map_or(pca.eigenvalues.len(), |i| i + 1);
    format!(
        "The first principal component explains {:.1}% of the variance; {needed} component(s) explain at least 80%.",
        first * 100.0
    )
}

pub fn figure_sentence(figure: &FigureHandle) -> String {
    match &figure.path {
        Some(path) => format!("Figure {}: {} (saved to {}).", figure.id, figure.title, path.display()),
        None => format!("Figure {}: {}.", figure.id, figure.title),
    }
}

pub fn unusable_sentence(column: &UnusableColumn) -> String {
    format!("Column '{}' was not analyzed: {}.", column.name, column.error)
}

pub fn skipped_sentence(task: &str, reason: &SkipReason) -> String {
    format!("{task} was skipped: {reason}.")
}

pub fn failed_sentence(task: &str, failure: &ExecutionFailure) -> String {
    format!("{task} failed ({failure}).")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AssumptionCheck, AssumptionResult, AssumptionStatus, CorrelationStrength, EffectMeasure,
        EffectSize, NumericSummary, SemanticType,
    };
    use std::collections::BTreeMap;

    fn numeric_column(skewness: f64, kurtosis: f64, outlier_count: usize, missing_ratio: f64) -> ColumnProfile {
        ColumnProfile {
            name: "income".into(),
            index: 0,
            semantic_type: SemanticType::Numeric,
            dtype: "Float64".into(),
            cardinality: 100,
            non_null_count: 100,
            missing_count: (missing_ratio * 100.0).round() as usize,
            missing_ratio,
            sample_values: Vec::new(),
            summary: ColumnSummary::Numeric(NumericSummary {
                count: 100,
                mean: 10.0,
                variance: 4.0,
                std_dev: 2.0,
                skewness,
                kurtosis,
                min: 1.0,
                max: 20.0,
                median: 10.0,
                q1: 8.0,
                q3: 12.0,
                iqr: 4.0,
                p10: 7.0,
                p90: 13.0,
                outlier_count,
                near_zero_variance: false,
                normality: AssumptionResult::new(
                    AssumptionCheck::Normality,
                    vec!["income".into()],
                    AssumptionStatus::Passed,
                    "normal",
                ),
            }),
        }
    }

    fn outcome(significant: bool) -> TestOutcome {
        TestOutcome {
            test_name: "Pearson correlation".into(),
            statistic: -0.82,
            p_value: 0.0004,
            effect_size: Some(EffectSize {
                measure: EffectMeasure::Correlation,
                value: -0.82,
            }),
            degrees_of_freedom: vec![28.0],
            significant,
            null_hypothesis: "There is no correlation between 'a' and 'b'.".into(),
            alternative_hypothesis: "There is a correlation between 'a' and 'b'.".into(),
            strength: Some(CorrelationStrength::Strong),
            extras: BTreeMap::new(),
        }
    }

    #[test]
    fn test_p_value_formatting() {
        assert_eq!(format_p_value(0.0004), "p < 0.001");
        assert_eq!(format_p_value(0.0412), "p = 0.041");
    }

    #[test]
    fn test_test_sentences_state_conclusion() {
        let lines = test_sentences(&outcome(true), 0.05);
        assert_eq!(lines[0], "Pearson correlation: statistic = -0.820, df = 28.00, p < 0.001.");
        assert!(lines.iter().any(|l| l == "The correlation is strong and negative."));
        assert!(lines.last().unwrap().contains("rejected at α = 0.05"));

        let lines = test_sentences(&outcome(false), 0.05);
        assert!(lines.last().unwrap().ends_with("There is no correlation between 'a' and 'b'."));
    }

    #[test]
    fn test_pca_sentence_counts_components() {
        let pca = PcaSummary {
            eigenvalues: vec![2.0, 0.6, 0.4],
            explained_variance_ratio: vec![2.0 / 3.0, 0.2, 0.4 / 3.0],
            cumulative_variance_ratio: vec![2.0 / 3.0, 2.0 / 3.0 + 0.2, 1.0],
        };
        let sentence = pca_sentence(&pca);
        assert!(sentence.contains("66.7%"));
        assert!(sentence.contains("2 component(s)"));
    }

    // ==================== column flag tests ====================

    #[test]
    fn test_well_behaved_column_has_no_flags() {
        assert!(column_flags(&numeric_column(0.4, 0.5, 0, 0.0)).is_empty());
    }

    #[test]
    fn test_skewness_flag_threshold() {
        assert!(column_flags(&numeric_column(1.0, 0.0, 0, 0.0)).is_empty());
        let flags = column_flags(&numeric_column(-1.8, 0.0, 0, 0.0));
        assert_eq!(flags.len(), 1);
        assert!(flags[0].contains("highly skewed (skewness = -1.80)"));
    }

    #[test]
    fn test_kurtosis_flag_threshold() {
        assert!(column_flags(&numeric_column(0.0, 3.0, 0, 0.0)).is_empty());
        let flags = column_flags(&numeric_column(0.0, 4.25, 0, 0.0));
        assert_eq!(flags, vec!["'income' has heavy tails (excess kurtosis = 4.25), which can weaken tests that assume normality."]);
    }

    #[test]
    fn test_outlier_flag() {
        let flags = column_flags(&numeric_column(0.0, 0.0, 3, 0.0));
        assert_eq!(flags, vec!["'income' has 3 value(s) outside the 1.5 × IQR fences."]);
    }

    #[test]
    fn test_missing_flag_threshold() {
        assert!(column_flags(&numeric_column(0.0, 0.0, 0, 0.05)).is_empty());
        let flags = column_flags(&numeric_column(0.0, 0.0, 0, 0.12));
        assert_eq!(flags.len(), 1);
        assert!(flags[0].contains("missing 12.0% of its values"));
    }

    #[test]
    fn test_near_zero_variance_column_skips_shape_flags() {
        let mut column = numeric_column(2.0, 5.0, 4, 0.0);
        if let ColumnSummary::Numeric(s) = &mut column.summary {
            s.near_zero_variance = true;
        }
        assert!(column_flags(&column).is_empty());
    }

    #[test]
    fn test_dataset_sentences_place_flags_after_column() {
        let profile = DatasetProfile {
            row_count: 100,
            column_count: 1,
            duplicate_count: 0,
            duplicate_percentage: 0.0,
            columns: vec![numeric_column(2.5, 0.0, 0, 0.0)],
            unusable: Vec::new(),
        };
        let lines = dataset_sentences(&profile);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("'income' (Numeric)"));
        assert!(lines[2].contains("highly skewed"));
    }
}
