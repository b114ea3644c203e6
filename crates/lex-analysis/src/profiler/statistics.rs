//! Per-type summaries for column profiling.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::assumptions::check_normality;
use crate::config::AnalysisConfig;
use crate::stats::StatisticalBackend;
use crate::stats::descriptive::{
    excess_kurtosis, mean, quantile, sample_variance, skewness, sorted, tukey_fences,
};
use crate::types::{CategoricalSummary, CategoryCount, DatetimeSummary, NumericSummary, TextSummary};

const TOP_TEXT_VALUES: usize = 10;

/// Descriptive statistics and normality of a non-empty numeric sample.
pub(crate) fn numeric_summary(
    column: &str,
    values: &[f64],
    config: &AnalysisConfig,
    backend: &dyn StatisticalBackend,
) -> NumericSummary {
    let s = sorted(values);
    let variance = sample_variance(values);
    let q1 = quantile(&s, 0.25);
    let q3 = quantile(&s, 0.75);
    let (lo, hi) = tukey_fences(q1, q3);

    NumericSummary {
        count: values.len(),
        mean: mean(values),
        variance,
        std_dev: variance.sqrt(),
        skewness: skewness(values),
        kurtosis: excess_kurtosis(values),
        min: s.first().copied().unwrap_or(0.0),
        max: s.last().copied().unwrap_or(0.0),
        median: quantile(&s, 0.5),
        q1,
        q3,
        iqr: q3 - q1,
        p10: quantile(&s, 0.10),
        p90: quantile(&s, 0.90),
        outlier_count: s.iter().filter(|v| **v < lo || **v > hi).count(),
        near_zero_variance: variance < config.near_zero_variance_epsilon,
        normality: check_normality(column, values, config, backend),
    }
}

/// Frequencies sorted by descending count, ties broken by label.
pub(crate) fn category_counts<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut out: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(label, count)| CategoryCount {
            label: label.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

pub(crate) fn categorical_summary(labels: &[&str], row_count: usize) -> CategoricalSummary {
    let categories = category_counts(labels.iter().copied());
    CategoricalSummary {
        most_frequent: categories.first().map(|c| c.label.clone()),
        high_cardinality: row_count > 0 && categories.len() as f64 > 0.5 * row_count as f64,
        categories,
    }
}

pub(crate) fn datetime_summary(values: &[NaiveDateTime]) -> Option<DatetimeSummary> {
    let min = values.iter().min().copied()?;
    let max = values.iter().max().copied()?;
    Some(DatetimeSummary {
        min,
        max,
        range_days: (max - min).num_seconds() as f64 / 86_400.0,
    })
}

pub(crate) fn text_summary(labels: &[&str]) -> TextSummary {
    let counts = category_counts(labels.iter().copied());
    let avg_length = if labels.is_empty() {
        0.0
    } else {
        labels.iter().map(|s| s.chars().count()).sum::<usize>() as f64 / labels.len() as f64
    };
    TextSummary {
        distinct_count: counts.len(),
        avg_length,
        top_values: counts.into_iter().take(TOP_TEXT_VALUES).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::NativeBackend;
    use crate::types::AssumptionStatus;
    use chrono::NaiveDate;

    // ==================== numeric_summary tests ====================

    #[test]
    fn test_numeric_summary_basic() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let summary = numeric_summary("x", &values, &AnalysisConfig::default(), &NativeBackend);
        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean, 3.0);
        assert!((summary.variance - 2.5).abs() < 1e-12);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.iqr, 2.0);
        assert_eq!(summary.outlier_count, 0);
        assert!(!summary.near_zero_variance);
    }

    #[test]
    fn test_numeric_summary_counts_values_beyond_fences() {
        // Q1 = 2, Q3 = 4, fences at -1 and 7.
        let values = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 5.0, 40.0, -30.0];
        let summary = numeric_summary("x", &values, &AnalysisConfig::default(), &NativeBackend);
        assert_eq!((summary.q1, summary.q3), (2.0, 4.0));
        assert_eq!(summary.outlier_count, 2);
    }

    #[test]
    fn test_numeric_summary_flags_constant_column() {
        let values = [7.0; 10];
        let summary = numeric_summary("c", &values, &AnalysisConfig::default(), &NativeBackend);
        assert!(summary.near_zero_variance);
        assert_eq!(summary.normality.status, AssumptionStatus::Failed);
    }

    #[test]
    fn test_numeric_summary_small_sample_normality() {
        let values = [1.0, 2.0, 4.0];
        let summary = numeric_summary("s", &values, &AnalysisConfig::default(), &NativeBackend);
        assert_eq!(summary.normality.status, AssumptionStatus::InsufficientData);
    }

    // ==================== category tests ====================

    #[test]
    fn test_category_counts_order() {
        let counts = category_counts(["b", "a", "b", "c", "a", "b"]);
        let labels: Vec<&str> = counts.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
        assert_eq!(counts[0].count, 3);
    }

    #[test]
    fn test_categorical_summary_high_cardinality() {
        let summary = categorical_summary(&["a", "b", "c", "d"], 4);
        assert!(summary.high_cardinality);
        let summary = categorical_summary(&["a", "a", "a", "b"], 4);
        assert!(!summary.high_cardinality);
        assert_eq!(summary.most_frequent.as_deref(), Some("a"));
    }

    // ==================== datetime and text tests ====================

    #[test]
    fn test_datetime_summary_range() {
        let d = |day: u32| {
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let summary = datetime_summary(&[d(10), d(1), d(31)]).unwrap();
        assert_eq!(summary.min, d(1));
        assert_eq!(summary.range_days, 30.0);
        assert!(datetime_summary(&[]).is_none());
    }

    #[test]
    fn test_text_summary() {
        let summary = text_summary(&["hello", "world", "hello"]);
        assert_eq!(summary.distinct_count, 2);
        assert_eq!(summary.avg_length, 5.0);
        assert_eq!(summary.top_values[0].label, "hello");
    }
}
