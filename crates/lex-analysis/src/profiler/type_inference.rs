//! Semantic type inference for column analysis.
//!
//! Rules are applied in priority order:
//! 1. every non-missing value is a date or datetime -> Datetime
//! 2. exactly two distinct values, both `0`/`1` or `true`/`false` -> Boolean
//! 3. numeric parse succeeds on at least `numeric_parse_threshold` of values -> Numeric
//! 4. distinct count within the categorical bounds -> Categorical
//! 5. otherwise -> Text

use std::collections::BTreeSet;

use super::column_data::{ColumnData, RawValues, format_datetime, format_number};
use crate::config::AnalysisConfig;
use crate::types::SemanticType;
use crate::utils::{parse_boolean_token, parse_datetime_string, parse_numeric_string};

/// Infer the semantic type of a column with at least one non-missing value.
pub(crate) fn infer_semantic_type(
    raw: &RawValues,
    row_count: usize,
    config: &AnalysisConfig,
) -> SemanticType {
    match raw {
        RawValues::Temporal(_) => SemanticType::Datetime,
        RawValues::Boolean(values) => {
            if has_both_truth_values(values) {
                SemanticType::Boolean
            } else {
                SemanticType::Categorical
            }
        }
        RawValues::Numeric(values) => {
            if is_binary_numeric(values) {
                SemanticType::Boolean
            } else {
                SemanticType::Numeric
            }
        }
        RawValues::Strings(values) => {
            let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
            if is_datetime_strings(&present) {
                SemanticType::Datetime
            } else if is_boolean_strings(&present) {
                SemanticType::Boolean
            } else if numeric_ratio(&present) >= config.numeric_parse_threshold {
                SemanticType::Numeric
            } else if is_categorical(&present, row_count, config) {
                SemanticType::Categorical
            } else {
                SemanticType::Text
            }
        }
    }
}

fn has_both_truth_values(values: &[Option<bool>]) -> bool {
    let present = || values.iter().flatten();
    present().any(|b| *b) && present().any(|b| !*b)
}

fn is_binary_numeric(values: &[Option<f64>]) -> bool {
    let mut distinct: Vec<f64> = Vec::with_capacity(2);
    for v in values.iter().flatten() {
        if !distinct.contains(v) {
            if distinct.len() == 2 {
                return false;
            }
            distinct.push(*v);
        }
    }
    distinct.len() == 2 && distinct.iter().all(|v| *v == 0.0 || *v == 1.0)
}

fn is_datetime_strings(values: &[&str]) -> bool {
    !values.is_empty() && values.iter().all(|v| parse_datetime_string(v).is_some())
}

fn is_boolean_strings(values: &[&str]) -> bool {
    let mut seen = BTreeSet::new();
    for v in values {
        match parse_boolean_token(v) {
            Some(b) => {
                seen.insert((b, v.to_ascii_lowercase()));
            }
            None => return false,
        }
    }
    // Two distinct spellings that map to both truth values.
    seen.len() == 2 && seen.iter().any(|(b, _)| *b) && seen.iter().any(|(b, _)| !*b)
}

fn numeric_ratio(values: &[&str]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let parsed = values.iter().filter(|v| parse_numeric_string(v).is_some()).count();
    parsed as f64 / values.len() as f64
}

/// Distinct count at most `categorical_max_distinct` (inclusive) or at most
/// `categorical_max_ratio` of the row count.
fn is_categorical(values: &[&str], row_count: usize, config: &AnalysisConfig) -> bool {
    let distinct: BTreeSet<&str> = values.iter().copied().collect();
    let count = distinct.len();
    count <= config.categorical_max_distinct
        || (count as f64) <= config.categorical_max_ratio * row_count as f64
}

/// Convert raw values into the row-aligned shape of `semantic_type`.
///
/// Values that do not parse under the target type become missing.
pub(crate) fn coerce(raw: &RawValues, semantic_type: SemanticType) -> ColumnData {
    match semantic_type {
        SemanticType::Numeric => ColumnData::Numeric(match raw {
            RawValues::Numeric(v) => v.clone(),
            RawValues::Boolean(v) => v.iter().map(|b| b.map(|b| if b { 1.0 } else { 0.0 })).collect(),
            RawValues::Temporal(v) => v.iter().map(|_| None).collect(),
            RawValues::Strings(v) => v
                .iter()
                .map(|s| s.as_deref().and_then(parse_numeric_string))
                .collect(),
        }),
        SemanticType::Datetime => ColumnData::Datetime(match raw {
            RawValues::Temporal(v) => v.clone(),
            RawValues::Strings(v) => v
                .iter()
                .map(|s| s.as_deref().and_then(parse_datetime_string))
                .collect(),
            RawValues::Numeric(v) => v.iter().map(|_| None).collect(),
            RawValues::Boolean(v) => v.iter().map(|_| None).collect(),
        }),
        SemanticType::Boolean => ColumnData::Labels(match raw {
            RawValues::Boolean(v) => v.iter().map(|b| b.map(|b| b.to_string())).collect(),
            _ => raw
                .display_values()
                .into_iter()
                .map(|s| s.map(|s| normalize_boolean(&s)))
                .collect(),
        }),
        SemanticType::Categorical | SemanticType::Ordinal | SemanticType::Text => {
            ColumnData::Labels(match raw {
                RawValues::Numeric(v) => v.iter().map(|x| x.map(format_number)).collect(),
                RawValues::Temporal(v) => v.iter().map(|x| x.map(format_datetime)).collect(),
                _ => raw.display_values(),
            })
        }
    }
}

fn normalize_boolean(value: &str) -> String {
    match parse_boolean_token(value) {
        Some(b) => b.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[Option<&str>]) -> RawValues {
        RawValues::Strings(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn infer(raw: &RawValues, rows: usize) -> SemanticType {
        infer_semantic_type(raw, rows, &AnalysisConfig::default())
    }

    // ==================== priority rule tests ====================

    #[test]
    fn test_date_strings_are_datetime() {
        let raw = strings(&[Some("2024-01-01"), Some("2024-02-15"), None]);
        assert_eq!(infer(&raw, 3), SemanticType::Datetime);
    }

    #[test]
    fn test_mixed_dates_and_words_are_not_datetime() {
        let raw = strings(&[Some("2024-01-01"), Some("soon"), Some("2024-02-15")]);
        assert_eq!(infer(&raw, 3), SemanticType::Categorical);
    }

    #[test]
    fn test_zero_one_numeric_is_boolean() {
        let raw = RawValues::Numeric(vec![Some(0.0), Some(1.0), Some(1.0), None]);
        assert_eq!(infer(&raw, 4), SemanticType::Boolean);
    }

    #[test]
    fn test_single_value_numeric_is_not_boolean() {
        let raw = RawValues::Numeric(vec![Some(1.0), Some(1.0)]);
        assert_eq!(infer(&raw, 2), SemanticType::Numeric);
    }

    #[test]
    fn test_boolean_dtype_needs_both_values() {
        let raw = RawValues::Boolean(vec![Some(true), None, Some(false)]);
        assert_eq!(infer(&raw, 3), SemanticType::Boolean);

        let raw = RawValues::Boolean(vec![Some(true), Some(true), Some(true), Some(true)]);
        assert_eq!(infer(&raw, 4), SemanticType::Categorical);
    }

    #[test]
    fn test_true_false_strings_are_boolean() {
        let raw = strings(&[Some("True"), Some("False"), Some("True")]);
        assert_eq!(infer(&raw, 3), SemanticType::Boolean);
    }

    #[test]
    fn test_yes_no_strings_are_categorical() {
        let raw = strings(&[Some("yes"), Some("no"), Some("yes")]);
        assert_eq!(infer(&raw, 3), SemanticType::Categorical);
    }

    #[test]
    fn test_numeric_threshold() {
        // 19 of 20 parse: exactly 95%
        let mut values: Vec<Option<&str>> = (0..19).map(|_| Some("3.5")).collect();
        values.push(Some("n/a"));
        assert_eq!(infer(&strings(&values), 20), SemanticType::Numeric);

        // 18 of 20 parse: 90%
        values[0] = Some("unknown");
        assert_eq!(infer(&strings(&values), 20), SemanticType::Categorical);
    }

    // ==================== cardinality tests ====================

    #[test]
    fn test_twenty_distinct_labels_is_categorical() {
        let labels: Vec<String> = (0..20).map(|i| format!("label_{i}")).collect();
        let raw = RawValues::Strings(labels.iter().cloned().map(Some).collect());
        assert_eq!(infer(&raw, 1000), SemanticType::Categorical);
    }

    #[test]
    fn test_twenty_one_distinct_labels_is_text() {
        let labels: Vec<String> = (0..21).map(|i| format!("label_{i}")).collect();
        let raw = RawValues::Strings(labels.iter().cloned().map(Some).collect());
        assert_eq!(infer(&raw, 100), SemanticType::Text);
    }

    #[test]
    fn test_ratio_bound_makes_categorical() {
        // 30 distinct labels over 1000 rows is 3%, under the 5% bound.
        let raw = RawValues::Strings((0..1000).map(|i| Some(format!("c{}", i % 30))).collect());
        assert_eq!(infer(&raw, 1000), SemanticType::Categorical);
    }

    #[test]
    fn test_twenty_distinct_numbers_stay_numeric() {
        let raw = RawValues::Numeric((0..20).map(|i| Some(i as f64)).collect());
        assert_eq!(infer(&raw, 20), SemanticType::Numeric);
    }

    // ==================== coercion tests ====================

    #[test]
    fn test_coerce_numeric_strings() {
        let raw = strings(&[Some("1.5"), Some("oops"), None]);
        let data = coerce(&raw, SemanticType::Numeric);
        assert_eq!(data, ColumnData::Numeric(vec![Some(1.5), None, None]));
    }

    #[test]
    fn test_coerce_boolean_labels() {
        let raw = RawValues::Numeric(vec![Some(0.0), Some(1.0), None]);
        let data = coerce(&raw, SemanticType::Boolean);
        assert_eq!(
            data,
            ColumnData::Labels(vec![Some("false".into()), Some("true".into()), None])
        );
    }

    #[test]
    fn test_coerce_numeric_to_ordinal_labels() {
        let raw = RawValues::Numeric(vec![Some(1.0), Some(2.5)]);
        let data = coerce(&raw, SemanticType::Ordinal);
        assert_eq!(data, ColumnData::Labels(vec![Some("1".into()), Some("2.5".into())]));
    }
}
