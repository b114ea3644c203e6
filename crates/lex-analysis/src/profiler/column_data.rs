//! Row-aligned column values extracted from a polars frame.
//!
//! Every column is reduced to one of three shapes with `None` as the single
//! missing marker. Helpers here pair, group and cross-tabulate columns on
//! complete rows for the checker and the coordinator.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::utils::{DtypeCategory, get_dtype_category};

/// Raw values as stored, before semantic inference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValues {
    Numeric(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Temporal(Vec<Option<NaiveDateTime>>),
    Strings(Vec<Option<String>>),
}

impl RawValues {
    pub(crate) fn non_null_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().flatten().count(),
            Self::Boolean(v) => v.iter().flatten().count(),
            Self::Temporal(v) => v.iter().flatten().count(),
            Self::Strings(v) => v.iter().flatten().count(),
        }
    }

    /// Display strings of every row, `None` where missing.
    pub(crate) fn display_values(&self) -> Vec<Option<String>> {
        match self {
            Self::Numeric(v) => v.iter().map(|x| x.map(format_number)).collect(),
            Self::Boolean(v) => v.iter().map(|x| x.map(|b| b.to_string())).collect(),
            Self::Temporal(v) => v.iter().map(|x| x.map(format_datetime)).collect(),
            Self::Strings(v) => v.clone(),
        }
    }
}

/// Read a polars series into [`RawValues`].
///
/// Non-finite floats and blank strings are treated as missing.
pub(crate) fn read_raw(series: &Series) -> PolarsResult<RawValues> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => {
            let floats = series.cast(&DataType::Float64)?;
            let values = floats
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            Ok(RawValues::Numeric(values))
        }
        DtypeCategory::Boolean => Ok(RawValues::Boolean(series.bool()?.into_iter().collect())),
        DtypeCategory::Datetime => {
            let text = series.cast(&DataType::String)?;
            let values = text
                .str()?
                .into_iter()
                .map(|v| v.and_then(crate::utils::parse_datetime_string))
                .collect();
            Ok(RawValues::Temporal(values))
        }
        DtypeCategory::String | DtypeCategory::Other => {
            let text = series.cast(&DataType::String)?;
            let values = text
                .str()?
                .into_iter()
                .map(|v| {
                    v.map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .collect();
            Ok(RawValues::Strings(values))
        }
    }
}

/// Values of a profiled column, aligned by row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    /// Categorical, Ordinal, Boolean and Text columns.
    Labels(Vec<Option<String>>),
    Datetime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Labels(v) => v.len(),
            Self::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn non_null_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().flatten().count(),
            Self::Labels(v) => v.iter().flatten().count(),
            Self::Datetime(v) => v.iter().flatten().count(),
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Self::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Labels(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&[Option<NaiveDateTime>]> {
        match self {
            Self::Datetime(v) => Some(v),
            _ => None,
        }
    }
}

/// Contingency counts of two label columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

impl Contingency {
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Expected counts under independence.
    pub fn expected_counts(&self) -> Vec<Vec<f64>> {
        let total = self.total() as f64;
        let row_totals: Vec<f64> = self.counts.iter().map(|r| r.iter().sum::<u64>() as f64).collect();
        let col_totals: Vec<f64> = (0..self.col_labels.len())
            .map(|j| self.counts.iter().map(|r| r[j]).sum::<u64>() as f64)
            .collect();
        row_totals
            .iter()
            .map(|r| col_totals.iter().map(|c| r * c / total).collect())
            .collect()
    }
}

pub(crate) fn format_number(value: f64) -> String {
    format!("{value}")
}

pub(crate) fn format_datetime(value: NaiveDateTime) -> String {
    if value.time() == chrono::NaiveTime::MIN {
        value.date().format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Non-missing values of a numeric column.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Values of two numeric columns on rows where both are present.
pub fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip()
}

/// Columns restricted to rows where every column is present, column-major.
pub fn complete_rows(columns: &[&[Option<f64>]]) -> Vec<Vec<f64>> {
    let n = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut out = vec![Vec::new(); columns.len()];
    for row in 0..n {
        if columns.iter().all(|c| c[row].is_some()) {
            for (target, column) in out.iter_mut().zip(columns) {
                if let Some(v) = column[row] {
                    target.push(v);
                }
            }
        }
    }
    out
}

/// Numeric values grouped by label on complete rows, ordered by label.
pub fn group_by_label(labels: &[Option<String>], values: &[Option<f64>]) -> Vec<(String, Vec<f64>)> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (label, value) in labels.iter().zip(values) {
        if let (Some(label), Some(value)) = (label, value) {
            groups.entry(label.as_str()).or_default().push(*value);
        }
    }
    groups
        .into_iter()
        .map(|(label, values)| (label.to_string(), values))
        .collect()
}

/// Cross-tabulate two label columns on complete rows. Labels are sorted.
pub fn cross_tabulate(rows: &[Option<String>], cols: &[Option<String>]) -> Contingency {
    let mut cells: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    let mut row_set: BTreeSet<&str> = BTreeSet::new();
    let mut col_set: BTreeSet<&str> = BTreeSet::new();
    for (r, c) in rows.iter().zip(cols) {
        if let (Some(r), Some(c)) = (r, c) {
            *cells.entry((r.as_str(), c.as_str())).or_default() += 1;
            row_set.insert(r.as_str());
            col_set.insert(c.as_str());
        }
    }

    let row_labels: Vec<&str> = row_set.into_iter().collect();
    let col_labels: Vec<&str> = col_set.into_iter().collect();
    let counts = row_labels
        .iter()
        .map(|r| {
            col_labels
                .iter()
                .map(|c| cells.get(&(*r, *c)).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Contingency {
        row_labels: row_labels.into_iter().map(str::to_string).collect(),
        col_labels: col_labels.into_iter().map(str::to_string).collect(),
        counts,
    }
}

/// First day of the calendar month containing `t`.
pub fn month_start(t: NaiveDateTime) -> NaiveDate {
    t.date().with_day(1).unwrap_or(t.date())
}

/// Mean of the numeric values per calendar month, on complete rows.
pub fn monthly_means(times: &[Option<NaiveDateTime>], values: &[Option<f64>]) -> Vec<(NaiveDate, f64)> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (t, v) in times.iter().zip(values) {
        if let (Some(t), Some(v)) = (t, v) {
            let bucket = buckets.entry(month_start(*t)).or_default();
            bucket.0 += v;
            bucket.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(month, (sum, n))| (month, sum / n as f64))
        .collect()
}

/// Number of observations per calendar month.
pub fn monthly_counts(times: &[Option<NaiveDateTime>]) -> Vec<(NaiveDate, usize)> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for t in times.iter().flatten() {
        *counts.entry(month_start(*t)).or_default() += 1;
    }
    counts.into_iter().collect()
}
