//! Variable Profiler.
//!
//! This module classifies every column of a dataset and computes its
//! descriptive statistics:
//! - Semantic type inference (or an explicit override)
//! - Missingness and cardinality
//! - Per-type summaries, including the normality check for Numeric columns
//! - Duplicate-row detection
//!
//! Columns without a single observation are recorded as unusable instead of
//! failing the run.

mod column_data;
mod statistics;
mod type_inference;

pub use column_data::{
    ColumnData, Contingency, complete_pairs, complete_rows, cross_tabulate, monthly_counts,
    group_by_label, present, monthly_means,
};

use polars::prelude::*;
use rand::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ProfilingError, Result, ResultExt};
use crate::stats::StatisticalBackend;
use crate::types::{ColumnProfile, ColumnSummary, DatasetProfile, SemanticType, UnusableColumn};
use column_data::{RawValues, read_raw};
use statistics::{categorical_summary, datetime_summary, numeric_summary, text_summary};
use type_inference::{coerce, infer_semantic_type};

/// Profiles plus the typed column data they were computed from.
///
/// Both are read-only for the rest of the run.
#[derive(Debug, Clone)]
pub struct ProfiledDataset {
    profile: DatasetProfile,
    data: HashMap<String, ColumnData>,
}

impl ProfiledDataset {
    pub fn profile(&self) -> &DatasetProfile {
        &self.profile
    }

    pub fn column_data(&self, name: &str) -> Option<&ColumnData> {
        self.data.get(name)
    }

    pub fn into_profile(self) -> DatasetProfile {
        self.profile
    }
}

/// Data profiler for analyzing dataset structure and characteristics.
pub struct DataProfiler {
    config: AnalysisConfig,
    backend: Arc<dyn StatisticalBackend>,
}

enum ColumnOutcome {
    Usable(ColumnProfile, ColumnData),
    Unusable(UnusableColumn),
}

impl DataProfiler {
    pub fn new(config: AnalysisConfig, backend: Arc<dyn StatisticalBackend>) -> Self {
        Self { config, backend }
    }

    /// Profile an entire dataset.
    ///
    /// Fails only for structural problems: no rows, no columns, or no usable
    /// column at all.
    pub fn profile(&self, df: &DataFrame) -> Result<ProfiledDataset> {
        let (rows, width) = (df.height(), df.width());
        if rows == 0 || width == 0 {
            return Err(AnalysisError::EmptyDataset {
                rows,
                columns: width,
            });
        }

        info!("Profiling {} columns over {} rows", width, rows);

        let mut columns = Vec::new();
        let mut unusable = Vec::new();
        let mut data = HashMap::new();

        for (index, column) in df.get_columns().iter().enumerate() {
            match self.profile_column(column.as_materialized_series(), index, rows) {
                ColumnOutcome::Usable(profile, values) => {
                    debug!(
                        "Column '{}' profiled as {} ({} distinct, {:.1}% missing)",
                        profile.name,
                        profile.semantic_type,
                        profile.cardinality,
                        profile.missing_ratio * 100.0
                    );
                    data.insert(profile.name.clone(), values);
                    columns.push(profile);
                }
                ColumnOutcome::Unusable(column) => {
                    warn!("Column '{}' is unusable: {}", column.name, column.error);
                    unusable.push(column);
                }
            }
        }

        if columns.is_empty() {
            return Err(AnalysisError::NoUsableColumns(format!(
                "all {width} column(s) are unusable"
            )));
        }

        // Detect duplicates
        let duplicate_count = rows
            - df
                .unique::<&str, &str>(None, UniqueKeepStrategy::First, None)
                .context("Duplicate detection failed")?
                .height();
        let duplicate_percentage = (duplicate_count as f64 / rows as f64) * 100.0;

        info!(
            "Profiled {} usable and {} unusable column(s), {} duplicate row(s)",
            columns.len(),
            unusable.len(),
            duplicate_count
        );

        Ok(ProfiledDataset {
            profile: DatasetProfile {
                row_count: rows,
                column_count: width,
                duplicate_count,
                duplicate_percentage,
                columns,
                unusable,
            },
            data,
        })
    }

    fn profile_column(&self, series: &Series, index: usize, rows: usize) -> ColumnOutcome {
        let name = series.name().to_string();
        let unusable = |error| {
            ColumnOutcome::Unusable(UnusableColumn {
                name: name.clone(),
                index,
                error,
            })
        };

        let raw = match read_raw(series) {
            Ok(raw) => raw,
            Err(e) => return unusable(ProfilingError::ColumnRead(e.to_string())),
        };
        if raw.non_null_count() == 0 {
            return unusable(ProfilingError::NoObservations { rows });
        }

        let semantic_type = match self.config.type_overrides.get(&name) {
            Some(declared) => *declared,
            None => infer_semantic_type(&raw, rows, &self.config),
        };

        // An override can turn every value into a parse failure.
        let values = coerce(&raw, semantic_type);
        let non_null_count = values.non_null_count();
        if non_null_count == 0 {
            return unusable(ProfilingError::NoObservations { rows });
        }

        let summary = self.summarize(&name, semantic_type, &values, rows);
        let cardinality = distinct_count(&values);
        let missing_count = rows - non_null_count;

        let profile = ColumnProfile {
            sample_values: self.sample_values(&raw, index),
            name,
            index,
            semantic_type,
            dtype: format!("{:?}", series.dtype()),
            cardinality,
            non_null_count,
            missing_count,
            missing_ratio: missing_count as f64 / rows as f64,
            summary,
        };
        ColumnOutcome::Usable(profile, values)
    }

    fn summarize(
        &self,
        name: &str,
        semantic_type: SemanticType,
        values: &ColumnData,
        rows: usize,
    ) -> ColumnSummary {
        match values {
            ColumnData::Numeric(v) => ColumnSummary::Numeric(numeric_summary(
                name,
                &present(v),
                &self.config,
                self.backend.as_ref(),
            )),
            ColumnData::Datetime(v) => {
                let times: Vec<_> = v.iter().flatten().copied().collect();
                match datetime_summary(&times) {
                    Some(summary) => ColumnSummary::Datetime(summary),
                    None => ColumnSummary::Text(text_summary(&[])),
                }
            }
            ColumnData::Labels(v) => {
                let labels: Vec<&str> = v.iter().flatten().map(String::as_str).collect();
                if semantic_type == SemanticType::Text {
                    ColumnSummary::Text(text_summary(&labels))
                } else {
                    ColumnSummary::Categorical(categorical_summary(&labels, rows))
                }
            }
        }
    }

    /// Up to `sample_value_count` distinct display values, chosen with a
    /// seeded generator so profiles are reproducible.
    fn sample_values(&self, raw: &RawValues, index: usize) -> Vec<String> {
        let distinct: BTreeSet<String> = raw.display_values().into_iter().flatten().collect();
        let candidates: Vec<String> = distinct.into_iter().collect();
        let sample_size = self.config.sample_value_count.min(candidates.len());
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(index as u64));
        candidates
            .choose_multiple(&mut rng, sample_size)
            .cloned()
            .collect()
    }
}

fn distinct_count(values: &ColumnData) -> usize {
    match values {
        ColumnData::Numeric(v) => v
            .iter()
            .flatten()
            .map(|x| x.to_bits())
            .collect::<BTreeSet<_>>()
            .len(),
        ColumnData::Labels(v) => v.iter().flatten().collect::<BTreeSet<_>>().len(),
        ColumnData::Datetime(v) => v.iter().flatten().collect::<BTreeSet<_>>().len(),
    }
}
