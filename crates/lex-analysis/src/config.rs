//! Configuration types for the analysis engine.
//!
//! [`AnalysisConfig`] is immutable once built and is handed to the profiler,
//! assumption checker, task enumerator, selector and execution coordinator at
//! construction. No component reads thresholds from global state.

use crate::types::SemanticType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Thresholds and policies for one analysis run.
///
/// Use [`AnalysisConfig::builder()`] to create a configuration with a
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_analysis::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .alpha(0.01)
///     .categorical_max_distinct(10)
///     .include_pca(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// A non-numeric column with at most this many distinct values is Categorical.
    /// Default: 20
    pub categorical_max_distinct: usize,

    /// A non-numeric column whose distinct count is at most this share of the
    /// row count is Categorical.
    /// Default: 0.05 (5%)
    pub categorical_max_ratio: f64,

    /// Share of non-null values that must parse as numbers for a column to be Numeric.
    /// Default: 0.95 (95%)
    pub numeric_parse_threshold: f64,

    /// Variance below this value flags a numeric column as near-zero-variance.
    /// Default: 1e-8
    pub near_zero_variance_epsilon: f64,

    /// Smallest sample the normality test accepts.
    /// Default: 5
    pub normality_min_sample: usize,

    /// Largest sample the normality test accepts. Larger samples are not tested
    /// and are assumed non-normal.
    /// Default: 5000
    pub normality_max_sample: usize,

    /// Significance level for assumption checks and test conclusions.
    /// Default: 0.05
    pub alpha: f64,

    /// Smallest acceptable expected cell count for the chi-square test.
    /// Default: 5.0
    pub min_expected_cell_count: f64,

    /// Minimum observations per group for the equal-variance check.
    /// Default: 2
    pub min_group_size: usize,

    /// Minimum number of Numeric columns for a Multivariate task.
    /// Default: 3
    pub multivariate_min_columns: usize,

    /// Whether the Multivariate task adds a PCA explained-variance summary.
    /// Default: true
    pub include_pca: bool,

    /// Bar charts with more categories than this show the top 10 plus "Other".
    /// Default: 12
    pub max_category_bars: usize,

    /// Number of sample values recorded per column profile.
    /// Default: 5
    pub sample_value_count: usize,

    /// Seed for sample-value selection.
    /// Default: 42
    pub seed: u64,

    /// Number of execution workers. `None` uses the available parallelism.
    /// Default: None
    pub worker_threads: Option<usize>,

    /// Explicit semantic types that replace inference for named columns.
    /// This is the only way a column becomes Ordinal.
    /// Default: empty
    #[serde(default)]
    pub type_overrides: BTreeMap<String, SemanticType>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            categorical_max_distinct: 20,
            categorical_max_ratio: 0.05,
            numeric_parse_threshold: 0.95,
            near_zero_variance_epsilon: 1e-8,
            normality_min_sample: 5,
            normality_max_sample: 5000,
            alpha: 0.05,
            min_expected_cell_count: 5.0,
            min_group_size: 2,
            multivariate_min_columns: 3,
            include_pca: true,
            max_category_bars: 12,
            sample_value_count: 5,
            seed: 42,
            worker_threads: None,
            type_overrides: BTreeMap::new(),
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let unit_interval = [
            ("categorical_max_ratio", self.categorical_max_ratio),
            ("numeric_parse_threshold", self.numeric_parse_threshold),
        ];
        for (field, value) in unit_interval {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigValidationError::InvalidAlpha(self.alpha));
        }

        if !(self.near_zero_variance_epsilon >= 0.0) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "near_zero_variance_epsilon".to_string(),
                value: self.near_zero_variance_epsilon,
            });
        }

        if !(self.min_expected_cell_count > 0.0) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "min_expected_cell_count".to_string(),
                value: self.min_expected_cell_count,
            });
        }

        if self.normality_min_sample < 3 || self.normality_max_sample < self.normality_min_sample
        {
            return Err(ConfigValidationError::InvalidSampleBounds {
                min: self.normality_min_sample,
                max: self.normality_max_sample,
            });
        }

        if self.min_group_size < 2 {
            return Err(ConfigValidationError::InvalidCount {
                field: "min_group_size".to_string(),
                value: self.min_group_size,
                minimum: 2,
            });
        }

        if self.multivariate_min_columns < 2 {
            return Err(ConfigValidationError::InvalidCount {
                field: "multivariate_min_columns".to_string(),
                value: self.multivariate_min_columns,
                minimum: 2,
            });
        }

        if self.max_category_bars < 2 {
            return Err(ConfigValidationError::InvalidCount {
                field: "max_category_bars".to_string(),
                value: self.max_category_bars,
                minimum: 2,
            });
        }

        if self.worker_threads == Some(0) {
            return Err(ConfigValidationError::InvalidCount {
                field: "worker_threads".to_string(),
                value: 0,
                minimum: 1,
            });
        }

        Ok(())
    }

    /// Worker count to use, resolving `None` to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid alpha: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidAlpha(f64),

    #[error("Invalid normality sample bounds: min {min}, max {max} (min must be at least 3 and not exceed max)")]
    InvalidSampleBounds { min: usize, max: usize },

    #[error("Invalid value for '{field}': {value} (must be at least {minimum})")]
    InvalidCount {
        field: String,
        value: usize,
        minimum: usize,
    },
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    categorical_max_distinct: Option<usize>,
    categorical_max_ratio: Option<f64>,
    numeric_parse_threshold: Option<f64>,
    near_zero_variance_epsilon: Option<f64>,
    normality_min_sample: Option<usize>,
    normality_max_sample: Option<usize>,
    alpha: Option<f64>,
    min_expected_cell_count: Option<f64>,
    min_group_size: Option<usize>,
    multivariate_min_columns: Option<usize>,
    include_pca: Option<bool>,
    max_category_bars: Option<usize>,
    sample_value_count: Option<usize>,
    seed: Option<u64>,
    worker_threads: Option<usize>,
    type_overrides: BTreeMap<String, SemanticType>,
}

impl AnalysisConfigBuilder {
    /// Set the distinct-count bound for Categorical columns.
    pub fn categorical_max_distinct(mut self, count: usize) -> Self {
        self.categorical_max_distinct = Some(count);
        self
    }

    /// Set the distinct/row-count ratio bound for Categorical columns.
    ///
    /// # Arguments
    /// * `ratio` - Value in (0.0, 1.0] (e.g., 0.05 = 5% of rows)
    pub fn categorical_max_ratio(mut self, ratio: f64) -> Self {
        self.categorical_max_ratio = Some(ratio);
        self
    }

    /// Set the share of values that must parse as numbers.
    pub fn numeric_parse_threshold(mut self, threshold: f64) -> Self {
        self.numeric_parse_threshold = Some(threshold);
        self
    }

    /// Set the variance epsilon for near-zero-variance detection.
    pub fn near_zero_variance_epsilon(mut self, epsilon: f64) -> Self {
        self.near_zero_variance_epsilon = Some(epsilon);
        self
    }

    /// Set the smallest sample the normality test accepts.
    pub fn normality_min_sample(mut self, n: usize) -> Self {
        self.normality_min_sample = Some(n);
        self
    }

    /// Set the largest sample the normality test accepts.
    ///
    /// Columns with more observations are assumed non-normal and the
    /// fallback is recorded in the report.
    pub fn normality_max_sample(mut self, n: usize) -> Self {
        self.normality_max_sample = Some(n);
        self
    }

    /// Set the significance level.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Set the minimum expected cell count for chi-square.
    pub fn min_expected_cell_count(mut self, count: f64) -> Self {
        self.min_expected_cell_count = Some(count);
        self
    }

    /// Set the minimum group size for the equal-variance check.
    pub fn min_group_size(mut self, size: usize) -> Self {
        self.min_group_size = Some(size);
        self
    }

    /// Set the minimum number of Numeric columns for a Multivariate task.
    pub fn multivariate_min_columns(mut self, count: usize) -> Self {
        self.multivariate_min_columns = Some(count);
        self
    }

    /// Enable or disable the PCA summary of the Multivariate task.
    pub fn include_pca(mut self, include: bool) -> Self {
        self.include_pca = Some(include);
        self
    }

    /// Set the category count above which bar charts are collapsed.
    pub fn max_category_bars(mut self, count: usize) -> Self {
        self.max_category_bars = Some(count);
        self
    }

    /// Set the number of sample values recorded per column.
    pub fn sample_value_count(mut self, count: usize) -> Self {
        self.sample_value_count = Some(count);
        self
    }

    /// Set the seed used for sample-value selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of execution workers.
    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = Some(workers);
        self
    }

    /// Declare the semantic type of a column instead of inferring it.
    pub fn type_override(mut self, column: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.type_overrides.insert(column.into(), semantic_type);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            categorical_max_distinct: self
                .categorical_max_distinct
                .unwrap_or(defaults.categorical_max_distinct),
            categorical_max_ratio: self
                .categorical_max_ratio
                .unwrap_or(defaults.categorical_max_ratio),
            numeric_parse_threshold: self
                .numeric_parse_threshold
                .unwrap_or(defaults.numeric_parse_threshold),
            near_zero_variance_epsilon: self
                .near_zero_variance_epsilon
                .unwrap_or(defaults.near_zero_variance_epsilon),
            normality_min_sample: self
                .normality_min_sample
                .unwrap_or(defaults.normality_min_sample),
            normality_max_sample: self
                .normality_max_sample
                .unwrap_or(defaults.normality_max_sample),
            alpha: self.alpha.unwrap_or(defaults.alpha),
            min_expected_cell_count: self
                .min_expected_cell_count
                .unwrap_or(defaults.min_expected_cell_count),
            min_group_size: self.min_group_size.unwrap_or(defaults.min_group_size),
            multivariate_min_columns: self
                .multivariate_min_columns
                .unwrap_or(defaults.multivariate_min_columns),
            include_pca: self.include_pca.unwrap_or(defaults.include_pca),
            max_category_bars: self.max_category_bars.unwrap_or(defaults.max_category_bars),
            sample_value_count: self
                .sample_value_count
                .unwrap_or(defaults.sample_value_count),
            seed: self.seed.unwrap_or(defaults.seed),
            worker_threads: self.worker_threads,
            type_overrides: self.type_overrides,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.categorical_max_distinct, 20);
        assert_eq!(config.categorical_max_ratio, 0.05);
        assert_eq!(config.numeric_parse_threshold, 0.95);
        assert_eq!(config.normality_max_sample, 5000);
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.min_expected_cell_count, 5.0);
        assert_eq!(config.multivariate_min_columns, 3);
        assert!(config.include_pca);
        assert!(config.type_overrides.is_empty());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .alpha(0.01)
            .categorical_max_distinct(10)
            .normality_max_sample(1000)
            .include_pca(false)
            .worker_threads(2)
            .type_override("grade", SemanticType::Ordinal)
            .build()
            .unwrap();

        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.categorical_max_distinct, 10);
        assert_eq!(config.normality_max_sample, 1000);
        assert!(!config.include_pca);
        assert_eq!(config.effective_workers(), 2);
        assert_eq!(
            config.type_overrides.get("grade"),
            Some(&SemanticType::Ordinal)
        );
    }

    #[test]
    fn test_validation_invalid_alpha() {
        let result = AnalysisConfig::builder().alpha(1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidAlpha(_)
        ));
    }

    #[test]
    fn test_validation_invalid_ratio() {
        let result = AnalysisConfig::builder().categorical_max_ratio(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_sample_bounds() {
        let result = AnalysisConfig::builder()
            .normality_min_sample(50)
            .normality_max_sample(10)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidSampleBounds { min: 50, max: 10 }
        ));
    }

    #[test]
    fn test_validation_zero_workers() {
        let result = AnalysisConfig::builder().worker_threads(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidCount { .. }
        ));
    }

    #[test]
    fn test_validation_category_bars_below_two() {
        let result = AnalysisConfig::builder().max_category_bars(1).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidCount { minimum: 2, .. }
        ));
        assert!(AnalysisConfig::builder().max_category_bars(2).build().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "categorical_max_distinct": 15,
            "categorical_max_ratio": 0.1,
            "numeric_parse_threshold": 0.9,
            "near_zero_variance_epsilon": 1e-6,
            "normality_min_sample": 8,
            "normality_max_sample": 2000,
            "alpha": 0.01,
            "min_expected_cell_count": 5.0,
            "min_group_size": 3,
            "multivariate_min_columns": 4,
            "include_pca": false,
            "max_category_bars": 8,
            "sample_value_count": 3,
            "seed": 7,
            "worker_threads": 4,
            "type_overrides": { "grade": "ordinal" }
        }"#;

        let config: AnalysisConfig =
            serde_json::from_str(json).expect("Should deserialize from frontend JSON");

        assert_eq!(config.categorical_max_distinct, 15);
        assert_eq!(config.normality_max_sample, 2000);
        assert_eq!(config.min_group_size, 3);
        assert_eq!(config.worker_threads, Some(4));
        assert_eq!(
            config.type_overrides.get("grade"),
            Some(&SemanticType::Ordinal)
        );
        assert!(config.validate().is_ok());
    }
}
