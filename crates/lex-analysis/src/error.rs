//! Error types for the analysis engine.
//!
//! Only run-level problems are raised as [`AnalysisError`]. Everything that
//! goes wrong for a single column or a single task is recorded as a value in
//! the model instead:
//!
//! - [`ProfilingError`] marks a column Unusable and the run continues.
//! - [`ExecutionFailure`] becomes a Failed `AnalysisResult` and the run continues.
//!
//! Errors are serializable so they can be handed to a front end as JSON.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::charts::RenderError;
use crate::stats::StatsError;

/// The main error type for an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The run was cancelled by the caller.
    #[error("Analysis run cancelled")]
    Cancelled,

    /// The dataset has no rows or no columns.
    #[error("Dataset is empty ({rows} rows, {columns} columns)")]
    EmptyDataset { rows: usize, columns: usize },

    /// Every column was unusable, so there is nothing to analyze.
    #[error("No usable columns: {0}")]
    NoUsableColumns(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant violation (e.g., worker thread panic, missing result slot).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalysisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "RUN_CANCELLED",
            Self::EmptyDataset { .. } => "EMPTY_DATASET",
            Self::NoUsableColumns(_) => "NO_USABLE_COLUMNS",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for AnalysisError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        AnalysisError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for AnalysisError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalysisError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalysisError::Polars(e).with_context(context))
    }
}

/// Why a column could not be profiled.
///
/// Recorded on the column, never raised to the caller.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProfilingError {
    /// The column has zero non-null values and cannot be classified.
    #[error("column has no non-missing values ({rows} rows, all missing)")]
    NoObservations { rows: usize },

    /// The column's values could not be read.
    #[error("column could not be read: {0}")]
    ColumnRead(String),
}

/// Category of a per-task execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientData,
    Degenerate,
    NonConvergence,
    SingularMatrix,
    InvalidInput,
    Rendering,
    Internal,
}

impl FailureKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::InsufficientData => "Insufficient data",
            Self::Degenerate => "Degenerate data",
            Self::NonConvergence => "Numerical non-convergence",
            Self::SingularMatrix => "Singular matrix",
            Self::InvalidInput => "Invalid input",
            Self::Rendering => "Chart rendering failed",
            Self::Internal => "Internal error",
        }
    }
}

/// A failure captured from an external statistical or plotting routine.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{}: {message}", kind.display_name())]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<StatsError> for ExecutionFailure {
    fn from(err: StatsError) -> Self {
        let kind = match &err {
            StatsError::InsufficientData(_) => FailureKind::InsufficientData,
            StatsError::Degenerate(_) => FailureKind::Degenerate,
            StatsError::NonConvergence(_) => FailureKind::NonConvergence,
            StatsError::SingularMatrix => FailureKind::SingularMatrix,
            StatsError::InvalidInput(_) | StatsError::Distribution(_) => FailureKind::InvalidInput,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<RenderError> for ExecutionFailure {
    fn from(err: RenderError) -> Self {
        Self::new(FailureKind::Rendering, err.to_string())
    }
}
