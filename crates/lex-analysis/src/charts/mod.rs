//! Visualization boundary.
//!
//! The engine decides which chart a task gets and supplies the data; a
//! [`ChartRenderer`] turns that into a [`FigureHandle`]. No pixel-level
//! drawing happens in this crate. [`ChartSpecRenderer`] produces a
//! declarative JSON chart specification and can persist it to disk.

mod spec_renderer;

pub use spec_renderer::ChartSpecRenderer;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::types::CategoryCount;

/// Label used for the bucket that absorbs categories beyond the top ten.
pub const OTHER_CATEGORY_LABEL: &str = "Other";

/// Bucket label when a kept category is itself called [`OTHER_CATEGORY_LABEL`].
pub const OTHER_CATEGORY_FALLBACK_LABEL: &str = "All other categories";

/// Number of categories kept before collapsing into [`OTHER_CATEGORY_LABEL`].
pub const TOP_CATEGORY_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    BoxPlot,
    BarChart,
    ScatterPlot,
    GroupedBoxPlot,
    StackedBar,
    Heatmap,
    LineChart,
    Timeline,
}

impl ChartKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Histogram => "Histogram",
            Self::BoxPlot => "Box plot",
            Self::BarChart => "Bar chart",
            Self::ScatterPlot => "Scatter plot",
            Self::GroupedBoxPlot => "Grouped box plot",
            Self::StackedBar => "Stacked bar chart",
            Self::Heatmap => "Correlation heatmap",
            Self::LineChart => "Line chart",
            Self::Timeline => "Timeline",
        }
    }

    /// File-name friendly identifier.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::BoxPlot => "boxplot",
            Self::BarChart => "bar",
            Self::ScatterPlot => "scatter",
            Self::GroupedBoxPlot => "grouped_boxplot",
            Self::StackedBar => "stacked_bar",
            Self::Heatmap => "heatmap",
            Self::LineChart => "line",
            Self::Timeline => "timeline",
        }
    }
}

/// Data supplied with a chart request.
#[derive(Debug, Clone, Copy)]
pub enum ChartData<'a> {
    /// One numeric sample (histogram, box plot).
    Values { column: &'a str, values: &'a [f64] },
    /// Category frequencies (bar chart).
    Frequencies {
        column: &'a str,
        categories: &'a [CategoryCount],
    },
    /// Two numeric samples on complete rows (scatter plot).
    Paired {
        x_column: &'a str,
        y_column: &'a str,
        x: &'a [f64],
        y: &'a [f64],
    },
    /// Numeric values split by a grouping column (grouped box plot).
    Grouped {
        value_column: &'a str,
        group_column: &'a str,
        groups: &'a [(String, Vec<f64>)],
    },
    /// Contingency counts (stacked bar chart).
    CrossTab {
        row_column: &'a str,
        col_column: &'a str,
        row_labels: &'a [String],
        col_labels: &'a [String],
        counts: &'a [Vec<u64>],
    },
    /// Square matrix over named columns (heatmap).
    Matrix {
        columns: &'a [String],
        values: &'a [Vec<f64>],
    },
    /// Monthly mean of a numeric column over time (line chart).
    TimeSeries {
        time_column: &'a str,
        value_column: &'a str,
        points: &'a [(NaiveDate, f64)],
    },
    /// Observation counts per calendar month (timeline).
    MonthlyCounts {
        column: &'a str,
        counts: &'a [(NaiveDate, usize)],
    },
}

/// Reference to a rendered figure, carried in the report model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureHandle {
    pub id: String,
    pub kind: ChartKind,
    pub title: String,
    /// Declarative chart description a front end can draw from.
    pub spec: serde_json::Value,
    /// Where the specification was written, when persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Typed failure of a chart renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no data to plot for {0}")]
    EmptyData(String),

    #[error("{kind:?} cannot be drawn from {supplied} data")]
    IncompatibleData { kind: ChartKind, supplied: &'static str },

    #[error("failed to write chart: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode chart: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders one chart of a given kind from engine-supplied data.
pub trait ChartRenderer: Send + Sync {
    fn render_chart(
        &self,
        id: &str,
        kind: ChartKind,
        data: &ChartData<'_>,
    ) -> Result<FigureHandle, RenderError>;
}

/// Fold the tail into one bucket when there are more than `max_bars`
/// categories. At most [`TOP_CATEGORY_COUNT`] categories are kept and the
/// result never exceeds `max_bars` bars. Input must already be sorted by
/// descending count.
pub fn collapse_categories(categories: &[CategoryCount], max_bars: usize) -> Vec<CategoryCount> {
    if categories.len() <= max_bars {
        return categories.to_vec();
    }
    let keep = TOP_CATEGORY_COUNT.min(max_bars.saturating_sub(1));
    let mut kept: Vec<CategoryCount> = categories[..keep].to_vec();
    let other: usize = categories[keep..].iter().map(|c| c.count).sum();

    let label = if kept.iter().any(|c| c.label == OTHER_CATEGORY_LABEL) {
        OTHER_CATEGORY_FALLBACK_LABEL
    } else {
        OTHER_CATEGORY_LABEL
    };
    kept.push(CategoryCount {
        label: label.to_string(),
        count: other,
    });
    kept
}
