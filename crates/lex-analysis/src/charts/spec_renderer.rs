//! Declarative JSON chart specifications.

use super::{ChartData, ChartKind, ChartRenderer, FigureHandle, RenderError};
use crate::stats::descriptive::{quantile, sorted, tukey_fences};
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Builds a JSON specification per chart. When an output directory is set,
/// each specification is also written to `<dir>/<id>.json`.
#[derive(Debug, Default, Clone)]
pub struct ChartSpecRenderer {
    output_dir: Option<PathBuf>,
}

impl ChartSpecRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist every specification under `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    fn persist(&self, id: &str, spec: &Value) -> Result<Option<PathBuf>, RenderError> {
        let Some(dir) = &self.output_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{id}.json"));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, spec)?;
        debug!("Wrote chart specification to {}", path.display());
        Ok(Some(path))
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}

fn data_name(data: &ChartData<'_>) -> &'static str {
    match data {
        ChartData::Values { .. } => "single-sample",
        ChartData::Frequencies { .. } => "frequency",
        ChartData::Paired { .. } => "paired",
        ChartData::Grouped { .. } => "grouped",
        ChartData::CrossTab { .. } => "cross-tabulated",
        ChartData::Matrix { .. } => "matrix",
        ChartData::TimeSeries { .. } => "time-series",
        ChartData::MonthlyCounts { .. } => "monthly-count",
    }
}

/// Sturges' rule: ceil(log2 n) + 1 bins.
fn histogram_bins(values: &[f64]) -> Value {
    let n = values.len();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() <= f64::EPSILON {
        return json!([{ "start": min, "end": max, "count": n }]);
    }

    let bins = ((n as f64).log2().ceil() as usize + 1).max(1);
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Value::Array(
        counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                json!({
                    "start": min + i as f64 * width,
                    "end": min + (i + 1) as f64 * width,
                    "count": count,
                })
            })
            .collect(),
    )
}

/// Five-number summary with Tukey fences.
fn box_summary(values: &[f64]) -> Value {
    let s = sorted(values);
    let q1 = quantile(&s, 0.25);
    let q3 = quantile(&s, 0.75);
    let (lo, hi) = tukey_fences(q1, q3);
    let inside: Vec<f64> = s.iter().copied().filter(|v| *v >= lo && *v <= hi).collect();
    let outliers: Vec<f64> = s.iter().copied().filter(|v| *v < lo || *v > hi).collect();
    json!({
        "q1": q1,
        "median": quantile(&s, 0.5),
        "q3": q3,
        "whisker_low": inside.first().copied().unwrap_or(q1),
        "whisker_high": inside.last().copied().unwrap_or(q3),
        "outliers": outliers,
        "n": s.len(),
    })
}

fn build_spec(kind: ChartKind, data: &ChartData<'_>) -> Result<(String, Value), RenderError> {
    let incompatible = || RenderError::IncompatibleData {
        kind,
        supplied: data_name(data),
    };

    match (kind, data) {
        (ChartKind::Histogram, ChartData::Values { column, values }) => {
            if values.is_empty() {
                return Err(RenderError::EmptyData(column.to_string()));
            }
            Ok((
                format!("Distribution of {column}"),
                json!({ "x_label": column, "y_label": "Count", "bins": histogram_bins(values) }),
            ))
        }
        (ChartKind::BoxPlot, ChartData::Values { column, values }) => {
            if values.is_empty() {
                return Err(RenderError::EmptyData(column.to_string()));
            }
            Ok((
                format!("Box plot of {column}"),
                json!({ "y_label": column, "box": box_summary(values) }),
            ))
        }
        (ChartKind::BarChart, ChartData::Frequencies { column, categories }) => {
            if categories.is_empty() {
                return Err(RenderError::EmptyData(column.to_string()));
            }
            let bars: Vec<Value> = categories
                .iter()
                .map(|c| json!({ "label": c.label, "count": c.count }))
                .collect();
            Ok((
                format!("Frequencies of {column}"),
                json!({ "x_label": column, "y_label": "Count", "bars": bars }),
            ))
        }
        (ChartKind::ScatterPlot, ChartData::Paired { x_column, y_column, x, y }) => {
            if x.is_empty() {
                return Err(RenderError::EmptyData(format!("{x_column} vs {y_column}")));
            }
            let points: Vec<[f64; 2]> = x.iter().zip(y.iter()).map(|(a, b)| [*a, *b]).collect();
            Ok((
                format!("{y_column} vs {x_column}"),
                json!({ "x_label": x_column, "y_label": y_column, "points": points }),
            ))
        }
        (
            ChartKind::GroupedBoxPlot,
            ChartData::Grouped {
                value_column,
                group_column,
                groups,
            },
        ) => {
            let boxes: Vec<Value> = groups
                .iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(label, values)| json!({ "group": label, "box": box_summary(values) }))
                .collect();
            if boxes.is_empty() {
                return Err(RenderError::EmptyData(format!("{value_column} by {group_column}")));
            }
            Ok((
                format!("{value_column} by {group_column}"),
                json!({ "x_label": group_column, "y_label": value_column, "boxes": boxes }),
            ))
        }
        (
            ChartKind::StackedBar,
            ChartData::CrossTab {
                row_column,
                col_column,
                row_labels,
                col_labels,
                counts,
            },
        ) => {
            if counts.is_empty() {
                return Err(RenderError::EmptyData(format!("{row_column} by {col_column}")));
            }
            Ok((
                format!("{row_column} by {col_column}"),
                json!({
                    "x_label": row_column,
                    "stack_label": col_column,
                    "rows": row_labels,
                    "stacks": col_labels,
                    "counts": counts,
                }),
            ))
        }
        (ChartKind::Heatmap, ChartData::Matrix { columns, values }) => {
            if columns.is_empty() {
                return Err(RenderError::EmptyData("correlation matrix".into()));
            }
            Ok((
                "Correlation heatmap".to_string(),
                json!({ "labels": columns, "values": values, "range": [-1.0, 1.0] }),
            ))
        }
        (
            ChartKind::LineChart,
            ChartData::TimeSeries {
                time_column,
                value_column,
                points,
            },
        ) => {
            if points.is_empty() {
                return Err(RenderError::EmptyData(format!("{value_column} over {time_column}")));
            }
            let mut ordered = points.to_vec();
            ordered.sort_by_key(|p| p.0);
            let series: Vec<Value> = ordered
                .iter()
                .map(|(month, v)| json!({ "month": month.format("%Y-%m").to_string(), "value": v }))
                .collect();
            Ok((
                format!("Monthly mean of {value_column} over {time_column}"),
                json!({ "x_label": time_column, "y_label": format!("Mean {value_column}"), "series": series }),
            ))
        }
        (ChartKind::Timeline, ChartData::MonthlyCounts { column, counts }) => {
            if counts.is_empty() {
                return Err(RenderError::EmptyData(column.to_string()));
            }
            let series: Vec<Value> = counts
                .iter()
                .map(|(month, n)| json!({ "month": month.format("%Y-%m").to_string(), "count": n }))
                .collect();
            Ok((
                format!("Observations per month of {column}"),
                json!({ "x_label": column, "y_label": "Count", "series": series }),
            ))
        }
        _ => Err(incompatible()),
    }
}

impl ChartRenderer for ChartSpecRenderer {
    fn render_chart(
        &self,
        id: &str,
        kind: ChartKind,
        data: &ChartData<'_>,
    ) -> Result<FigureHandle, RenderError> {
        let (title, body) = build_spec(kind, data)?;
        let mut spec = json!({ "id": id, "kind": kind, "title": title });
        if let (Value::Object(target), Value::Object(fields)) = (&mut spec, body) {
            target.extend(fields);
        }
        let path = self.persist(id, &spec)?;

        Ok(FigureHandle {
            id: id.to_string(),
            kind,
            title,
            spec,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryCount;
    use chrono::NaiveDate;

    #[test]
    fn test_histogram_uses_sturges_bins() {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let handle = ChartSpecRenderer::new()
            .render_chart(
                "T000_histogram",
                ChartKind::Histogram,
                &ChartData::Values { column: "age", values: &values },
            )
            .unwrap();

        let bins = handle.spec["bins"].as_array().unwrap();
        assert_eq!(bins.len(), 5);
        let total: u64 = bins.iter().map(|b| b["count"].as_u64().unwrap()).sum();
        assert_eq!(total, 16);
        assert_eq!(handle.title, "Distribution of age");
        assert!(handle.path.is_none());
    }

    #[test]
    fn test_incompatible_data_is_rejected() {
        let values = [1.0, 2.0];
        let result = ChartSpecRenderer::new().render_chart(
            "x",
            ChartKind::Heatmap,
            &ChartData::Values { column: "a", values: &values },
        );
        assert!(matches!(result, Err(RenderError::IncompatibleData { .. })));
    }

    #[test]
    fn test_empty_values_are_rejected() {
        let result = ChartSpecRenderer::new().render_chart(
            "x",
            ChartKind::BoxPlot,
            &ChartData::Values { column: "a", values: &[] },
        );
        assert!(matches!(result, Err(RenderError::EmptyData(_))));
    }

    #[test]
    fn test_bar_chart_spec_is_deterministic() {
        let categories = vec![
            CategoryCount { label: "north".into(), count: 4 },
            CategoryCount { label: "south".into(), count: 2 },
        ];
        let data = ChartData::Frequencies { column: "region", categories: &categories };
        let renderer = ChartSpecRenderer::new();
        let first = renderer.render_chart("T001_bar", ChartKind::BarChart, &data).unwrap();
        let second = renderer.render_chart("T001_bar", ChartKind::BarChart, &data).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.spec["bars"][0]["label"], "north");
    }

    #[test]
    fn test_timeline_lists_monthly_counts() {
        let counts = vec![
            (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 3),
            (NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), 5),
        ];
        let handle = ChartSpecRenderer::new()
            .render_chart(
                "T002_timeline",
                ChartKind::Timeline,
                &ChartData::MonthlyCounts { column: "signup", counts: &counts },
            )
            .unwrap();

        assert_eq!(handle.title, "Observations per month of signup");
        assert_eq!(handle.spec["series"][0]["month"], "2024-01");
        assert_eq!(handle.spec["series"][1]["count"], 5);
    }

    #[test]
    fn test_line_chart_orders_monthly_means() {
        let points = vec![
            (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 12.5),
            (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10.0),
        ];
        let handle = ChartSpecRenderer::new()
            .render_chart(
                "T003_line",
                ChartKind::LineChart,
                &ChartData::TimeSeries { time_column: "signup", value_column: "spend", points: &points },
            )
            .unwrap();

        assert_eq!(handle.title, "Monthly mean of spend over signup");
        assert_eq!(handle.spec["y_label"], "Mean spend");
        assert_eq!(handle.spec["series"][0]["month"], "2024-01");
        assert_eq!(handle.spec["series"][1]["value"], 12.5);
    }

    #[test]
    fn test_persisted_spec_is_written() {
        let dir = std::env::temp_dir().join(format!("lex-analysis-charts-{}", std::process::id()));
        let renderer = ChartSpecRenderer::new().with_output_dir(&dir);
        let values = [1.0, 2.0, 3.0, 4.0];
        let handle = renderer
            .render_chart(
                "T002_boxplot",
                ChartKind::BoxPlot,
                &ChartData::Values { column: "score", values: &values },
            )
            .unwrap();

        let path = handle.path.unwrap();
        assert!(path.exists());
        let written: Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(written["kind"], "box_plot");
        let _ = fs::remove_dir_all(dir);
    }
}
