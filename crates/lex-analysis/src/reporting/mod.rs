//! Report Model Assembler.
//!
//! Folds profiles and task results into a renderer-agnostic [`ReportModel`]
//! tree. The tree holds everything a front end needs (sections, narrative,
//! results, figure handles) so nothing has to be re-derived when rendering.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_analysis::reporting::ReportWriter;
//!
//! let report = pipeline.run(&df)?;
//!
//! // Print as JSON
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! // Or write to file
//! let writer = ReportWriter::new("output");
//! writer.write_report_to_file(&report, "survey")?;
//! ```

mod assembler;
pub mod narrative;

pub use assembler::ReportAssembler;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::types::{AnalysisResult, DatasetProfile, SemanticType};

pub const DATASET_OVERVIEW: &str = "Dataset Overview";
pub const UNIVARIATE_ANALYSIS: &str = "Univariate Analysis";
pub const BIVARIATE_ANALYSIS: &str = "Bivariate Analysis";
pub const MULTIVARIATE_ANALYSIS: &str = "Multivariate Analysis";
pub const NOTES_AND_LIMITATIONS: &str = "Notes & Limitations";

/// Task counts by terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub enumerated: usize,
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    pub profile: DatasetProfile,
    pub type_counts: BTreeMap<SemanticType, usize>,
    pub tasks: TaskCounts,
}

/// A node of the report tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub narrative: Vec<String>,
    pub results: Vec<AnalysisResult>,
    pub children: Vec<Section>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            narrative: Vec::new(),
            results: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, title: &str) -> Option<&Section> {
        self.children.iter().find(|c| c.title == title)
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}{} {}", "#".repeat(depth + 1), self.title);
        for line in &self.narrative {
            let _ = writeln!(out, "{indent}  - {line}");
        }
        for child in &self.children {
            child.write_outline(out, depth + 1);
        }
    }
}

/// The structured result of one analysis run. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub title: String,
    /// Local time of assembly; the only field that differs between runs.
    pub generated_at: String,
    pub dataset: DatasetOverview,
    pub root: Section,
}

impl ReportModel {
    /// Equality ignoring `generated_at`.
    pub fn structure_eq(&self, other: &ReportModel) -> bool {
        self.title == other.title && self.dataset == other.dataset && self.root == other.root
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.root.child(title)
    }

    /// Every result in the tree, in document order.
    pub fn results(&self) -> Vec<&AnalysisResult> {
        fn collect<'a>(section: &'a Section, out: &mut Vec<&'a AnalysisResult>) {
            out.extend(section.results.iter());
            for child in &section.children {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Plain-text outline of the tree.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", self.title, self.generated_at);
        for section in &self.root.children {
            section.write_outline(&mut out, 0);
        }
        out
    }
}

/// Writes report models to disk as JSON.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `report` to `<output_dir>/<base_name>_report.json`.
    pub fn write_report_to_file(&self, report: &ReportModel, base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let report_path = self.output_dir.join(format!("{base_name}_report.json"));
        fs::write(&report_path, serde_json::to_string_pretty(report)?)?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }
}
