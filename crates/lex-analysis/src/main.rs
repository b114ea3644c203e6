//! CLI entry point for the exploratory analysis engine.

use anyhow::{Result, anyhow};
use clap::Parser;
use lex_analysis::reporting::ReportWriter;
use lex_analysis::{
    AnalysisConfig, AnalysisPlan, ChartSpecRenderer, Pipeline, ReportModel, SemanticType,
    TaskStatus,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Automated exploratory data analysis planner",
    long_about = "Profiles every column of a CSV file, checks statistical assumptions, \
                  selects tests and charts, and assembles a structured report.\n\n\
                  EXAMPLES:\n  \
                  # Print an outline of the report\n  \
                  lex-analysis -i data.csv\n\n  \
                  # Preview the selected procedures without running them\n  \
                  lex-analysis -i data.csv --dry-run\n\n  \
                  # Save chart specifications and the JSON report\n  \
                  lex-analysis -i data.csv -o results/ --charts --emit-report\n\n  \
                  # Treat a column as ordinal\n  \
                  lex-analysis -i survey.csv --ordinal satisfaction"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: String,

    /// Output directory for chart specifications and reports
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Write chart specifications as JSON files to the output directory
    #[arg(long)]
    charts: bool,

    /// Output the JSON report to stdout instead of a human-readable outline
    ///
    /// Disables all progress logs; only outputs the final JSON.
    #[arg(long)]
    json: bool,

    /// Write the JSON report to the output directory
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Show profiles, tasks and selected procedures without executing them
    #[arg(long)]
    dry_run: bool,

    /// Significance level for assumption checks and test conclusions
    #[arg(long, default_value = "0.05")]
    alpha: f64,

    /// Maximum distinct values for a non-numeric column to be Categorical
    #[arg(long, default_value = "20")]
    categorical_max_distinct: usize,

    /// Above this sample size normality is not tested and assumed not to hold
    #[arg(long, default_value = "5000")]
    normality_max_sample: usize,

    /// Skip the PCA summary of the multivariate task
    #[arg(long)]
    no_pca: bool,

    /// Number of execution workers (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Treat the named column as Ordinal (repeatable)
    #[arg(long = "ordinal", value_name = "COLUMN")]
    ordinal: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout holds only JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let data = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let config = build_config(&args)?;
    let pipeline = build_pipeline(&args, config)?;

    if args.dry_run {
        let plan = pipeline.plan(&data)?;
        return print_plan(&args, &plan);
    }

    run_pipeline(&pipeline, &args, &data)
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .alpha(args.alpha)
        .categorical_max_distinct(args.categorical_max_distinct)
        .normality_max_sample(args.normality_max_sample)
        .include_pca(!args.no_pca);

    if let Some(workers) = args.workers {
        builder = builder.worker_threads(workers);
    }
    for column in &args.ordinal {
        builder = builder.type_override(column, SemanticType::Ordinal);
    }

    Ok(builder.build()?)
}

fn build_pipeline(args: &Args, config: AnalysisConfig) -> Result<Pipeline> {
    let mut renderer = ChartSpecRenderer::new();
    if args.charts && !args.dry_run {
        renderer = renderer.with_output_dir(PathBuf::from(&args.output).join("charts"));
    }

    let mut builder = Pipeline::builder()
        .config(config)
        .title(format!(
            "Exploratory analysis of {}",
            extract_file_name(&args.input)
        ))
        .renderer(Arc::new(renderer));

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            debug!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Run the pipeline and print or persist the report.
fn run_pipeline(pipeline: &Pipeline, args: &Args, data: &DataFrame) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting automated exploratory analysis...");
    info!("{}", "=".repeat(80));

    let report = pipeline.run(data).map_err(|e| {
        error!("Analysis failed: {}", e);
        anyhow!("Analysis failed: {}", e)
    })?;

    if args.emit_report {
        let writer = ReportWriter::new(&args.output);
        let path = writer.write_report_to_file(&report, &extract_file_stem(&args.input))?;
        if !args.json {
            info!("Report written to {}", path.display());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Print the report outline with a short summary.
fn print_report(report: &ReportModel) {
    let tasks = report.dataset.tasks;
    println!("\n{}", "=".repeat(80));
    println!("{}", report.outline());
    println!("{}", "-".repeat(80));
    println!(
        "Tasks: {} enumerated, {} executed, {} failed, {} skipped",
        tasks.enumerated, tasks.executed, tasks.failed, tasks.skipped
    );
    println!("{}", "=".repeat(80));
}

/// Print profiles, tasks and decisions of a dry run.
fn print_plan(args: &Args, plan: &AnalysisPlan) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of selected analyses");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", plan.profile.row_count);
    println!("  Columns: {}", plan.profile.column_count);
    println!("  Duplicate rows: {}", plan.profile.duplicate_count);
    println!();

    println!("COLUMN PROFILES");
    println!("{}", "-".repeat(40));
    println!(
        "{:<20} {:<12} {:<10} {:<10}",
        "Column", "Type", "Missing %", "Distinct"
    );
    println!("{}", "-".repeat(56));
    for column in &plan.profile.columns {
        println!(
            "{:<20} {:<12} {:<10.1} {:<10}",
            truncate_str(&column.name, 19),
            column.semantic_type,
            column.missing_ratio * 100.0,
            column.cardinality
        );
    }
    for column in &plan.profile.unusable {
        println!("  - '{}' unusable: {}", column.name, column.error);
    }
    println!();

    println!("TASKS");
    println!("{}", "-".repeat(40));
    for planned in &plan.tasks {
        let outcome = match (planned.task.status, planned.decision.procedure()) {
            (TaskStatus::Selected, Some(procedure)) => procedure.display_name(),
            _ => planned
                .decision
                .skip_reason()
                .map(|reason| format!("SKIP: {reason}"))
                .unwrap_or_default(),
        };
        println!(
            "  {} {:<13} {:<30} {}",
            planned.task.id,
            planned.task.kind.display_name(),
            truncate_str(&planned.task.label(), 29),
            outcome
        );
    }
    println!();

    println!("{}", "=".repeat(80));
    println!(
        "{} task(s) would run, {} would be skipped",
        plan.selected_count(),
        plan.skipped_count()
    );
    println!("To execute the analysis, run without --dry-run");
    println!("{}", "=".repeat(80));
    Ok(())
}

/// Truncate a string to max length with ellipsis.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

fn extract_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Load a CSV file, retrying with looser settings when the standard read fails.
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b';')
                .with_encoding(CsvEncoding::LossyUtf8),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) if df.width() > 1 => return Ok(df),
        Ok(_) => debug!("Semicolon-separated loading produced a single column"),
        Err(e) => debug!("Semicolon-separated loading failed: {}", e),
    }

    CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_encoding(CsvEncoding::LossyUtf8))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .map_err(|e| {
            error!("Could not read file: {}", e);
            e.into()
        })
}
