//! Salvage CLI Module
//!
//! Command-line interface for recovery runs, missingness profiles and
//! identity validation.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::SalvagePipeline;
use crate::recovery::{MissingnessProfile, RecoveryReport, SchemaNormalizer};
use crate::utils::{DataLoader, DataSaver};
use crate::validation::ValidationReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 100, 100) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv_row(key: &str, val: impl std::fmt::Display) {
    println!("  {:<24} {}", muted(key), val.to_string().white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "salvage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recover and prepare corrupted transaction tables")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recover, filter and prepare a raw table
    Run {
        /// Raw input file (CSV or JSON lines)
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for partitions, artifacts and the run summary
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print per-column missingness after normalization
    Profile {
        /// Raw input file (CSV or JSON lines)
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Recover a raw table and check the identity
    Validate {
        /// Raw input file (CSV or JSON lines)
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn path_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Path is not valid UTF-8: {}", path.display()))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path_str(path)?)?),
        None => Ok(PipelineConfig::default()),
    }
}

pub fn load_raw(path: &Path) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(path_str(path)?)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

// ─── Reports ───────────────────────────────────────────────────────────────────

fn print_profile(title: &str, profile: &MissingnessProfile) {
    section(title);
    println!("  {:<24} {:>8} {:>8}", muted("Column"), muted("Nulls"), muted("Rate"));
    println!("  {}", dim(&"─".repeat(42)));
    for col in &profile.columns {
        let nulls = if col.null_count > 0 {
            col.null_count.to_string().yellow()
        } else {
            col.null_count.to_string().white()
        };
        println!("  {:<24} {:>8} {:>7.1}%", col.column, nulls, col.null_rate * 100.0);
    }
}

fn print_recovery(report: &RecoveryReport) {
    section("Recovery");
    kv_row("Rows in", report.rows_in);
    kv_row("Dropped (no timestamp)", report.dropped_missing_timestamp);
    kv_row("Coercion failures", report.total_coercion_failures());
    kv_row("Out-of-range values", report.total_domain_violations());
    kv_row("Solved exactly", report.total_solved());
    kv_row("Zero-divisor deferrals", report.zero_divisor_deferrals);
    kv_row("Imputed rows", report.imputed_rows);
    kv_row("Global fallbacks", report.total_global_fallbacks());
    kv_row("Rows out", report.rows_out);
}

fn print_validation(report: &ValidationReport) {
    section("Validation");
    kv_row("Checked rows", report.checked_rows);
    kv_row("Max |residual|", format!("{:.3e}", report.max_abs_residual));
    let fmt_mean = |m: Option<f64>| m.map_or("-".to_string(), |m| format!("{:.4}", m));
    kv_row("Imputed totals", report.imputed_total.count);
    kv_row("Mean total (imputed)", fmt_mean(report.imputed_total.mean));
    kv_row("Median total (imputed)", fmt_mean(report.imputed_total.median));
    kv_row("Mean total (observed)", fmt_mean(report.observed_total.mean));
    kv_row("Median total (observed)", fmt_mean(report.observed_total.median));
    kv_row("Difference", fmt_mean(report.mean_difference));

    println!();
    if report.identity_holds() {
        println!("  {} {}", ok("✓"), "total = quantity × unit_price holds".white());
    } else {
        println!(
            "  {} {}",
            bad("✗"),
            format!("{} row(s) violate the identity", report.violations).white()
        );
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(data_path: &Path, out_dir: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Run");

    let config = load_config(config_path)?;
    let raw = load_raw(data_path)?;

    step_run("Recovering and preparing");
    let start = Instant::now();
    let pipeline = SalvagePipeline::new(config)?;
    let output = pipeline.run(&raw)?;
    step_done(&format!("{:?}", start.elapsed()));

    std::fs::create_dir_all(out_dir)?;
    let target = |name: &str| -> anyhow::Result<String> { Ok(path_str(&out_dir.join(name))?.to_string()) };

    step_run(&format!("Saving → {}", out_dir.display()));
    DataSaver::save_csv(&mut output.prepared.train.clone(), &target("train.csv")?)?;
    DataSaver::save_csv(&mut output.prepared.holdout.clone(), &target("holdout.csv")?)?;
    DataSaver::save_csv(&mut output.cleaned.clone(), &target("recovered.csv")?)?;
    output.prepared.artifacts.save(&target("artifacts.json")?)?;
    std::fs::write(target("summary.json")?, serde_json::to_string_pretty(&output.summary())?)?;
    step_done(&format!(
        "{} train / {} held-out rows",
        output.prepared.train.height(),
        output.prepared.holdout.height()
    ));

    print_recovery(&output.recovery.report);
    print_validation(&output.validation);

    section("Preparation");
    kv_row(
        "Outlier bounds",
        format!("[{:.4}, {:.4}]", output.outliers.bounds.lower, output.outliers.bounds.upper),
    );
    kv_row("Outliers removed", output.outliers.removed);
    kv_row(
        "Target transform",
        format!("{:?} (skew {:.3})", output.prepared.target_transform(), output.prepared.target_skewness),
    );
    kv_row("Features", output.prepared.feature_columns().len());
    println!();

    Ok(())
}

pub fn cmd_profile(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Profile");

    let config = load_config(config_path)?;
    let raw = load_raw(data_path)?;

    let mut report = RecoveryReport::default();
    let normalized = SchemaNormalizer::new(config.schema.clone()).normalize(&raw, &mut report)?;
    let profile = MissingnessProfile::from_frame(&normalized)?;

    print_profile("Missingness after normalization", &profile);

    section("Normalization");
    for (column, count) in &report.sentinel_values {
        kv_row(&format!("Sentinels in {}", column), count);
    }
    for (column, count) in &report.coercion_failures {
        kv_row(&format!("Unparseable {}", column), count);
    }
    println!();

    Ok(())
}

pub fn cmd_validate(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Validate");

    let config = load_config(config_path)?;
    let raw = load_raw(data_path)?;

    step_run("Recovering");
    let start = Instant::now();
    let (recovery, validation) = SalvagePipeline::new(config)?.recover(&raw)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_profile("Missingness before recovery", &recovery.profile_before);
    print_recovery(&recovery.report);
    print_validation(&validation);
    println!();

    validation.ensure_identity()?;
    Ok(())
}
