//! benchpivot - pivot tables from benchmark measurements
//!
//! A CLI tool that reads native call benchmark measurement files, groups
//! replicate measurements of the same benchmark, aggregates them and
//! writes one pivot table per plot request to a JSON report.
//!
//! Exit codes:
//!   0 - Success (including runs where some requests had nothing to plot)
//!   1 - Runtime error (invalid arguments or config, unreadable data, schema or replicate mismatch)
//!   2 - Every request was skipped and --fail-on-empty was set

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod preprocess;
mod report;

use analysis::{run_request, PageCounter};
use anyhow::{anyhow, Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::RecordSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    match run_pivot(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Pivot failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .benchpivot.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize campaign values, plot requests, and more.");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete pivot workflow. Returns exit code (0 or 2).
fn run_pivot(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration; its verbosity feeds the log level
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().map_err(|e| anyhow!(e))?;

    init_logging(args.log_level(config.general.verbose))?;

    info!("benchpivot v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("An input path is required"))?;

    // Step 1: Find and read the data files
    let scan_config = ingest::ScanConfig::from(&config.scanner);
    let files = ingest::DataFileScanner::new(input.clone(), scan_config).scan()?;
    if files.is_empty() {
        return Err(anyhow!("No data files found under {}", input.display()));
    }

    println!("📥 Reading {} data files from {}", files.len(), input.display());
    let records = ingest::read_records(&files).context("Failed to read measurement records")?;
    if records.is_empty() {
        return Err(anyhow!("No measurement records in {}", input.display()));
    }

    if args.dry_run {
        return handle_dry_run(&files, &records);
    }

    // Step 2: Derived and campaign-wide values
    let records = preprocess::preprocess(records, &config.campaign_values())
        .context("Failed to preprocess measurement records")?;
    println!("   Records: {} ({} fields)", records.len(), records.keys().len());

    // Step 3: Run every plot request
    let requests = config.active_requests(args.request.as_deref())?;
    let settings = config.request_settings();
    let mut pages = PageCounter::new();

    println!("\n🔬 Running {} plot requests...", requests.len());
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(requests.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };

    let mut outcomes = Vec::with_capacity(requests.len());
    for request in &requests {
        progress.set_message(request.name.clone());
        let outcome = run_request(&records, request, &settings, &mut pages)
            .with_context(|| format!("Plot request '{}' failed", request.name))?;
        outcomes.push((request.name.clone(), outcome));
        progress.inc(1);
    }
    progress.finish_and_clear();

    // Step 4: Build and save the report
    let duration = start_time.elapsed().as_secs_f64();
    let report = report::build_report(&files, records.len(), outcomes, duration);

    let output = PathBuf::from(&config.general.output);
    report::write_json_report(&report, &output)?;

    // Print summary
    println!("\n📊 Pivot Summary:");
    println!("   Requests run: {}", report.metadata.requests_run);
    println!("   Plots produced: {}", report.metadata.plots);
    if !report.metadata.skipped.is_empty() {
        let names: Vec<&str> = report.metadata.skipped.iter().map(|s| s.name.as_str()).collect();
        println!("   Skipped: {}", names.join(", "));
    }
    println!("   Pages: {}", pages.issued());
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Pivot complete! Report saved to: {}", output.display());

    if args.fail_on_empty && report.plots.is_empty() {
        eprintln!("\n⛔ Every plot request was skipped. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: list the data files and fields, exit.
fn handle_dry_run(files: &[PathBuf], records: &RecordSet) -> Result<i32> {
    println!("\n🔍 Dry run: no pivot tables are built.\n");

    for file in files {
        println!("     📄 {}", file.display());
    }
    println!("\n   Records: {}", records.len());

    let fields: Vec<&str> = records.keys().iter().map(String::as_str).collect();
    println!("   Fields: {}", fields.join(", "));

    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok(config),
        None => Ok(Config::default()),
    }
}
