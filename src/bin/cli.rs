use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use airlink_audit::report::{report_timestamp, ReportSources};
use airlink_audit::{init_tracing, AuditConfig, AuditStatus, CoreCheckTableRow, ReportData, ReportFiles, ReportGenerator};
use tabled::{settings::Style, Table};

#[derive(Parser)]
#[command(name = "airlink-audit")]
#[command(about = "Generate AirLink audit reports from automated and manual test results")]
#[command(version)]
struct Cli {
    /// Project root; other paths default relative to it
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Where reports are written (default: <root>/audit_reports)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Timestamp token used in report filenames (default: now, YYYYmmdd_HHMMSS)
    #[arg(long)]
    timestamp: Option<String>,

    /// Automated results JSON (default: <root>/audit_results/automated_results.json)
    #[arg(long)]
    automated_results: Option<PathBuf>,

    /// Manual results JSON (default: <root>/audit_results/manual_results.json)
    #[arg(long)]
    manual_results: Option<PathBuf>,

    /// Evidence directory (default: <root>/audit_evidence)
    #[arg(long)]
    evidence_dir: Option<PathBuf>,

    /// Markdown template for the consolidated report
    #[arg(long)]
    template: Option<PathBuf>,

    /// Benchmark summary JSON
    #[arg(long)]
    benchmarks: Option<PathBuf>,

    /// LCOV coverage file
    #[arg(long)]
    coverage: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, env = "AIRLINK_AUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Pass-rate threshold in percent (overrides config)
    #[arg(long)]
    pass_threshold: Option<f64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "✗ Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };
    if let Some(threshold) = cli.pass_threshold {
        config = config.with_pass_threshold(threshold);
    }
    config.validate()?;

    let root = &cli.project_root;
    let output_dir = cli.output_dir.clone().unwrap_or_else(|| root.join("audit_reports"));
    let evidence_dir = root.join("audit_evidence");
    let results_dir = root.join("audit_results");

    let sources = ReportSources {
        automated_results: existing_or_explicit(cli.automated_results, results_dir.join("automated_results.json")),
        manual_results: existing_or_explicit(cli.manual_results, results_dir.join("manual_results.json")),
        evidence_dir: match cli.evidence_dir {
            Some(dir) => Some(dir),
            None if evidence_dir.is_dir() => Some(evidence_dir),
            None => {
                info!("No evidence directory at {}", evidence_dir.display());
                None
            }
        },
        benchmarks: cli.benchmarks,
        coverage: cli.coverage,
    };
    let input = sources.collect()?;

    let generator = ReportGenerator::new(config.with_output_dir(&output_dir))?;
    let data = generator.build(&input);
    let timestamp = cli.timestamp.clone().unwrap_or_else(|| report_timestamp(data.generated_at));
    let files = generator.write_reports(&data, &output_dir, &timestamp, cli.template.as_deref())?;

    print_summary(&data, &files);
    Ok(())
}

/// An explicitly named file is always read, so a missing one surfaces as an
/// error marker; the default location is read only when present.
fn existing_or_explicit(explicit: Option<PathBuf>, default: PathBuf) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path),
        None if default.is_file() => Some(default),
        None => {
            info!("No results at {}", default.display());
            None
        }
    }
}

fn print_summary(data: &ReportData, files: &ReportFiles) {
    println!("\n{}\n", "AirLink Audit Report".bold());

    let rows: Vec<CoreCheckTableRow> = data.core_checks.iter().map(CoreCheckTableRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}\n", table);

    let rate = format!("{:.1}%", data.pass_rate);
    let rate = if data.meets_threshold() { rate.green() } else { rate.red() };
    println!(
        "Tests: {} total, {} passed, {} failed, {} skipped",
        data.total_tests,
        data.passed_tests.to_string().green(),
        data.failed_tests.to_string().red(),
        data.skipped_tests.to_string().yellow()
    );
    println!("Pass rate: {} (threshold {:.1}%)", rate, data.pass_threshold);

    let overall = match data.overall_status {
        AuditStatus::Passed => data.overall_status.label().green(),
        AuditStatus::Failed => data.overall_status.label().red(),
        _ => data.overall_status.label().yellow(),
    };
    println!("Overall: {}\n", overall);

    if let Some(error) = data.manual_results.as_ref().and_then(|m| m.error_message()) {
        println!("{} manual results: {}", "⚠".yellow(), error);
    }
    for error in data.evidence.iter().flat_map(|e| e.errors.iter()) {
        println!("{} evidence: {}", "⚠".yellow(), error);
    }

    println!("{}", "Reports:".bold());
    for path in files.all() {
        println!("  {}", path.display());
    }
}
