use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use crate::audit::{AuditResult, AuditSummaryReport, AuditTestCase, AuditTestRunner, Collaborators};
use crate::config::AuditConfig;
use crate::error::Result;
use crate::evidence::EvidenceIndexer;
use crate::logging::{default_log, AuditLog};
use crate::merge::{load_results, merge_results, MergedResults, MergedTestRecord, ParsedSection, SourceType};
use crate::report::{
    load_coverage, report_timestamp, BenchmarkSummary, ReportData, ReportFiles, ReportGenerator, ReportInput,
};
use super::environment::{check_directory, check_file, check_output_dir, EnvironmentCheck, EnvironmentValidation};
use super::progress::{AuditPhase, ProgressBus, ProgressEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    pub project_root: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub include_manual_tests: bool,
    pub manual_results: Option<PathBuf>,
    pub evidence_dir: Option<PathBuf>,
    pub benchmarks: Option<PathBuf>,
    pub coverage: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub pass_threshold: f64,
    pub timestamp: Option<String>,
    pub test_cases: Vec<AuditTestCase>,
}

impl OrchestratorOptions {
    pub fn new(project_root: impl Into<PathBuf>, config: &AuditConfig) -> Self {
        Self {
            project_root: project_root.into(),
            output_dir: None,
            include_manual_tests: config.include_manual_tests,
            manual_results: None,
            evidence_dir: None,
            benchmarks: None,
            coverage: None,
            template: None,
            pass_threshold: config.pass_threshold,
            timestamp: None,
            test_cases: AuditTestCase::standard_suite(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_manual_results(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_manual_tests = true;
        self.manual_results = Some(path.into());
        self
    }

    pub fn without_manual_tests(mut self) -> Self {
        self.include_manual_tests = false;
        self
    }

    pub fn with_evidence_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.evidence_dir = Some(dir.into());
        self
    }

    pub fn with_benchmarks(mut self, path: impl Into<PathBuf>) -> Self {
        self.benchmarks = Some(path.into());
        self
    }

    pub fn with_coverage(mut self, path: impl Into<PathBuf>) -> Self {
        self.coverage = Some(path.into());
        self
    }

    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = Some(path.into());
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_test_cases(mut self, cases: Vec<AuditTestCase>) -> Self {
        self.test_cases = cases;
        self
    }

    fn manual_results_path(&self) -> PathBuf {
        self.manual_results
            .clone()
            .unwrap_or_else(|| self.project_root.join("audit_results").join("manual_results.json"))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedAuditResult {
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub environment: EnvironmentValidation,
    pub results: Vec<AuditResult>,
    pub summary: AuditSummaryReport,
    pub merged: MergedResults,
    pub pass_rate: f64,
    pub pass_threshold: f64,
    pub report: Option<ReportData>,
    pub report_files: Option<ReportFiles>,
    pub phases_completed: Vec<AuditPhase>,
    pub notes: Vec<String>,
}

impl ConsolidatedAuditResult {
    pub fn duration_ms(&self) -> u64 {
        (self.end_time - self.start_time).num_milliseconds().max(0) as u64
    }
}

/// Runs the four audit phases in order and always returns a result.
pub struct ConsolidatedAuditOrchestrator {
    config: AuditConfig,
    runner: AuditTestRunner,
    bus: ProgressBus,
    log: Arc<dyn AuditLog>,
}

impl ConsolidatedAuditOrchestrator {
    pub fn new(config: AuditConfig, collaborators: Collaborators) -> Self {
        let log = default_log();
        Self {
            runner: AuditTestRunner::new(config.clone(), collaborators).with_log(Arc::clone(&log)),
            bus: ProgressBus::new(config.progress_capacity),
            config,
            log,
        }
    }

    pub fn with_log(mut self, log: Arc<dyn AuditLog>) -> Self {
        self.runner = self.runner.with_log(Arc::clone(&log));
        self.log = log;
        self
    }

    pub fn runner(&self) -> &AuditTestRunner {
        &self.runner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.bus.subscribe()
    }

    /// Stops progress publishing. Safe to call any number of times, with or
    /// without a prior run.
    pub fn dispose(&self) {
        if !self.bus.is_closed() {
            self.log.debug("Progress bus closed");
        }
        self.bus.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.bus.is_closed()
    }

    fn emit(&self, phase: AuditPhase, percentage: f64, message: impl Into<String>) {
        let event = ProgressEvent::new(phase, percentage, message);
        self.log.debug(&format!("[{} {:.0}%] {}", event.phase, event.percentage, event.message));
        self.bus.publish(event);
    }

    pub async fn run_full_audit(&self, options: OrchestratorOptions) -> ConsolidatedAuditResult {
        let start_time = Utc::now();
        let output_dir = options.output_dir.clone().unwrap_or_else(|| self.config.output_dir.clone());
        let timestamp = options.timestamp.clone().unwrap_or_else(|| report_timestamp(start_time));
        let mut notes = Vec::new();
        let mut phases_completed = Vec::new();
        let mut phase_failed = false;

        self.log.info(&format!("Starting {} audit ({})", self.config.app_name, timestamp));

        self.emit(AuditPhase::EnvironmentValidation, 0.0, "Validating environment");
        let environment = self.validate_environment(&options, &output_dir);
        let output_ready = environment.check("output_dir").map(|c| c.passed).unwrap_or(false);
        for failure in environment.failures() {
            notes.push(format!("environment: {} - {}", failure.name, failure.detail));
        }
        self.emit(
            AuditPhase::EnvironmentValidation,
            10.0,
            if environment.is_valid {
                "Environment valid".to_string()
            } else {
                format!("Environment has {} problem(s)", environment.failures().len())
            },
        );
        phases_completed.push(AuditPhase::EnvironmentValidation);

        let results = self.run_automated(&options.test_cases).await;
        phases_completed.push(AuditPhase::AutomatedTests);

        let mut manual: Vec<MergedTestRecord> = Vec::new();
        let mut manual_section = None;
        if options.include_manual_tests {
            self.emit(AuditPhase::ManualTests, 60.0, "Loading manual results");
            match load_results(options.manual_results_path(), SourceType::Manual) {
                ParsedSection::Data(records) => {
                    manual_section = Some(ParsedSection::Data(records.len()));
                    manual = records;
                }
                ParsedSection::Error { error } => {
                    self.log.warn(&format!("Manual results unavailable: {}", error));
                    notes.push(format!("manual results: {}", error));
                    manual_section = Some(ParsedSection::error(error));
                }
            }
            self.emit(AuditPhase::ManualTests, 75.0, format!("Loaded {} manual results", manual.len()));
            phases_completed.push(AuditPhase::ManualTests);
        }

        let merged = merge_results(&results, &manual);

        self.emit(AuditPhase::ReportGeneration, 75.0, "Generating reports");
        let mut report = None;
        let mut report_files = None;
        if output_ready {
            match self.generate_reports(&options, &merged, manual_section, &output_dir, &timestamp) {
                Ok((data, files)) => {
                    report = Some(data);
                    report_files = Some(files);
                    phases_completed.push(AuditPhase::ReportGeneration);
                }
                Err(e) => {
                    phase_failed = true;
                    self.log.error(&format!("Report generation failed: {}", e));
                    notes.push(format!("report generation failed: {}", e));
                }
            }
        } else {
            phase_failed = true;
            notes.push(format!("reports not written: output directory {} unusable", output_dir.display()));
        }
        self.emit(AuditPhase::ReportGeneration, 100.0, "Audit complete");

        let pass_rate = merged.pass_rate();
        let success = !phase_failed && !merged.is_empty() && pass_rate >= options.pass_threshold;
        if !merged.is_empty() && pass_rate < options.pass_threshold {
            notes.push(format!(
                "pass rate {:.1}% below threshold {:.1}%",
                pass_rate, options.pass_threshold
            ));
        }

        self.log.info(&format!(
            "Audit finished: {}/{} passed ({:.1}%), success={}",
            merged.passed(),
            merged.total_tests(),
            pass_rate,
            success
        ));

        ConsolidatedAuditResult {
            success,
            start_time,
            end_time: Utc::now(),
            environment,
            summary: AuditSummaryReport::from_results(&results),
            results,
            merged,
            pass_rate,
            pass_threshold: options.pass_threshold,
            report,
            report_files,
            phases_completed,
            notes,
        }
    }

    fn validate_environment(&self, options: &OrchestratorOptions, output_dir: &Path) -> EnvironmentValidation {
        let mut checks = vec![
            check_directory("project_root", &options.project_root),
            check_output_dir(output_dir),
        ];
        if let Some(dir) = &options.evidence_dir {
            checks.push(check_directory("evidence_dir", dir));
        }
        if options.include_manual_tests {
            checks.push(check_file("manual_results", &options.manual_results_path()));
        }
        if let Some(template) = &options.template {
            checks.push(check_file("template", template));
        }

        let unrunnable: Vec<&str> = options
            .test_cases
            .iter()
            .filter(|c| !self.runner.can_run(c))
            .map(|c| c.id.as_str())
            .collect();
        checks.push(if unrunnable.is_empty() {
            EnvironmentCheck::pass("collaborators", "all test cases runnable")
        } else {
            EnvironmentCheck::fail("collaborators", format!("cannot run: {}", unrunnable.join(", ")))
        });

        EnvironmentValidation::from_checks(checks)
    }

    async fn run_automated(&self, cases: &[AuditTestCase]) -> Vec<AuditResult> {
        self.emit(AuditPhase::AutomatedTests, 10.0, format!("Running {} automated tests", cases.len()));
        let mut results = Vec::with_capacity(cases.len());

        for (i, case) in cases.iter().enumerate() {
            let result = match self.runner.missing_requirement(case) {
                Some(reason) => {
                    self.log.info(&format!("Skipping {}: {}", case.id, reason));
                    AuditResult::skipped(case.clone(), reason)
                }
                None => self.runner.run(case.clone()).await,
            };
            let pct = 10.0 + 50.0 * (i + 1) as f64 / cases.len() as f64;
            self.emit(
                AuditPhase::AutomatedTests,
                pct,
                format!("{} {}", result.test_case.id, result.status.label()),
            );
            results.push(result);
        }

        if cases.is_empty() {
            self.emit(AuditPhase::AutomatedTests, 60.0, "No automated tests configured");
        }
        results
    }

    fn generate_reports(
        &self,
        options: &OrchestratorOptions,
        merged: &MergedResults,
        manual_section: Option<ParsedSection<usize>>,
        output_dir: &Path,
        timestamp: &str,
    ) -> Result<(ReportData, ReportFiles)> {
        let generator = ReportGenerator::new(self.config.clone().with_pass_threshold(options.pass_threshold))?;

        let mut input = ReportInput::new(merged.clone());
        if let Some(section) = manual_section {
            input = input.with_manual_results(section);
        }
        if let Some(dir) = &options.evidence_dir {
            input = input.with_evidence(EvidenceIndexer::new(dir).index());
        }
        if let Some(path) = &options.benchmarks {
            input = input.with_benchmarks(BenchmarkSummary::load(path));
        }
        if let Some(path) = &options.coverage {
            input = input.with_coverage(load_coverage(path));
        }

        let data = generator.build(&input);
        let files = generator.write_reports(&data, output_dir, timestamp, options.template.as_deref())?;
        Ok((data, files))
    }
}
