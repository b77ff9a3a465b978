use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::audit::AuditStatus;
use crate::config::{AuditConfig, DeviceInfo};
use crate::error::Result;
use crate::evidence::EvidenceIndex;
use crate::merge::{CoreCheck, MergedResults, MergedTestRecord, ParsedSection};
use super::benchmark::BenchmarkSummary;
use super::coverage::CoverageReport;
use super::formats;
use super::html::HtmlRenderer;
use super::template::{Placeholder, TemplateRenderer, TemplateValues};

pub const REPORT_TITLE: &str = "AirLink Audit Report";
pub const MIN_LINE_COVERAGE: f64 = 80.0;

/// Everything the generator reads. Missing sections render as defaults.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub merged: MergedResults,
    pub evidence: Option<EvidenceIndex>,
    pub benchmarks: Option<ParsedSection<BenchmarkSummary>>,
    pub coverage: Option<ParsedSection<CoverageReport>>,
    /// Count of manual records loaded, or the marker for a broken file.
    pub manual_results: Option<ParsedSection<usize>>,
}

impl ReportInput {
    pub fn new(merged: MergedResults) -> Self {
        Self { merged, ..Self::default() }
    }

    pub fn with_evidence(mut self, evidence: EvidenceIndex) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_benchmarks(mut self, benchmarks: ParsedSection<BenchmarkSummary>) -> Self {
        self.benchmarks = Some(benchmarks);
        self
    }

    pub fn with_coverage(mut self, coverage: ParsedSection<CoverageReport>) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_manual_results(mut self, manual_results: ParsedSection<usize>) -> Self {
        self.manual_results = Some(manual_results);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreCheckRow {
    pub number: u8,
    pub name: String,
    pub status: AuditStatus,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub details: String,
    pub tests: Vec<String>,
    pub evidence_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSummary {
    pub total: usize,
    pub total_bytes: u64,
    pub by_category: BTreeMap<String, usize>,
    pub by_core_check: BTreeMap<u8, Vec<String>>,
    pub unmatched: Vec<String>,
    pub errors: Vec<String>,
}

impl EvidenceSummary {
    fn from_index(index: &EvidenceIndex) -> Self {
        Self {
            total: index.len(),
            total_bytes: index.total_size(),
            by_category: index
                .count_by_category()
                .into_iter()
                .map(|(c, n)| (c.as_str().to_string(), n))
                .collect(),
            by_core_check: index
                .by_core_check()
                .into_iter()
                .map(|(c, items)| (c.number(), items.iter().map(|i| i.relative_path.clone()).collect()))
                .collect(),
            unmatched: index
                .items
                .iter()
                .filter(|i| i.core_check.is_none())
                .map(|i| i.relative_path.clone())
                .collect(),
            errors: index.errors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSection {
    pub line_coverage: f64,
    pub lines_found: u64,
    pub lines_hit: u64,
    pub files: usize,
    pub low_coverage_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySection {
    pub hash_algorithm: String,
    pub chunk_size: usize,
    pub checksum_tests: usize,
    pub checksum_passed: usize,
    pub integrity_verified: bool,
    pub findings: Vec<String>,
}

/// The computed report. The JSON export is this struct serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub app_name: String,
    pub app_version: String,
    pub device_info: DeviceInfo,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub partial_tests: usize,
    pub pass_rate: f64,
    pub pass_threshold: f64,
    pub overall_status: AuditStatus,
    pub total_duration_ms: u64,
    pub automated_count: usize,
    pub manual_count: usize,
    pub overlap_count: usize,
    pub core_checks: Vec<CoreCheckRow>,
    pub tests: Vec<MergedTestRecord>,
    pub unclassified: Vec<String>,
    pub evidence: Option<EvidenceSummary>,
    pub benchmarks: Option<ParsedSection<BenchmarkSummary>>,
    pub coverage: Option<ParsedSection<CoverageSection>>,
    pub manual_results: Option<ParsedSection<usize>>,
    pub security: SecuritySection,
    pub recommendations: Vec<String>,
}

impl ReportData {
    pub fn meets_threshold(&self) -> bool {
        self.pass_rate >= self.pass_threshold
    }

    pub fn core_check(&self, check: CoreCheck) -> Option<&CoreCheckRow> {
        self.core_checks.iter().find(|r| r.number == check.number())
    }

    pub fn line_coverage(&self) -> Option<f64> {
        self.coverage.as_ref().and_then(|c| c.data()).map(|c| c.line_coverage)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFiles {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub html: PathBuf,
    pub csv: PathBuf,
    pub consolidated_markdown: Option<PathBuf>,
    pub consolidated_html: Option<PathBuf>,
}

impl ReportFiles {
    pub fn all(&self) -> Vec<PathBuf> {
        let mut files = vec![self.json.clone(), self.markdown.clone(), self.html.clone(), self.csv.clone()];
        files.extend(self.consolidated_markdown.clone());
        files.extend(self.consolidated_html.clone());
        files
    }
}

/// Timestamp token used in report filenames.
pub fn report_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

pub struct ReportGenerator {
    config: AuditConfig,
    renderer: TemplateRenderer,
    html: HtmlRenderer,
}

impl ReportGenerator {
    pub fn new(config: AuditConfig) -> Result<Self> {
        Ok(Self {
            config,
            renderer: TemplateRenderer::new()?,
            html: HtmlRenderer::new()?,
        })
    }

    pub fn build(&self, input: &ReportInput) -> ReportData {
        self.build_at(input, Utc::now())
    }

    pub fn build_at(&self, input: &ReportInput, generated_at: DateTime<Utc>) -> ReportData {
        let merged = &input.merged;
        let core_checks = self.core_check_rows(input);
        let pass_rate = merged.pass_rate();

        let overall_status = if merged.is_empty() {
            AuditStatus::Skipped
        } else if pass_rate >= self.config.pass_threshold {
            AuditStatus::Passed
        } else {
            AuditStatus::Failed
        };

        let coverage = input.coverage.as_ref().map(|section| match section {
            ParsedSection::Data(report) => ParsedSection::Data(CoverageSection {
                line_coverage: report.line_coverage(),
                lines_found: report.lines_found,
                lines_hit: report.lines_hit,
                files: report.files.len(),
                low_coverage_files: report
                    .least_covered(MIN_LINE_COVERAGE)
                    .iter()
                    .map(|f| f.path.clone())
                    .collect(),
            }),
            ParsedSection::Error { error } => ParsedSection::error(error.clone()),
        });

        let mut data = ReportData {
            generated_at,
            app_name: self.config.app_name.clone(),
            app_version: self.config.app_version.clone(),
            device_info: self.config.device_info.clone(),
            total_tests: merged.total_tests(),
            passed_tests: merged.passed(),
            failed_tests: merged.failed(),
            skipped_tests: merged.skipped(),
            partial_tests: merged.count(AuditStatus::Partial),
            pass_rate,
            pass_threshold: self.config.pass_threshold,
            overall_status,
            total_duration_ms: merged.total_duration_ms(),
            automated_count: merged.automated_count,
            manual_count: merged.manual_count,
            overlap_count: merged.overlap_count,
            tests: merged.iter().cloned().collect(),
            unclassified: merged.unclassified().iter().map(|r| r.id.clone()).collect(),
            evidence: input.evidence.as_ref().map(EvidenceSummary::from_index),
            benchmarks: input.benchmarks.clone(),
            coverage,
            manual_results: input.manual_results.clone(),
            security: self.security_section(merged),
            recommendations: Vec::new(),
            core_checks,
        };
        data.recommendations = recommendations(&data);
        data
    }

    fn core_check_rows(&self, input: &ReportInput) -> Vec<CoreCheckRow> {
        input
            .merged
            .by_core_check()
            .into_values()
            .map(|summary| CoreCheckRow {
                number: summary.check.number(),
                name: summary.check.name().to_string(),
                status: summary.status(),
                total: summary.total,
                passed: summary.passed,
                failed: summary.failed,
                skipped: summary.skipped,
                duration_ms: summary.duration_ms,
                details: summary.details(),
                evidence_count: input
                    .evidence
                    .as_ref()
                    .map(|e| e.for_check(summary.check).len())
                    .unwrap_or(0),
                tests: summary.tests,
            })
            .collect()
    }

    fn security_section(&self, merged: &MergedResults) -> SecuritySection {
        let checksum: Vec<&MergedTestRecord> = merged
            .iter()
            .filter(|r| r.core_check == Some(CoreCheck::ChecksumVerification))
            .collect();
        let passed = checksum.iter().filter(|r| r.status == AuditStatus::Passed).count();

        let mut findings = Vec::new();
        if checksum.is_empty() {
            findings.push("No checksum verification results recorded".to_string());
        } else if passed == checksum.len() {
            findings.push(format!("All {} checksum verifications passed; integrity verified", passed));
        }
        for record in checksum.iter().filter(|r| r.status != AuditStatus::Passed) {
            findings.push(format!(
                "{} {}: {}",
                record.name,
                record.status,
                record.notes.as_deref().unwrap_or("no details")
            ));
        }

        SecuritySection {
            hash_algorithm: "SHA-256".to_string(),
            chunk_size: self.config.chunk_size,
            checksum_tests: checksum.len(),
            checksum_passed: passed,
            integrity_verified: !checksum.is_empty() && passed == checksum.len(),
            findings,
        }
    }

    pub fn template_values(&self, data: &ReportData) -> TemplateValues {
        let mut values = TemplateValues::new();
        let mut set = |p: Placeholder, v: String| {
            values.insert(p, v);
        };

        set(Placeholder::AppName, data.app_name.clone());
        set(Placeholder::AppVersion, data.app_version.clone());
        set(Placeholder::ReportDate, data.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        set(Placeholder::Timestamp, report_timestamp(data.generated_at));
        set(Placeholder::TotalTests, data.total_tests.to_string());
        set(Placeholder::PassedTests, data.passed_tests.to_string());
        set(Placeholder::FailedTests, data.failed_tests.to_string());
        set(Placeholder::SkippedTests, data.skipped_tests.to_string());
        set(Placeholder::PassRate, format!("{:.1}%", data.pass_rate));
        set(Placeholder::TotalDuration, format_duration(data.total_duration_ms));
        set(Placeholder::OverallStatus, data.overall_status.label().to_string());

        let device = &data.device_info;
        for (p, v) in [
            (Placeholder::DeviceModel, &device.device_model),
            (Placeholder::OsVersion, &device.os_version),
            (Placeholder::AppBuild, &device.app_build),
        ] {
            if let Some(v) = v {
                set(p, v.clone());
            }
        }
        if let Some(evidence) = &data.evidence {
            set(Placeholder::EvidenceCount, evidence.total.to_string());
        }
        if let Some(coverage) = data.line_coverage() {
            set(Placeholder::LineCoverage, format!("{:.1}%", coverage));
        }

        for row in data.core_checks.iter().filter(|r| r.total > 0) {
            if let Some(check) = CoreCheck::from_number(row.number) {
                set(Placeholder::CoreStatus(check), row.status.label().to_string());
                set(Placeholder::CoreDetails(check), row.details.clone());
                set(Placeholder::CoreDuration(check), format_duration(row.duration_ms));
            }
        }
        values
    }

    pub fn render_template(&self, template: &str, data: &ReportData) -> String {
        self.renderer.render(template, &self.template_values(data))
    }

    /// Writes the four standard reports, plus the consolidated pair when a
    /// template exists at `template`. A missing template is skipped.
    pub fn write_reports(
        &self,
        data: &ReportData,
        output_dir: impl AsRef<Path>,
        timestamp: &str,
        template: Option<&Path>,
    ) -> Result<ReportFiles> {
        let dir = output_dir.as_ref();
        fs::create_dir_all(dir)?;

        let files = ReportFiles {
            json: dir.join(format!("audit_report_{}.json", timestamp)),
            markdown: dir.join(format!("audit_report_{}.md", timestamp)),
            html: dir.join(format!("audit_report_{}.html", timestamp)),
            csv: dir.join(format!("audit_report_{}.csv", timestamp)),
            consolidated_markdown: None,
            consolidated_html: None,
        };
        fs::write(&files.json, formats::to_json(data)?)?;
        fs::write(&files.markdown, formats::to_markdown(data))?;
        fs::write(&files.html, self.html.render_report(data)?)?;
        fs::write(&files.csv, formats::to_csv(data))?;

        let mut files = files;
        match template {
            Some(path) if path.is_file() => {
                let rendered = self.render_template(&fs::read_to_string(path)?, data);
                let md = dir.join(format!("consolidated_audit_report_{}.md", timestamp));
                let html = dir.join(format!("consolidated_audit_report_{}.html", timestamp));
                fs::write(&md, &rendered)?;
                fs::write(&html, self.html.render_markdown(REPORT_TITLE, &rendered)?)?;
                files.consolidated_markdown = Some(md);
                files.consolidated_html = Some(html);
            }
            Some(path) => {
                tracing::warn!("Template {} not found, skipping consolidated report", path.display());
            }
            None => {}
        }

        tracing::info!("Wrote {} report files to {}", files.all().len(), dir.display());
        Ok(files)
    }
}

fn recommendations(data: &ReportData) -> Vec<String> {
    let mut out = Vec::new();

    if data.total_tests > 0 && !data.meets_threshold() {
        out.push(format!(
            "Pass rate {:.1}% is below the {:.1}% threshold",
            data.pass_rate, data.pass_threshold
        ));
    }

    for row in &data.core_checks {
        let label = format!("Core Check {}: {}", row.number, row.name);
        match row.status {
            AuditStatus::Failed => out.push(format!(
                "Investigate failures in {} ({} of {} failed)",
                label, row.failed, row.total
            )),
            AuditStatus::Partial => out.push(format!("Stabilise partially passing tests in {}", label)),
            AuditStatus::Skipped if row.total == 0 => out.push(format!("Add test coverage for {}", label)),
            _ => {}
        }
        if data.evidence.is_some() && row.total > 0 && row.evidence_count == 0 {
            out.push(format!("Capture evidence for {}", label));
        }
    }

    match &data.coverage {
        Some(ParsedSection::Data(c)) if c.line_coverage < MIN_LINE_COVERAGE => out.push(format!(
            "Raise line coverage from {:.1}% to at least {:.0}%",
            c.line_coverage, MIN_LINE_COVERAGE
        )),
        Some(ParsedSection::Error { error }) => out.push(format!("Fix coverage data: {}", error)),
        _ => {}
    }

    if let Some(ParsedSection::Error { error }) = &data.manual_results {
        out.push(format!("Fix manual results file: {}", error));
    }

    if let Some(ParsedSection::Data(bench)) = &data.benchmarks {
        for metric in bench.failing() {
            out.push(format!(
                "Benchmark {} misses its target ({} vs {:.2})",
                metric.name,
                metric.display_value(),
                metric.target.unwrap_or_default()
            ));
        }
    }

    if out.is_empty() {
        out.push("No action required: all core checks passed".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge, SourceType};
    use tempfile::TempDir;

    fn record(id: &str, status: AuditStatus) -> MergedTestRecord {
        MergedTestRecord::new(id, id, status, SourceType::Automated)
    }

    fn generator() -> ReportGenerator {
        ReportGenerator::new(AuditConfig::default()).unwrap()
    }

    #[test]
    fn test_single_passed_test() {
        let merged = merge(&[record("t1", AuditStatus::Passed)], &[]);
        let data = generator().build(&ReportInput::new(merged));
        assert_eq!(data.total_tests, 1);
        assert_eq!(data.passed_tests, 1);
        assert_eq!(data.failed_tests, 0);
        assert_eq!(data.pass_rate, 100.0);
        assert_eq!(data.overall_status, AuditStatus::Passed);
    }

    #[test]
    fn test_core_check_rows_cover_all_checks() {
        let merged = merge(
            &[record("checksum_a", AuditStatus::Passed), record("checksum_b", AuditStatus::Failed)],
            &[],
        );
        let data = generator().build(&ReportInput::new(merged));
        assert_eq!(data.core_checks.len(), 11);
        let row = data.core_check(CoreCheck::ChecksumVerification).unwrap();
        assert_eq!(row.total, 2);
        assert_eq!(row.status, AuditStatus::Failed);
        assert!(!data.security.integrity_verified);
        assert!(data.recommendations.iter().any(|r| r.contains("Core Check 6")));
    }

    #[test]
    fn test_security_verified_when_all_checksums_pass() {
        let merged = merge(&[record("checksum_roundtrip", AuditStatus::Passed)], &[]);
        let data = generator().build(&ReportInput::new(merged));
        assert!(data.security.integrity_verified);
        assert_eq!(data.security.hash_algorithm, "SHA-256");
    }

    #[test]
    fn test_coverage_recommendation() {
        let coverage = super::super::coverage::parse_coverage("SF:a\nLF:10\nLH:5\nend_of_record\n");
        let input = ReportInput::new(merge(&[], &[])).with_coverage(coverage);
        let data = generator().build(&input);
        assert_eq!(data.line_coverage(), Some(50.0));
        assert!(data.recommendations.iter().any(|r| r.contains("Raise line coverage")));
    }

    #[test]
    fn test_template_defaults_for_empty_data() {
        let gen = generator();
        let data = gen.build(&ReportInput::default());
        let out = gen.render_template("{{TOTAL_TESTS}} {{CORE_03_STATUS}} {{DEVICE_MODEL}} {{APP_NAME}}", &data);
        assert_eq!(out, "0 ⏭️ SKIPPED N/A AirLink");
    }

    #[test]
    fn test_write_reports_soft_skips_missing_template() {
        let dir = TempDir::new().unwrap();
        let gen = generator();
        let data = gen.build(&ReportInput::new(merge(&[record("t1", AuditStatus::Passed)], &[])));

        let missing = dir.path().join("nope.md");
        let files = gen.write_reports(&data, dir.path().join("out"), "20240101_000000", Some(missing.as_path())).unwrap();
        assert_eq!(files.all().len(), 4);
        assert!(files.json.ends_with("audit_report_20240101_000000.json"));
        assert!(files.consolidated_markdown.is_none());
        for path in files.all() {
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_write_reports_with_template() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.md");
        fs::write(&template, "# {{APP_NAME}}\n\nPassed: {{PASSED_TESTS}}\n").unwrap();

        let gen = generator();
        let data = gen.build(&ReportInput::new(merge(&[record("t1", AuditStatus::Passed)], &[])));
        let files = gen.write_reports(&data, dir.path(), "ts", Some(template.as_path())).unwrap();

        let md = fs::read_to_string(files.consolidated_markdown.unwrap()).unwrap();
        assert_eq!(md, "# AirLink\n\nPassed: 1\n");
        let html = fs::read_to_string(files.consolidated_html.unwrap()).unwrap();
        assert!(html.contains("<h1>AirLink</h1>"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(350), "350ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }
}
