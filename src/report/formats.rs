use std::fmt::Write as _;
use crate::audit::AuditStatus;
use crate::error::Result;
use crate::merge::ParsedSection;
use super::generator::{format_duration, ReportData, MIN_LINE_COVERAGE, REPORT_TITLE};

pub fn to_json(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string(data)?)
}

pub fn to_json_pretty(data: &ReportData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn md_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("N/A")
}

/// Sections in fixed order: Summary, Test Results, Performance Metrics,
/// Security Audit, Code Quality, Recommendations.
pub fn to_markdown(data: &ReportData) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", REPORT_TITLE);
    let _ = writeln!(md, "- **Generated:** {}", data.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(md, "- **App:** {} {}", data.app_name, data.app_version);
    let _ = writeln!(
        md,
        "- **Device:** {} / {} (build {})\n",
        or_na(&data.device_info.device_model),
        or_na(&data.device_info.os_version),
        or_na(&data.device_info.app_build)
    );

    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "| Metric | Value |");
    let _ = writeln!(md, "|---|---|");
    let _ = writeln!(md, "| Total Tests | {} |", data.total_tests);
    let _ = writeln!(md, "| Passed | {} |", data.passed_tests);
    let _ = writeln!(md, "| Failed | {} |", data.failed_tests);
    let _ = writeln!(md, "| Skipped | {} |", data.skipped_tests);
    let _ = writeln!(md, "| Partial | {} |", data.partial_tests);
    let _ = writeln!(md, "| Pass Rate | {:.1}% (threshold {:.1}%) |", data.pass_rate, data.pass_threshold);
    let _ = writeln!(md, "| Duration | {} |", format_duration(data.total_duration_ms));
    let _ = writeln!(
        md,
        "| Sources | {} automated, {} manual, {} overridden |",
        data.automated_count, data.manual_count, data.overlap_count
    );
    let _ = writeln!(md, "\n**Overall:** {}\n", data.overall_status.label());

    let _ = writeln!(md, "## Test Results\n");
    let _ = writeln!(md, "### Core Checks\n");
    let _ = writeln!(md, "| # | Core Check | Status | Passed | Failed | Skipped | Duration | Evidence |");
    let _ = writeln!(md, "|---|---|---|---|---|---|---|---|");
    for row in &data.core_checks {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            row.number,
            row.name,
            row.status.label(),
            row.passed,
            row.failed,
            row.skipped,
            format_duration(row.duration_ms),
            row.evidence_count
        );
    }

    let _ = writeln!(md, "\n### All Tests\n");
    if data.tests.is_empty() {
        let _ = writeln!(md, "_No test results recorded._");
    } else {
        let _ = writeln!(md, "| ID | Name | Status | Source | Core Check | Duration | Notes |");
        let _ = writeln!(md, "|---|---|---|---|---|---|---|");
        for t in &data.tests {
            let check = t.core_check.map(|c| c.number().to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} | {} |",
                md_cell(&t.id),
                md_cell(&t.name),
                t.status.label(),
                t.source.as_str(),
                check,
                format_duration(t.duration_ms),
                md_cell(t.notes.as_deref().unwrap_or(""))
            );
        }
    }
    if !data.unclassified.is_empty() {
        let _ = writeln!(md, "\nUnclassified tests: {}", data.unclassified.join(", "));
    }
    if let Some(ParsedSection::Error { error }) = &data.manual_results {
        let _ = writeln!(md, "\n⚠️ Manual results unavailable: {}", error);
    }

    if let Some(evidence) = &data.evidence {
        let _ = writeln!(md, "\n### Evidence\n");
        let _ = writeln!(md, "{} files ({} bytes)", evidence.total, evidence.total_bytes);
        for (category, count) in &evidence.by_category {
            let _ = writeln!(md, "- {}: {}", category, count);
        }
        for error in &evidence.errors {
            let _ = writeln!(md, "- ⚠️ {}", error);
        }
    }

    let _ = writeln!(md, "\n## Performance Metrics\n");
    match &data.benchmarks {
        Some(ParsedSection::Data(bench)) if !bench.is_empty() => {
            let _ = writeln!(md, "| Metric | Value | Target | Status |");
            let _ = writeln!(md, "|---|---|---|---|");
            for m in &bench.metrics {
                let target = m.target.map(|t| format!("{:.2}", t)).unwrap_or_else(|| "-".to_string());
                let _ = writeln!(md, "| {} | {} | {} | {} |", md_cell(&m.name), m.display_value(), target, m.status());
            }
        }
        Some(ParsedSection::Error { error }) => {
            let _ = writeln!(md, "⚠️ Benchmark data unavailable: {}", error);
        }
        _ => {
            let _ = writeln!(md, "_No benchmark data supplied._");
        }
    }

    let _ = writeln!(md, "\n## Security Audit\n");
    let sec = &data.security;
    let _ = writeln!(md, "- Hash algorithm: {} ({} byte chunks)", sec.hash_algorithm, sec.chunk_size);
    let _ = writeln!(md, "- Checksum tests: {}/{} passed", sec.checksum_passed, sec.checksum_tests);
    let _ = writeln!(
        md,
        "- Integrity: {}",
        if sec.integrity_verified { "✅ verified" } else { "❌ not verified" }
    );
    for finding in &sec.findings {
        let _ = writeln!(md, "- {}", finding);
    }

    let _ = writeln!(md, "\n## Code Quality\n");
    match &data.coverage {
        Some(ParsedSection::Data(c)) => {
            let _ = writeln!(
                md,
                "- Line coverage: {:.1}% ({}/{} lines, {} files)",
                c.line_coverage, c.lines_hit, c.lines_found, c.files
            );
            if !c.low_coverage_files.is_empty() {
                let _ = writeln!(md, "- Below {:.0}%: {}", MIN_LINE_COVERAGE, c.low_coverage_files.join(", "));
            }
        }
        Some(ParsedSection::Error { error }) => {
            let _ = writeln!(md, "⚠️ Coverage data unavailable: {}", error);
        }
        None => {
            let _ = writeln!(md, "_No coverage data supplied._");
        }
    }

    let _ = writeln!(md, "\n## Recommendations\n");
    for (i, rec) in data.recommendations.iter().enumerate() {
        let _ = writeln!(md, "{}. {}", i + 1, rec);
    }
    md
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn csv_row(out: &mut String, metric: &str, value: &str, category: &str, status: &str) {
    let _ = writeln!(
        out,
        "{},{},{},{}",
        csv_field(metric),
        csv_field(value),
        csv_field(category),
        csv_field(status)
    );
}

fn pass_fail(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

pub fn to_csv(data: &ReportData) -> String {
    let mut out = String::from("Metric,Value,Category,Status\n");
    csv_row(&mut out, "Total Tests", &data.total_tests.to_string(), "Summary", "INFO");
    csv_row(&mut out, "Passed Tests", &data.passed_tests.to_string(), "Summary", "INFO");
    csv_row(&mut out, "Failed Tests", &data.failed_tests.to_string(), "Summary", "INFO");
    csv_row(&mut out, "Skipped Tests", &data.skipped_tests.to_string(), "Summary", "INFO");
    csv_row(
        &mut out,
        "Pass Rate",
        &format!("{:.1}", data.pass_rate),
        "Summary",
        pass_fail(data.meets_threshold()),
    );
    csv_row(&mut out, "Total Duration (ms)", &data.total_duration_ms.to_string(), "Summary", "INFO");

    for row in &data.core_checks {
        let status = match row.status {
            AuditStatus::Passed => "PASS",
            AuditStatus::Failed => "FAIL",
            AuditStatus::Partial => "PARTIAL",
            AuditStatus::Skipped => "SKIPPED",
        };
        csv_row(
            &mut out,
            &format!("Core Check {}: {}", row.number, row.name),
            &format!("{}/{}", row.passed, row.total),
            "Core Check",
            status,
        );
    }

    if let Some(ParsedSection::Data(bench)) = &data.benchmarks {
        for m in &bench.metrics {
            csv_row(&mut out, &m.name, &format!("{}", m.value), "Performance", m.status());
        }
    }

    csv_row(
        &mut out,
        "Integrity Verified",
        &data.security.integrity_verified.to_string(),
        "Security",
        pass_fail(data.security.integrity_verified),
    );

    if let Some(coverage) = data.line_coverage() {
        csv_row(
            &mut out,
            "Line Coverage",
            &format!("{:.1}", coverage),
            "Code Quality",
            pass_fail(coverage >= MIN_LINE_COVERAGE),
        );
    }
    if let Some(evidence) = &data.evidence {
        csv_row(&mut out, "Evidence Files", &evidence.total.to_string(), "Evidence", "INFO");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::merge::{merge, MergedTestRecord, SourceType};
    use crate::report::{ReportGenerator, ReportInput};

    fn sample() -> ReportData {
        let records = vec![
            MergedTestRecord::new("core_01_discovery", "Discovery, BLE", AuditStatus::Passed, SourceType::Automated),
            MergedTestRecord::new("core_08_qr", "QR | camera", AuditStatus::Failed, SourceType::Manual)
                .with_notes("lens \"fogged\""),
        ];
        ReportGenerator::new(AuditConfig::default())
            .unwrap()
            .build(&ReportInput::new(merge(&records, &[])))
    }

    #[test]
    fn test_markdown_section_order() {
        let md = to_markdown(&sample());
        assert!(md.starts_with("# AirLink Audit Report"));
        let order = [
            "## Summary",
            "## Test Results",
            "## Performance Metrics",
            "## Security Audit",
            "## Code Quality",
            "## Recommendations",
        ];
        let positions: Vec<usize> = order.iter().map(|h| md.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(md.contains("QR \\| camera"));
    }

    #[test]
    fn test_csv_quoting() {
        let csv = to_csv(&sample());
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Metric,Value,Category,Status"));
        assert!(csv.contains("Pass Rate,50.0,Summary,FAIL"));
        assert!(csv.contains("Core Check 8: QR Pairing,0/1,Core Check,FAIL"));
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_json_is_compact() {
        let json = to_json(&sample()).unwrap();
        assert!(json.contains("\"totalTests\":2"));
        assert!(json.contains("\"generatedAt\""));
    }
}
