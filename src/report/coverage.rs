use std::fs;
use std::path::Path;
use serde::Serialize;
use crate::error::{AuditError, Result};
use crate::merge::ParsedSection;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    pub path: String,
    pub lines_found: u64,
    pub lines_hit: u64,
}

impl FileCoverage {
    pub fn percent(&self) -> f64 {
        percent(self.lines_hit, self.lines_found)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub files: Vec<FileCoverage>,
    pub lines_found: u64,
    pub lines_hit: u64,
}

impl CoverageReport {
    pub fn line_coverage(&self) -> f64 {
        percent(self.lines_hit, self.lines_found)
    }

    /// Files below `threshold` percent, worst first.
    pub fn least_covered(&self, threshold: f64) -> Vec<&FileCoverage> {
        let mut low: Vec<&FileCoverage> = self.files.iter().filter(|f| f.percent() < threshold).collect();
        low.sort_by(|a, b| a.percent().total_cmp(&b.percent()));
        low
    }
}

fn percent(hit: u64, found: u64) -> f64 {
    if found == 0 {
        return 0.0;
    }
    ((hit as f64 / found as f64 * 100.0) * 10.0).round() / 10.0
}

#[derive(Default)]
struct OpenRecord {
    path: String,
    lf: Option<u64>,
    lh: Option<u64>,
    da_found: u64,
    da_hit: u64,
}

fn number(line_no: usize, tag: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| AuditError::Coverage(format!("line {}: {} value '{}' is not a number", line_no, tag, value.trim())))
}

/// Parses LCOV tracefile text. `LF`/`LH` win over counted `DA` lines when a
/// record has both.
pub fn parse_lcov(content: &str) -> Result<CoverageReport> {
    let mut report = CoverageReport::default();
    let mut current: Option<OpenRecord> = None;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            let record = current
                .take()
                .ok_or_else(|| AuditError::Coverage(format!("line {}: end_of_record without SF", line_no)))?;
            let found = record.lf.unwrap_or(record.da_found);
            let hit = record.lh.unwrap_or(record.da_hit);
            if hit > found {
                return Err(AuditError::Coverage(format!(
                    "{}: {} lines hit but only {} found",
                    record.path, hit, found
                )));
            }
            report.lines_found += found;
            report.lines_hit += hit;
            report.files.push(FileCoverage { path: record.path, lines_found: found, lines_hit: hit });
            continue;
        }

        let (tag, value) = line
            .split_once(':')
            .ok_or_else(|| AuditError::Coverage(format!("line {}: unrecognised '{}'", line_no, line)))?;

        if tag == "SF" {
            if current.is_some() {
                return Err(AuditError::Coverage(format!("line {}: SF before end_of_record", line_no)));
            }
            current = Some(OpenRecord { path: value.to_string(), ..OpenRecord::default() });
            continue;
        }
        if tag == "TN" {
            continue;
        }

        let record = current
            .as_mut()
            .ok_or_else(|| AuditError::Coverage(format!("line {}: {} outside of a record", line_no, tag)))?;
        match tag {
            "LF" => record.lf = Some(number(line_no, tag, value)?),
            "LH" => record.lh = Some(number(line_no, tag, value)?),
            "DA" => {
                let mut parts = value.split(',');
                let _line = parts.next();
                let hits = parts
                    .next()
                    .ok_or_else(|| AuditError::Coverage(format!("line {}: DA without hit count", line_no)))?;
                record.da_found += 1;
                if number(line_no, tag, hits)? > 0 {
                    record.da_hit += 1;
                }
            }
            _ => {}
        }
    }

    if let Some(open) = current {
        return Err(AuditError::Coverage(format!("{}: missing end_of_record", open.path)));
    }
    if report.files.is_empty() {
        return Err(AuditError::Coverage("no coverage records found".to_string()));
    }
    Ok(report)
}

pub fn parse_coverage(content: &str) -> ParsedSection<CoverageReport> {
    parse_lcov(content).into()
}

pub fn load_coverage(path: impl AsRef<Path>) -> ParsedSection<CoverageReport> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => parse_coverage(&content),
        Err(e) => ParsedSection::error(format!("{}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TN:\nSF:lib/transfer.dart\nDA:1,1\nDA:2,0\nLF:4\nLH:3\nend_of_record\nSF:lib/checksum.dart\nDA:1,5\nDA:2,0\nDA:3,0\nDA:4,2\nend_of_record\n";

    #[test]
    fn test_parse_lcov_totals() {
        let report = parse_lcov(SAMPLE).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].lines_found, 4);
        assert_eq!(report.files[0].lines_hit, 3);
        assert_eq!(report.files[1].lines_found, 4);
        assert_eq!(report.files[1].lines_hit, 2);
        assert_eq!(report.line_coverage(), 62.5);
    }

    #[test]
    fn test_least_covered() {
        let report = parse_lcov(SAMPLE).unwrap();
        let low = report.least_covered(80.0);
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].path, "lib/checksum.dart");
    }

    #[test]
    fn test_malformed_lcov_is_error_marker() {
        assert!(parse_coverage("LF:abc\n").is_error());
        assert!(parse_coverage("SF:a\nLF:x\nend_of_record\n").is_error());
        assert!(parse_coverage("SF:a\nLF:1\n").is_error());
        assert!(parse_coverage("garbage").is_error());
        assert!(parse_coverage("").is_error());
        assert!(parse_coverage("SF:a\nLF:1\nLH:2\nend_of_record\n").is_error());
    }

    #[test]
    fn test_zero_lines_found() {
        let report = parse_lcov("SF:empty\nend_of_record\n").unwrap();
        assert_eq!(report.line_coverage(), 0.0);
    }
}
