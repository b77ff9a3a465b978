use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::audit::AuditStatus;
use crate::error::{AuditError, Result};
use super::merger::{MergedTestRecord, SourceType};

/// Either parsed data or an explicit error marker. Consumers must check for
/// the marker before treating a section as data; it serializes as
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedSection<T> {
    Data(T),
    Error { error: String },
}

impl<T> ParsedSection<T> {
    pub fn error(message: impl Into<String>) -> Self {
        ParsedSection::Error { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ParsedSection::Error { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ParsedSection::Data(d) => Some(d),
            ParsedSection::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ParsedSection::Data(_) => None,
            ParsedSection::Error { error } => Some(error),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ParsedSection::Data(d) => Some(d),
            ParsedSection::Error { .. } => None,
        }
    }
}

impl<T> From<Result<T>> for ParsedSection<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => ParsedSection::Data(data),
            Err(e) => ParsedSection::error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryCase {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    test_type: Option<String>,
}

/// One hand-written or exported result line. Accepts the `testId`/`id` and
/// `testName`/`name` spellings, and either a `passed` flag or a `status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    #[serde(default, alias = "id")]
    pub test_id: Option<String>,
    #[serde(default, alias = "name")]
    pub test_name: Option<String>,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "durationMs")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    test_case: Option<EntryCase>,
}

impl ResultEntry {
    fn resolved_id(&self) -> Option<String> {
        self.test_id
            .clone()
            .or_else(|| self.test_case.as_ref().and_then(|c| c.id.clone()))
            .filter(|id| !id.trim().is_empty())
    }

    fn resolved_status(&self) -> Result<AuditStatus> {
        if let Some(status) = &self.status {
            return AuditStatus::parse(status)
                .ok_or_else(|| AuditError::ManualResults(format!("unknown status '{}'", status)));
        }
        Ok(match self.passed {
            Some(true) => AuditStatus::Passed,
            Some(false) => AuditStatus::Failed,
            None => AuditStatus::Skipped,
        })
    }

    pub fn into_record(self, index: usize, source: SourceType) -> Result<MergedTestRecord> {
        let id = self
            .resolved_id()
            .ok_or_else(|| AuditError::ManualResults(format!("entry {} has no test id", index)))?;
        let status = self
            .resolved_status()
            .map_err(|e| AuditError::ManualResults(format!("entry {} ({}): {}", index, id, e)))?;

        let case = self.test_case.unwrap_or_default();
        let name = self.test_name.or(case.name).unwrap_or_else(|| id.clone());
        let category = self.category.or(case.test_type).unwrap_or_default();
        let duration_ms = self.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0) as u64;

        let mut record = MergedTestRecord::new(id, name, status, source)
            .with_category(category)
            .with_duration(duration_ms)
            .with_evidence(self.evidence);
        record.notes = self.notes;
        Ok(record)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultsDocument {
    Tests { tests: Vec<ResultEntry> },
    Results { results: Vec<ResultEntry> },
    Bare(Vec<ResultEntry>),
}

fn parse_records(content: &str, source: SourceType) -> Result<Vec<MergedTestRecord>> {
    let document: ResultsDocument = serde_json::from_str(content).map_err(|e| {
        AuditError::ManualResults(format!("expected an object with a `tests` array: {}", e))
    })?;
    let entries = match document {
        ResultsDocument::Tests { tests } => tests,
        ResultsDocument::Results { results } => results,
        ResultsDocument::Bare(entries) => entries,
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.into_record(i, source))
        .collect()
}

/// Parses a results document. Malformed input never errors; it comes back as
/// a `ParsedSection::Error` marker.
pub fn parse_results(content: &str, source: SourceType) -> ParsedSection<Vec<MergedTestRecord>> {
    parse_records(content, source).into()
}

pub fn load_results(path: impl AsRef<Path>, source: SourceType) -> ParsedSection<Vec<MergedTestRecord>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => parse_results(&content, source),
        Err(e) => ParsedSection::error(format!("{}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::CoreCheck;

    #[test]
    fn test_parse_tests_object() {
        let json = r#"{
            "tests": [
                {"testId": "qr_01", "testName": "QR pairing on iPhone", "passed": true, "duration": 1200, "category": "qr_pairing", "evidence": ["screenshots/qr.png"]},
                {"id": "ui_02", "name": "Dark mode", "status": "FAILED", "notes": "contrast too low"}
            ]
        }"#;
        let parsed = parse_results(json, SourceType::Manual);
        let records = parsed.data().unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, "qr_01");
        assert_eq!(records[0].status, AuditStatus::Passed);
        assert_eq!(records[0].duration_ms, 1200);
        assert_eq!(records[0].core_check, Some(CoreCheck::QrPairing));
        assert_eq!(records[0].source, SourceType::Manual);

        assert_eq!(records[1].name, "Dark mode");
        assert_eq!(records[1].status, AuditStatus::Failed);
        assert_eq!(records[1].notes.as_deref(), Some("contrast too low"));
        assert_eq!(records[1].core_check, Some(CoreCheck::UiUx));
    }

    #[test]
    fn test_parse_bare_array_and_results_key() {
        let bare = parse_results(r#"[{"id": "a", "passed": false}]"#, SourceType::Automated);
        assert_eq!(bare.data().unwrap()[0].status, AuditStatus::Failed);

        let keyed = parse_results(r#"{"results": [{"id": "b"}]}"#, SourceType::Automated);
        assert_eq!(keyed.data().unwrap()[0].status, AuditStatus::Skipped);
    }

    #[test]
    fn test_parse_exported_audit_results() {
        let json = r#"[{"testCase": {"id": "core_06_checksum", "name": "SHA-256 round trip", "testType": "checksum_verification"}, "status": "passed"}]"#;
        let records = parse_results(json, SourceType::Automated).into_data().unwrap();
        assert_eq!(records[0].id, "core_06_checksum");
        assert_eq!(records[0].name, "SHA-256 round trip");
        assert_eq!(records[0].category, "checksum_verification");
    }

    #[test]
    fn test_malformed_json_is_error_marker() {
        let parsed = parse_results("{not json", SourceType::Manual);
        assert!(parsed.is_error());
        let rendered = serde_json::to_value(&parsed).unwrap();
        assert!(rendered.get("error").is_some());
    }

    #[test]
    fn test_missing_id_and_bad_status_are_errors() {
        let parsed = parse_results(r#"{"tests": [{"name": "nameless"}]}"#, SourceType::Manual);
        assert!(parsed.error_message().unwrap().contains("no test id"));

        let parsed = parse_results(r#"{"tests": [{"id": "x", "status": "sort of"}]}"#, SourceType::Manual);
        assert!(parsed.error_message().unwrap().contains("unknown status"));
    }

    #[test]
    fn test_load_missing_file() {
        let parsed = load_results("/no/such/manual_results.json", SourceType::Manual);
        assert!(parsed.is_error());
    }
}
