use std::path::PathBuf;
use crate::error::{AuditError, Result};
use crate::evidence::EvidenceIndexer;
use crate::merge::{load_results, merge, ParsedSection, SourceType};
use super::benchmark::BenchmarkSummary;
use super::coverage::load_coverage;
use super::generator::ReportInput;

/// Files a standalone report run reads. A `None` field is not read at all.
#[derive(Debug, Clone, Default)]
pub struct ReportSources {
    pub automated_results: Option<PathBuf>,
    pub manual_results: Option<PathBuf>,
    pub evidence_dir: Option<PathBuf>,
    pub benchmarks: Option<PathBuf>,
    pub coverage: Option<PathBuf>,
}

impl ReportSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_automated_results(mut self, path: impl Into<PathBuf>) -> Self {
        self.automated_results = Some(path.into());
        self
    }

    pub fn with_manual_results(mut self, path: impl Into<PathBuf>) -> Self {
        self.manual_results = Some(path.into());
        self
    }

    pub fn with_evidence_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.evidence_dir = Some(path.into());
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

    /// Reads every configured source into a `ReportInput`.
    ///
    /// Only a broken automated results file is an error. Broken manual,
    /// benchmark and coverage files become `{error}` markers and a missing
    /// evidence directory is recorded in the evidence index errors.
    pub fn collect(&self) -> Result<ReportInput> {
        let automated = match &self.automated_results {
            Some(path) => match load_results(path, SourceType::Automated) {
                ParsedSection::Data(records) => {
                    tracing::info!("Loaded {} automated results from {}", records.len(), path.display());
                    records
                }
                ParsedSection::Error { error } => {
                    return Err(AuditError::Report(format!(
                        "Invalid automated results {}: {}",
                        path.display(),
                        error
                    )));
                }
            },
            None => Vec::new(),
        };

        let (manual, manual_section) = match &self.manual_results {
            Some(path) => match load_results(path, SourceType::Manual) {
                ParsedSection::Data(records) => {
                    tracing::info!("Loaded {} manual results from {}", records.len(), path.display());
                    let count = records.len();
                    (records, Some(ParsedSection::Data(count)))
                }
                ParsedSection::Error { error } => {
                    tracing::warn!("Manual results unavailable: {}", error);
                    (Vec::new(), Some(ParsedSection::error(error)))
                }
            },
            None => (Vec::new(), None),
        };

        let merged = merge(&automated, &manual);
        tracing::info!(
            "Merged {} automated and {} manual results into {} tests",
            merged.automated_count,
            merged.manual_count,
            merged.total_tests()
        );

        let mut input = ReportInput::new(merged);
        if let Some(section) = manual_section {
            input = input.with_manual_results(section);
        }
        if let Some(dir) = &self.evidence_dir {
            let index = EvidenceIndexer::new(dir).index();
            for error in &index.errors {
                tracing::warn!("Evidence: {}", error);
            }
            input = input.with_evidence(index);
        }
        if let Some(path) = &self.benchmarks {
            let section = BenchmarkSummary::load(path);
            if let Some(error) = section.error_message() {
                tracing::warn!("Benchmarks unavailable: {}", error);
            }
            input = input.with_benchmarks(section);
        }
        if let Some(path) = &self.coverage {
            let section = load_coverage(path);
            if let Some(error) = section.error_message() {
                tracing::warn!("Coverage unavailable: {}", error);
            }
            input = input.with_coverage(section);
        }
        Ok(input)
    }
}
