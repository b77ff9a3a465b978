use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use crate::audit::{pass_rate, AuditResult, AuditStatus};
use super::core_check::{classify, CoreCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Automated,
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Automated => "automated",
            SourceType::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedTestRecord {
    pub id: String,
    pub name: String,
    pub status: AuditStatus,
    pub duration_ms: u64,
    pub source: SourceType,
    pub category: String,
    pub core_check: Option<CoreCheck>,
    pub notes: Option<String>,
    pub evidence: Vec<String>,
}

impl MergedTestRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: AuditStatus, source: SourceType) -> Self {
        let mut record = Self {
            id: id.into(),
            name: name.into(),
            status,
            duration_ms: 0,
            source,
            category: String::new(),
            core_check: None,
            notes: None,
            evidence: Vec::new(),
        };
        record.reclassify();
        record
    }

    pub fn from_result(result: &AuditResult) -> Self {
        let case = &result.test_case;
        let mut record = Self::new(&case.id, &case.name, result.status, SourceType::Automated)
            .with_category(case.test_type.as_str())
            .with_duration(result.duration_ms());
        record.notes = result.notes.clone();
        record.evidence = result.evidence.values().cloned().collect();
        record
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self.reclassify();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    fn reclassify(&mut self) {
        self.core_check = classify(&self.id, &self.name, &self.category);
    }
}

/// Tally of every merged record that maps to one core check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreCheckSummary {
    pub check: CoreCheck,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub partial: usize,
    pub duration_ms: u64,
    pub tests: Vec<String>,
}

impl CoreCheckSummary {
    fn empty(check: CoreCheck) -> Self {
        Self {
            check,
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            partial: 0,
            duration_ms: 0,
            tests: Vec::new(),
        }
    }

    fn add(&mut self, record: &MergedTestRecord) {
        self.total += 1;
        self.duration_ms += record.duration_ms;
        self.tests.push(record.name.clone());
        match record.status {
            AuditStatus::Passed => self.passed += 1,
            AuditStatus::Failed => self.failed += 1,
            AuditStatus::Skipped => self.skipped += 1,
            AuditStatus::Partial => self.partial += 1,
        }
    }

    pub fn status(&self) -> AuditStatus {
        if self.failed > 0 {
            AuditStatus::Failed
        } else if self.partial > 0 {
            AuditStatus::Partial
        } else if self.passed > 0 {
            AuditStatus::Passed
        } else {
            AuditStatus::Skipped
        }
    }

    pub fn details(&self) -> String {
        if self.total == 0 {
            return "No tests recorded".to_string();
        }
        format!("{}/{} passed: {}", self.passed, self.total, self.tests.join(", "))
    }
}

/// Reconciled view of automated and manual results, keyed by test id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedResults {
    pub records: BTreeMap<String, MergedTestRecord>,
    pub automated_count: usize,
    pub manual_count: usize,
    pub overlap_count: usize,
}

impl MergedResults {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MergedTestRecord> {
        self.records.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedTestRecord> {
        self.records.values()
    }

    pub fn total_tests(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self, status: AuditStatus) -> usize {
        self.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(AuditStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(AuditStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(AuditStatus::Skipped)
    }

    pub fn pass_rate(&self) -> f64 {
        pass_rate(self.passed(), self.total_tests())
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.iter().map(|r| r.duration_ms).sum()
    }

    /// One entry for each of the eleven checks, including checks no record
    /// mapped to.
    pub fn by_core_check(&self) -> BTreeMap<CoreCheck, CoreCheckSummary> {
        let mut summaries: BTreeMap<CoreCheck, CoreCheckSummary> = CoreCheck::ALL
            .iter()
            .map(|c| (*c, CoreCheckSummary::empty(*c)))
            .collect();

        for record in self.iter() {
            if let Some(summary) = record.core_check.and_then(|c| summaries.get_mut(&c)) {
                summary.add(record);
            }
        }
        summaries
    }

    pub fn unclassified(&self) -> Vec<&MergedTestRecord> {
        self.iter().filter(|r| r.core_check.is_none()).collect()
    }

    pub fn failures(&self) -> Vec<&MergedTestRecord> {
        self.iter().filter(|r| r.status == AuditStatus::Failed).collect()
    }
}

/// Builds the merged map from automated records first, then lets every
/// manual record overwrite the automated one with the same id.
pub fn merge(automated: &[MergedTestRecord], manual: &[MergedTestRecord]) -> MergedResults {
    let mut records: BTreeMap<String, MergedTestRecord> = BTreeMap::new();
    for record in automated {
        records.insert(record.id.clone(), record.clone());
    }
    let automated_count = records.len();

    let mut manual_ids = BTreeSet::new();
    let mut overlap_count = 0;
    for record in manual {
        if !manual_ids.insert(record.id.clone()) {
            records.insert(record.id.clone(), record.clone());
            continue;
        }
        if records.insert(record.id.clone(), record.clone()).is_some() {
            overlap_count += 1;
        }
    }

    MergedResults {
        records,
        automated_count,
        manual_count: manual_ids.len(),
        overlap_count,
    }
}

pub fn merge_results(automated: &[AuditResult], manual: &[MergedTestRecord]) -> MergedResults {
    let automated: Vec<MergedTestRecord> = automated.iter().map(MergedTestRecord::from_result).collect();
    merge(&automated, manual)
}
