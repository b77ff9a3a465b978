use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::merge::CoreCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Discovery,
    WifiAware,
    SimultaneousTransfer,
    MultiReceiver,
    CrossPlatform,
    ChecksumVerification,
    UiUx,
    QrPairing,
    SettingsPersistence,
    ErrorHandling,
    Performance,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Discovery => "discovery",
            TestType::WifiAware => "wifi_aware",
            TestType::SimultaneousTransfer => "simultaneous_transfer",
            TestType::MultiReceiver => "multi_receiver",
            TestType::CrossPlatform => "cross_platform",
            TestType::ChecksumVerification => "checksum_verification",
            TestType::UiUx => "ui_ux",
            TestType::QrPairing => "qr_pairing",
            TestType::SettingsPersistence => "settings_persistence",
            TestType::ErrorHandling => "error_handling",
            TestType::Performance => "performance",
        }
    }

    pub fn core_check(&self) -> CoreCheck {
        match self {
            TestType::Discovery => CoreCheck::Discovery,
            TestType::WifiAware => CoreCheck::WifiAwareSession,
            TestType::SimultaneousTransfer => CoreCheck::SimultaneousTransfer,
            TestType::MultiReceiver => CoreCheck::MultiReceiver,
            TestType::CrossPlatform => CoreCheck::CrossPlatform,
            TestType::ChecksumVerification => CoreCheck::ChecksumVerification,
            TestType::UiUx => CoreCheck::UiUx,
            TestType::QrPairing => CoreCheck::QrPairing,
            TestType::SettingsPersistence => CoreCheck::SettingsPersistence,
            TestType::ErrorHandling => CoreCheck::ErrorHandling,
            TestType::Performance => CoreCheck::Performance,
        }
    }

    pub fn moves_file(&self) -> bool {
        matches!(
            self,
            TestType::SimultaneousTransfer
                | TestType::MultiReceiver
                | TestType::CrossPlatform
                | TestType::ChecksumVerification
                | TestType::Performance
        )
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
    Macos,
    Windows,
    Linux,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_type: String,
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(file_type: impl Into<String>, size_bytes: u64) -> Self {
        Self { file_type: file_type.into(), size_bytes }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTestCase {
    pub id: String,
    pub name: String,
    pub test_type: TestType,
    pub sender_platform: Platform,
    pub receiver_platform: Platform,
    pub file: Option<FileDescriptor>,
    pub connection_method: String,
    #[serde(default)]
    pub target_peers: Vec<String>,
}

impl AuditTestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, test_type: TestType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            test_type,
            sender_platform: Platform::Android,
            receiver_platform: Platform::Android,
            file: None,
            connection_method: "wifi_aware".to_string(),
            target_peers: Vec::new(),
        }
    }

    pub fn with_platforms(mut self, sender: Platform, receiver: Platform) -> Self {
        self.sender_platform = sender;
        self.receiver_platform = receiver;
        self
    }

    pub fn with_file(mut self, file_type: impl Into<String>, size_bytes: u64) -> Self {
        self.file = Some(FileDescriptor::new(file_type, size_bytes));
        self
    }

    pub fn with_connection_method(mut self, method: impl Into<String>) -> Self {
        self.connection_method = method.into();
        self
    }

    pub fn with_peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_peers = peers.into_iter().map(Into::into).collect();
        self
    }

    /// One case per core check, in core-check order.
    pub fn standard_suite() -> Vec<AuditTestCase> {
        vec![
            AuditTestCase::new("core_01_discovery", "Nearby device discovery", TestType::Discovery),
            AuditTestCase::new("core_02_wifi_aware", "Wi-Fi Aware session setup", TestType::WifiAware),
            AuditTestCase::new("core_03_simultaneous", "Simultaneous send and receive", TestType::SimultaneousTransfer)
                .with_file("bin", 256 * 1024),
            AuditTestCase::new("core_04_multi_receiver", "Send to multiple receivers", TestType::MultiReceiver)
                .with_file("bin", 128 * 1024),
            AuditTestCase::new("core_05_cross_platform", "Android to iOS transfer", TestType::CrossPlatform)
                .with_platforms(Platform::Android, Platform::Ios)
                .with_file("jpg", 512 * 1024),
            AuditTestCase::new("core_06_checksum", "SHA-256 round trip", TestType::ChecksumVerification)
                .with_file("bin", 1024 * 1024),
            AuditTestCase::new("core_07_ui", "Transfer screen flow", TestType::UiUx),
            AuditTestCase::new("core_08_qr_pairing", "QR code pairing", TestType::QrPairing)
                .with_connection_method("qr"),
            AuditTestCase::new("core_09_settings", "Settings survive restart", TestType::SettingsPersistence),
            AuditTestCase::new("core_10_error_handling", "Missing source file is rejected", TestType::ErrorHandling)
                .with_file("bin", 1024),
            AuditTestCase::new("core_11_performance", "Large file throughput", TestType::Performance)
                .with_file("bin", 8 * 1024 * 1024),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Passed,
    Failed,
    Skipped,
    Partial,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Passed => "passed",
            AuditStatus::Failed => "failed",
            AuditStatus::Skipped => "skipped",
            AuditStatus::Partial => "partial",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditStatus::Passed => "✅ PASSED",
            AuditStatus::Failed => "❌ FAILED",
            AuditStatus::Skipped => "⏭️ SKIPPED",
            AuditStatus::Partial => "⚠️ PARTIAL",
        }
    }

    /// Accepts the loose spellings found in hand-written result files.
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_lowercase();
        let stripped = lowered.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
        match stripped.trim() {
            "pass" | "passed" | "ok" | "success" | "true" => Some(AuditStatus::Passed),
            "fail" | "failed" | "failure" | "error" | "false" => Some(AuditStatus::Failed),
            "skip" | "skipped" | "n/a" | "not run" | "not_run" => Some(AuditStatus::Skipped),
            "partial" | "partially passed" | "warning" => Some(AuditStatus::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub test_case: AuditTestCase,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: AuditStatus,
    pub metrics: BTreeMap<String, f64>,
    pub evidence: BTreeMap<String, String>,
    pub notes: Option<String>,
}

impl AuditResult {
    pub fn new(test_case: AuditTestCase, status: AuditStatus, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            test_case,
            started_at,
            ended_at,
            status,
            metrics: BTreeMap::new(),
            evidence: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn skipped(test_case: AuditTestCase, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::new(test_case, AuditStatus::Skipped, now, now).with_notes(reason)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.test_case.id
    }

    pub fn duration_ms(&self) -> u64 {
        (self.ended_at - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn is_passed(&self) -> bool {
        self.status == AuditStatus::Passed
    }
}

/// Percentage rounded to one decimal; zero when there is nothing to divide.
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = passed as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummaryReport {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub partial_tests: usize,
    pub pass_rate: f64,
    pub total_duration_ms: u64,
    pub by_type: BTreeMap<TestType, TypeTally>,
    pub generated_at: DateTime<Utc>,
}

impl AuditSummaryReport {
    pub fn from_results(results: &[AuditResult]) -> Self {
        let count = |status: AuditStatus| results.iter().filter(|r| r.status == status).count();

        let mut by_type: BTreeMap<TestType, TypeTally> = BTreeMap::new();
        for result in results {
            let tally = by_type.entry(result.test_case.test_type).or_default();
            tally.total += 1;
            match result.status {
                AuditStatus::Passed => tally.passed += 1,
                AuditStatus::Failed => tally.failed += 1,
                _ => {}
            }
        }

        let passed = count(AuditStatus::Passed);
        Self {
            total_tests: results.len(),
            passed_tests: passed,
            failed_tests: count(AuditStatus::Failed),
            skipped_tests: count(AuditStatus::Skipped),
            partial_tests: count(AuditStatus::Partial),
            pass_rate: pass_rate(passed, results.len()),
            total_duration_ms: results.iter().map(|r| r.duration_ms()).sum(),
            by_type,
            generated_at: Utc::now(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total_tests > 0 && self.passed_tests == self.total_tests
    }
}
