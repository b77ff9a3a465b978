pub mod error;
pub mod config;
pub mod logging;
pub mod transfer;
pub mod checksum;
pub mod audit;
pub mod merge;
pub mod evidence;
pub mod report;
pub mod orchestrator;

pub use error::{AuditError, Result};
pub use config::{AuditConfig, DeviceInfo};
pub use logging::{AuditLog, LogLevel, MemoryLog, TracingLog, init_tracing};
pub use transfer::{TransferSessions, TransferState, TransferStatus};
pub use checksum::{CancelFlag, ChecksumOutcome, ChecksumVerificationService, ChunkDigest, VerifyOutcome, sha256_hex};
pub use audit::{
    AuditResult, AuditStatus, AuditSummaryReport, AuditTestCase, AuditTestRunner, Collaborators, DiscoveryRepository,
    Platform, SettingsStore, TestType, TransferService, UiDriver,
};
pub use merge::{
    CoreCheck, CoreCheckSummary, MergedResults, MergedTestRecord, ParsedSection, SourceType, classify, merge,
    merge_results,
};
pub use evidence::{EvidenceCategory, EvidenceIndex, EvidenceIndexer, EvidenceItem};
pub use report::{BenchmarkSummary, CoreCheckTableRow, CoverageReport, Placeholder, ReportData, ReportFiles, ReportGenerator, ReportInput};
pub use orchestrator::{
    AuditPhase, ConsolidatedAuditOrchestrator, ConsolidatedAuditResult, EnvironmentValidation, OrchestratorOptions,
    ProgressBus, ProgressEvent,
};
