mod collaborators;
mod runner;
mod types;

pub use collaborators::{
    ConnectionInfo, DiscoveredPeer, DiscoveryRepository, SettingsStore, TransferReport, TransferRequest,
    TransferService, UiCheckReport, UiDriver,
};
pub use runner::{AuditTestRunner, Collaborators, RunState};
pub use types::{
    pass_rate, AuditResult, AuditStatus, AuditSummaryReport, AuditTestCase, FileDescriptor, Platform, TestType,
    TypeTally,
};
