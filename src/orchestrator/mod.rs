mod consolidated;
mod environment;
mod progress;

pub use consolidated::{ConsolidatedAuditOrchestrator, ConsolidatedAuditResult, OrchestratorOptions};
pub use environment::{check_output_dir, EnvironmentCheck, EnvironmentValidation};
pub use progress::{AuditPhase, ProgressBus, ProgressEvent};
