use std::fmt;
use std::sync::Mutex;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditPhase {
    EnvironmentValidation,
    AutomatedTests,
    ManualTests,
    ReportGeneration,
}

impl AuditPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditPhase::EnvironmentValidation => "environmentValidation",
            AuditPhase::AutomatedTests => "automatedTests",
            AuditPhase::ManualTests => "manualTests",
            AuditPhase::ReportGeneration => "reportGeneration",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AuditPhase::EnvironmentValidation => "Environment validation",
            AuditPhase::AutomatedTests => "Automated tests",
            AuditPhase::ManualTests => "Manual tests",
            AuditPhase::ReportGeneration => "Report generation",
        }
    }
}

impl fmt::Display for AuditPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: AuditPhase,
    pub percentage: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(phase: AuditPhase, percentage: f64, message: impl Into<String>) -> Self {
        Self {
            phase,
            percentage: percentage.clamp(0.0, 100.0),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Multi-subscriber progress channel. Events are delivered to whoever is
/// subscribed at publish time, with no replay. `close` drops the sender so
/// subscribers observe `RecvError::Closed` and later publishes are ignored.
pub struct ProgressBus {
    sender: Mutex<Option<broadcast::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        match self.sender.lock().ok().and_then(|s| s.as_ref().map(|tx| tx.subscribe())) {
            Some(rx) => rx,
            None => {
                let (_, rx) = broadcast::channel(self.capacity);
                rx
            }
        }
    }

    /// Returns how many subscribers received the event. Never blocks; zero
    /// subscribers is fine.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let Ok(guard) = self.sender.lock() else {
            return 0;
        };
        match guard.as_ref() {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }
}
