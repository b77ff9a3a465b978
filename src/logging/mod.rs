use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log sink handed to components that record audit activity.
pub trait AuditLog: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl AuditLog for TracingLog {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "airlink_audit", "{}", message),
            LogLevel::Info => tracing::info!(target: "airlink_audit", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "airlink_audit", "{}", message),
            LogLevel::Error => tracing::error!(target: "airlink_audit", "{}", message),
        }
    }
}

/// Keeps every line in memory; handy for asserting on what a run logged.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.lines().iter().filter(|(l, _)| *l == level).count()
    }
}

impl AuditLog for MemoryLog {
    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

pub fn default_log() -> Arc<dyn AuditLog> {
    Arc::new(TracingLog)
}

pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("airlink_audit=debug,info")
    } else {
        EnvFilter::new("airlink_audit=info,warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
