use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{AuditError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_PASS_THRESHOLD: f64 = 80.0;
pub const DEFAULT_PROGRESS_CAPACITY: usize = 64;
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MIN_THROUGHPUT_MBPS: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub app_build: Option<String>,
}

/// Process-wide settings handed to each component at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub app_name: String,
    pub app_version: String,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
    pub pass_threshold: f64,
    pub include_manual_tests: bool,
    pub progress_capacity: usize,
    pub test_timeout_secs: u64,
    pub min_throughput_mbps: f64,
    pub device_info: DeviceInfo,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            app_name: "AirLink".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            output_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            include_manual_tests: false,
            progress_capacity: DEFAULT_PROGRESS_CAPACITY,
            test_timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
            min_throughput_mbps: DEFAULT_MIN_THROUGHPUT_MBPS,
            device_info: DeviceInfo::default(),
        }
    }
}

impl AuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: AuditConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AuditError::Config("chunk_size must be greater than zero".to_string()));
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(AuditError::Config(format!(
                "pass_threshold must be within 0-100, got {}",
                self.pass_threshold
            )));
        }
        if self.progress_capacity == 0 {
            return Err(AuditError::Config("progress_capacity must be greater than zero".to_string()));
        }
        if self.test_timeout_secs == 0 {
            return Err(AuditError::Config("test_timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_manual_tests(mut self, include: bool) -> Self {
        self.include_manual_tests = include;
        self
    }

    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity;
        self
    }

    pub fn with_test_timeout(mut self, secs: u64) -> Self {
        self.test_timeout_secs = secs;
        self
    }

    pub fn with_min_throughput(mut self, mbps: f64) -> Self {
        self.min_throughput_mbps = mbps;
        self
    }

    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.device_info = info;
        self
    }
}
