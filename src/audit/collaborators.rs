use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use serde::Serialize;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPeer {
    pub device_id: String,
    pub display_name: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub session_id: String,
    pub peer_id: String,
    pub method: String,
    pub setup_ms: u64,
}

/// Access to the platform discovery transports (BLE, Wi-Fi Aware, Multipeer).
#[async_trait]
pub trait DiscoveryRepository: Send + Sync {
    async fn discover(&self, timeout: Duration) -> Result<Vec<DiscoveredPeer>>;

    async fn connect(&self, peer_id: &str, method: &str) -> Result<ConnectionInfo>;

    /// Resolves a scanned pairing payload to a peer id.
    async fn pair_with_code(&self, code: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRequest {
    pub transfer_id: String,
    pub source: PathBuf,
    pub peer_id: String,
    pub connection_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReport {
    pub transfer_id: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub received_path: Option<PathBuf>,
    pub duration_ms: u64,
}

impl TransferReport {
    pub fn throughput_mbps(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        let megabytes = self.bytes_transferred as f64 / (1024.0 * 1024.0);
        megabytes / (self.duration_ms as f64 / 1000.0)
    }
}

#[async_trait]
pub trait TransferService: Send + Sync {
    async fn send_file(&self, request: TransferRequest) -> Result<TransferReport>;

    /// Waits for an inbound file from `peer_id`; used for the receive half of
    /// a simultaneous transfer.
    async fn receive_file(&self, peer_id: &str, transfer_id: &str) -> Result<TransferReport>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    async fn read(&self, key: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiCheckReport {
    pub passed: bool,
    pub screens_checked: u32,
    pub details: String,
    pub screenshot: Option<PathBuf>,
}

#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn run_flow(&self, flow_id: &str) -> Result<UiCheckReport>;
}
