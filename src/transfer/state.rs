use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::error::{AuditError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Pending,
    Transferring,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Transferring => "transferring",
            TransferStatus::Paused => "paused",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Unknown names map to `Pending` so that state written by a newer
    /// build still loads.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => TransferStatus::Pending,
            "transferring" => TransferStatus::Transferring,
            "paused" => TransferStatus::Paused,
            "completed" => TransferStatus::Completed,
            "failed" => TransferStatus::Failed,
            "cancelled" => TransferStatus::Cancelled,
            _ => TransferStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled)
    }

    fn allows(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Pending, Transferring)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Transferring, Paused)
                | (Transferring, Completed)
                | (Transferring, Failed)
                | (Transferring, Cancelled)
                | (Paused, Transferring)
                | (Paused, Failed)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransferStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransferStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TransferStatus::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferState {
    pub transfer_id: String,
    pub file_path: String,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    pub peer_device_id: String,
    pub connection_method: String,
    pub status: TransferStatus,
    pub error: Option<String>,
    pub can_retry: bool,
    pub created_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub supersedes: Option<String>,
    pub superseded_by: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TransferState {
    pub fn new(
        file_path: impl Into<String>,
        total_bytes: u64,
        peer_device_id: impl Into<String>,
        connection_method: impl Into<String>,
    ) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            file_path,
            total_bytes,
            peer_device_id,
            connection_method,
        )
    }

    pub fn with_id(
        transfer_id: impl Into<String>,
        file_path: impl Into<String>,
        total_bytes: u64,
        peer_device_id: impl Into<String>,
        connection_method: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            transfer_id: transfer_id.into(),
            file_path: file_path.into(),
            total_bytes,
            bytes_transferred: 0,
            peer_device_id: peer_device_id.into(),
            connection_method: connection_method.into(),
            status: TransferStatus::Pending,
            error: None,
            can_retry: false,
            created_at: now,
            paused_at: None,
            resumed_at: None,
            completed_at: None,
            last_updated: now,
            supersedes: None,
            superseded_by: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TransferStatus::Pending | TransferStatus::Transferring)
    }

    pub fn is_resumable(&self) -> bool {
        match self.status {
            TransferStatus::Paused => true,
            TransferStatus::Failed => self.can_retry,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let pct = self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.bytes_transferred)
    }

    pub fn elapsed(&self) -> Duration {
        self.completed_at.unwrap_or_else(Utc::now) - self.created_at
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(TransferStatus::Transferring)
    }

    pub fn record_progress(&mut self, bytes_transferred: u64) -> Result<()> {
        if self.status != TransferStatus::Transferring {
            return Err(AuditError::Progress(format!(
                "transfer {} is {}, not transferring",
                self.transfer_id, self.status
            )));
        }
        if bytes_transferred < self.bytes_transferred {
            return Err(AuditError::Progress(format!(
                "transfer {} progress went backwards ({} < {})",
                self.transfer_id, bytes_transferred, self.bytes_transferred
            )));
        }
        if bytes_transferred > self.total_bytes {
            return Err(AuditError::Progress(format!(
                "transfer {} progress {} exceeds total {}",
                self.transfer_id, bytes_transferred, self.total_bytes
            )));
        }
        self.bytes_transferred = bytes_transferred;
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(TransferStatus::Paused)?;
        self.paused_at = Some(self.last_updated);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.status != TransferStatus::Paused {
            return Err(AuditError::InvalidTransition {
                from: self.status,
                to: TransferStatus::Transferring,
            });
        }
        self.transition(TransferStatus::Transferring)?;
        self.resumed_at = Some(self.last_updated);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        if self.bytes_transferred != self.total_bytes {
            return Err(AuditError::Progress(format!(
                "transfer {} cannot complete at {}/{} bytes",
                self.transfer_id, self.bytes_transferred, self.total_bytes
            )));
        }
        self.transition(TransferStatus::Completed)?;
        self.completed_at = Some(self.last_updated);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, can_retry: bool) -> Result<()> {
        self.transition(TransferStatus::Failed)?;
        self.error = Some(error.into());
        self.can_retry = can_retry;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(TransferStatus::Cancelled)
    }

    /// Starts a fresh attempt for a retryable failure. The failed record is
    /// kept as history, linked forward to the new attempt and no longer
    /// retryable, so each failure has at most one successor.
    pub fn retry(&mut self) -> Result<TransferState> {
        if self.status != TransferStatus::Failed || !self.can_retry {
            return Err(AuditError::InvalidTransition {
                from: self.status,
                to: TransferStatus::Pending,
            });
        }

        let mut next = TransferState::new(
            self.file_path.clone(),
            self.total_bytes,
            self.peer_device_id.clone(),
            self.connection_method.clone(),
        );
        next.supersedes = Some(self.transfer_id.clone());
        next.metadata = self.metadata.clone();
        self.can_retry = false;
        self.superseded_by = Some(next.transfer_id.clone());
        self.last_updated = Utc::now();
        Ok(next)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn transition(&mut self, next: TransferStatus) -> Result<()> {
        if !self.status.allows(next) {
            return Err(AuditError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.last_updated = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transferring(total: u64) -> TransferState {
        let mut state = TransferState::with_id("t-1", "/tmp/a.bin", total, "peer-1", "wifi_aware");
        state.start().unwrap();
        state
    }

    #[test]
    fn test_new_state_is_pending_and_active() {
        let state = TransferState::new("/tmp/a.bin", 10, "peer", "ble");
        assert_eq!(state.status, TransferStatus::Pending);
        assert!(state.is_active());
        assert!(!state.is_resumable());
        assert_eq!(state.bytes_transferred, 0);
    }

    #[test]
    fn test_progress_percent_zero_total() {
        let mut state = TransferState::new("/tmp/empty", 0, "peer", "ble");
        assert_eq!(state.progress_percent(), 0.0);
        state.bytes_transferred = 500;
        assert_eq!(state.progress_percent(), 0.0);
    }

    #[test]
    fn test_progress_percent_clamped() {
        let mut state = transferring(200);
        state.record_progress(50).unwrap();
        assert_eq!(state.progress_percent(), 25.0);
        state.bytes_transferred = 400;
        assert_eq!(state.progress_percent(), 100.0);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut state = transferring(100);
        state.record_progress(60).unwrap();
        let err = state.record_progress(40).unwrap_err();
        assert!(err.to_string().contains("backwards"));
        assert_eq!(state.bytes_transferred, 60);
    }

    #[test]
    fn test_progress_rejects_overflow() {
        let mut state = transferring(100);
        assert!(state.record_progress(101).is_err());
        assert_eq!(state.bytes_transferred, 0);
    }

    #[test]
    fn test_progress_requires_transferring() {
        let mut state = TransferState::new("/tmp/a", 100, "peer", "ble");
        assert!(state.record_progress(10).is_err());
    }

    #[test]
    fn test_pause_resume_cycle() {
        let mut state = transferring(100);
        state.record_progress(30).unwrap();
        state.pause().unwrap();
        assert!(state.is_resumable());
        assert!(!state.is_active());
        assert!(state.paused_at.is_some());

        state.resume().unwrap();
        assert_eq!(state.status, TransferStatus::Transferring);
        assert!(state.resumed_at.is_some());
        assert_eq!(state.bytes_transferred, 30);
    }

    #[test]
    fn test_resume_requires_paused() {
        let mut state = TransferState::new("/tmp/a", 100, "peer", "ble");
        let err = state.resume().unwrap_err();
        assert!(matches!(err, AuditError::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_requires_all_bytes() {
        let mut state = transferring(100);
        state.record_progress(99).unwrap();
        assert!(state.complete().is_err());
        state.record_progress(100).unwrap();
        state.complete().unwrap();
        assert_eq!(state.status, TransferStatus::Completed);
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut state = transferring(10);
        state.record_progress(10).unwrap();
        state.complete().unwrap();

        assert!(state.pause().is_err());
        assert!(state.cancel().is_err());
        assert!(state.fail("late", true).is_err());
        assert!(state.record_progress(10).is_err());
        assert_eq!(state.status, TransferStatus::Completed);
    }

    #[test]
    fn test_retry_mints_new_attempt() {
        let mut state = transferring(100);
        state.record_progress(40).unwrap();
        state.fail("socket closed", true).unwrap();
        assert!(state.is_resumable());

        let next = state.retry().unwrap();
        assert_ne!(next.transfer_id, state.transfer_id);
        assert_eq!(next.supersedes.as_deref(), Some("t-1"));
        assert_eq!(next.status, TransferStatus::Pending);
        assert_eq!(next.bytes_transferred, 0);
        assert_eq!(state.status, TransferStatus::Failed);
        assert_eq!(state.bytes_transferred, 40);
        assert_eq!(state.superseded_by.as_deref(), Some(next.transfer_id.as_str()));
        assert!(!state.is_resumable());
        assert!(state.retry().is_err());
    }

    #[test]
    fn test_retry_refused_when_not_retryable() {
        let mut state = transferring(100);
        state.fail("disk full", false).unwrap();
        assert!(!state.is_resumable());
        assert!(state.retry().is_err());
    }

    #[test]
    fn test_cancel_from_paused() {
        let mut state = transferring(100);
        state.pause().unwrap();
        state.cancel().unwrap();
        assert_eq!(state.status, TransferStatus::Cancelled);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_json_roundtrip_with_nulls() {
        let state = TransferState::with_id("t-9", "/tmp/x", 5, "peer", "multipeer");
        let json = state.to_json().unwrap();
        assert!(json.contains("\"pausedAt\":null"));
        assert!(json.contains("\"status\":\"pending\""));
        let back = TransferState::from_json(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_unknown_status_falls_back_to_pending() {
        let state = TransferState::with_id("t-2", "/tmp/x", 5, "peer", "ble");
        let json = state.to_json().unwrap().replace("\"pending\"", "\"teleporting\"");
        let back = TransferState::from_json(&json).unwrap();
        assert_eq!(back.status, TransferStatus::Pending);
    }

    #[test]
    fn test_parse_lenient_case_insensitive() {
        assert_eq!(TransferStatus::parse_lenient("PAUSED"), TransferStatus::Paused);
        assert_eq!(TransferStatus::parse_lenient(""), TransferStatus::Pending);
    }
}
