use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use chrono::Utc;
use tokio::task::JoinSet;
use crate::checksum::{CancelFlag, ChecksumOutcome, ChecksumVerificationService, VerifyOutcome};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::logging::{default_log, AuditLog};
use crate::transfer::{TransferSessions, TransferState};
use super::collaborators::{
    DiscoveryRepository, SettingsStore, TransferReport, TransferRequest, TransferService, UiDriver,
};
use super::types::{AuditResult, AuditStatus, AuditTestCase, TestType};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_PAYLOAD_BYTES: u64 = 64 * 1024;

#[derive(Clone, Default)]
pub struct Collaborators {
    pub discovery: Option<Arc<dyn DiscoveryRepository>>,
    pub transfer: Option<Arc<dyn TransferService>>,
    pub settings: Option<Arc<dyn SettingsStore>>,
    pub ui: Option<Arc<dyn UiDriver>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn DiscoveryRepository>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_transfer(mut self, transfer: Arc<dyn TransferService>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiDriver>) -> Self {
        self.ui = Some(ui);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Finished(AuditStatus),
}

#[derive(Debug, Clone)]
struct CheckOutcome {
    status: AuditStatus,
    metrics: BTreeMap<String, f64>,
    evidence: BTreeMap<String, String>,
    notes: Option<String>,
}

impl CheckOutcome {
    fn passed() -> Self {
        Self {
            status: AuditStatus::Passed,
            metrics: BTreeMap::new(),
            evidence: BTreeMap::new(),
            notes: None,
        }
    }

    fn failed(notes: impl Into<String>) -> Self {
        Self {
            status: AuditStatus::Failed,
            notes: Some(notes.into()),
            ..Self::passed()
        }
    }

    fn partial(notes: impl Into<String>) -> Self {
        Self {
            status: AuditStatus::Partial,
            notes: Some(notes.into()),
            ..Self::passed()
        }
    }

    fn metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    fn evidence(mut self, key: &str, value: impl Into<String>) -> Self {
        self.evidence.insert(key.to_string(), value.into());
        self
    }
}

struct Payload {
    path: PathBuf,
    size: u64,
    digest: String,
}

struct VerifiedTransfer {
    report: TransferReport,
    verify: VerifyOutcome,
}

/// Runs one audit test case against the injected collaborators and always
/// hands back an `AuditResult`.
#[derive(Clone)]
pub struct AuditTestRunner {
    config: AuditConfig,
    collaborators: Collaborators,
    checksum: ChecksumVerificationService,
    sessions: Arc<TransferSessions>,
    log: Arc<dyn AuditLog>,
    work_dir: PathBuf,
    states: Arc<Mutex<HashMap<String, RunState>>>,
    /// Per-run signal for in-flight file work; set when the run times out.
    cancel: CancelFlag,
}

impl AuditTestRunner {
    pub fn new(config: AuditConfig, collaborators: Collaborators) -> Self {
        let work_dir = config.output_dir.join("payloads");
        Self {
            checksum: ChecksumVerificationService::new(config.chunk_size),
            config,
            collaborators,
            sessions: Arc::new(TransferSessions::new()),
            log: default_log(),
            work_dir,
            states: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn AuditLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<TransferSessions>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> Arc<TransferSessions> {
        Arc::clone(&self.sessions)
    }

    pub fn state_of(&self, test_id: &str) -> RunState {
        self.states
            .lock()
            .ok()
            .and_then(|s| s.get(test_id).copied())
            .unwrap_or(RunState::NotStarted)
    }

    /// Returns why a case cannot run with the current collaborators, if so.
    pub fn missing_requirement(&self, case: &AuditTestCase) -> Option<&'static str> {
        let c = &self.collaborators;
        match case.test_type {
            TestType::Discovery | TestType::WifiAware | TestType::QrPairing if c.discovery.is_none() => {
                Some("no discovery repository configured")
            }
            TestType::SettingsPersistence if c.settings.is_none() => Some("no settings store configured"),
            TestType::UiUx if c.ui.is_none() => Some("no UI driver configured"),
            t if (t.moves_file() || t == TestType::ErrorHandling) && c.transfer.is_none() => {
                Some("no transfer service configured")
            }
            _ => None,
        }
    }

    pub fn can_run(&self, case: &AuditTestCase) -> bool {
        self.missing_requirement(case).is_none()
    }

    pub async fn run(&self, case: AuditTestCase) -> AuditResult {
        let started_at = Utc::now();
        self.set_state(&case.id, RunState::Running);
        self.log.info(&format!("Running {} ({})", case.id, case.test_type));

        let timeout_secs = self.config.test_timeout_secs;
        let cancel = CancelFlag::new();
        let mut runner = self.clone();
        runner.cancel = cancel.clone();
        let task_case = case.clone();
        let mut handle = tokio::spawn(async move { runner.execute(&task_case).await });

        let outcome = match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut handle).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => CheckOutcome::failed(e.to_string()),
            Ok(Err(join_err)) => CheckOutcome::failed(format!("check aborted: {}", join_err)),
            Err(_) => {
                cancel.cancel();
                handle.abort();
                CheckOutcome::failed(format!("timed out after {}s", timeout_secs))
            }
        };

        let status = match outcome.status {
            AuditStatus::Skipped => AuditStatus::Failed,
            s => s,
        };

        match status {
            AuditStatus::Passed => self.log.info(&format!("{} passed", case.id)),
            _ => self.log.warn(&format!(
                "{} {}: {}",
                case.id,
                status,
                outcome.notes.as_deref().unwrap_or("no details")
            )),
        }
        self.set_state(&case.id, RunState::Finished(status));

        let mut result = AuditResult::new(case, status, started_at, Utc::now());
        result.metrics = outcome.metrics;
        result.evidence = outcome.evidence;
        result.notes = outcome.notes;
        result
    }

    async fn execute(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        match case.test_type {
            TestType::Discovery => self.check_discovery().await,
            TestType::WifiAware => self.check_wifi_aware(case).await,
            TestType::SimultaneousTransfer => self.check_simultaneous(case).await,
            TestType::MultiReceiver => self.check_multi_receiver(case).await,
            TestType::CrossPlatform => self.check_cross_platform(case).await,
            TestType::ChecksumVerification => self.check_checksum(case).await,
            TestType::UiUx => self.check_ui(case).await,
            TestType::QrPairing => self.check_qr_pairing(case).await,
            TestType::SettingsPersistence => self.check_settings(case).await,
            TestType::ErrorHandling => self.check_error_handling(case).await,
            TestType::Performance => self.check_performance(case).await,
        }
    }

    async fn check_discovery(&self) -> Result<CheckOutcome> {
        let discovery = self.discovery()?;
        let start = Instant::now();
        let peers = discovery.discover(DISCOVERY_TIMEOUT).await?;
        let elapsed = start.elapsed().as_millis() as f64;

        let outcome = if peers.is_empty() {
            CheckOutcome::failed("no peers discovered")
        } else {
            CheckOutcome::passed()
        };
        let ids: Vec<&str> = peers.iter().map(|p| p.device_id.as_str()).collect();
        Ok(outcome
            .metric("peers_found", peers.len() as f64)
            .metric("discovery_ms", elapsed)
            .evidence("peers", ids.join(",")))
    }

    async fn check_wifi_aware(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let discovery = self.discovery()?;
        let peer = self.resolve_peers(case, 1).await?.remove(0);
        let info = discovery.connect(&peer, "wifi_aware").await?;

        let outcome = if info.session_id.is_empty() {
            CheckOutcome::failed(format!("no session established with {}", peer))
        } else {
            CheckOutcome::passed()
        };
        Ok(outcome
            .metric("setup_ms", info.setup_ms as f64)
            .evidence("session_id", info.session_id)
            .evidence("peer_id", info.peer_id))
    }

    async fn check_qr_pairing(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let discovery = self.discovery()?;
        let code = format!("airlink-pair:{}", case.id);
        let peer = discovery.pair_with_code(&code).await?;

        let outcome = match case.target_peers.first() {
            _ if peer.is_empty() => CheckOutcome::failed("pairing code resolved to no peer"),
            Some(expected) if expected != &peer => {
                CheckOutcome::failed(format!("paired with {} but expected {}", peer, expected))
            }
            _ => CheckOutcome::passed(),
        };
        Ok(outcome.evidence("paired_peer", peer).evidence("pairing_code", code))
    }

    async fn check_settings(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let settings = self
            .collaborators
            .settings
            .as_ref()
            .ok_or_else(|| AuditError::Collaborator("no settings store configured".to_string()))?;

        let key = format!("audit.{}", case.id);
        let value = uuid::Uuid::new_v4().to_string();
        settings.write(&key, &value).await?;
        settings.reload().await?;
        let read_back = settings.read(&key).await?;

        Ok(match read_back {
            Some(v) if v == value => CheckOutcome::passed(),
            Some(v) => CheckOutcome::failed(format!("{} read back as {:?}, expected {:?}", key, v, value)),
            None => CheckOutcome::failed(format!("{} missing after reload", key)),
        }
        .evidence("key", key))
    }

    async fn check_ui(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let ui = self
            .collaborators
            .ui
            .as_ref()
            .ok_or_else(|| AuditError::Collaborator("no UI driver configured".to_string()))?;

        let report = ui.run_flow(&case.id).await?;
        let mut outcome = if report.passed {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed(report.details.clone())
        }
        .metric("screens_checked", report.screens_checked as f64)
        .evidence("details", report.details);

        if let Some(shot) = report.screenshot {
            outcome = outcome.evidence("screenshot", shot.display().to_string());
        }
        Ok(outcome)
    }

    async fn check_simultaneous(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let transfer = Arc::clone(self.transfer()?);
        let peer = self.resolve_peers(case, 1).await?.remove(0);
        let payload = self.prepare_payload(case).await?;
        let recv_id = format!("{}-recv-{}", case.id, uuid::Uuid::new_v4());

        let (sent, received) = tokio::join!(
            self.transfer_verified(case, &payload, &peer),
            transfer.receive_file(&peer, &recv_id),
        );

        let send_ok = matches!(&sent, Ok(v) if v.verify.is_valid());
        if let Ok(report) = &received {
            self.record_inbound(case, &peer, report).await;
        }
        let recv_ok = matches!(&received, Ok(r) if r.bytes_transferred == r.total_bytes);

        let outcome = match (send_ok, recv_ok) {
            (true, true) => CheckOutcome::passed(),
            (true, false) => CheckOutcome::partial(format!("receive failed: {}", describe(&received))),
            (false, true) => CheckOutcome::partial(format!("send failed: {}", describe_verified(&sent))),
            (false, false) => CheckOutcome::failed(format!(
                "send failed: {}; receive failed: {}",
                describe_verified(&sent),
                describe(&received)
            )),
        };
        Ok(outcome
            .metric("send_ok", send_ok as u8 as f64)
            .metric("receive_ok", recv_ok as u8 as f64)
            .evidence("source_sha256", payload.digest))
    }

    async fn check_multi_receiver(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        self.transfer()?;
        let peers = self.resolve_peers(case, 2).await?;
        let payload = Arc::new(self.prepare_payload(case).await?);

        let mut tasks = JoinSet::new();
        for peer in peers.clone() {
            let runner = self.clone();
            let case = case.clone();
            let payload = Arc::clone(&payload);
            tasks.spawn(async move {
                let result = runner.transfer_verified(&case, &payload, &peer).await;
                (peer, result)
            });
        }

        let mut delivered = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, Ok(v))) if v.verify.is_valid() => delivered.push(peer),
                Ok((peer, Ok(v))) => failures.push(format!("{}: {}", peer, v.verify.as_str())),
                Ok((peer, Err(e))) => failures.push(format!("{}: {}", peer, e)),
                Err(e) => failures.push(format!("task aborted: {}", e)),
            }
        }
        delivered.sort();
        failures.sort();

        let outcome = if failures.is_empty() {
            CheckOutcome::passed()
        } else if delivered.is_empty() {
            CheckOutcome::failed(failures.join("; "))
        } else {
            CheckOutcome::partial(failures.join("; "))
        };
        Ok(outcome
            .metric("receivers", peers.len() as f64)
            .metric("delivered", delivered.len() as f64)
            .evidence("delivered_to", delivered.join(",")))
    }

    async fn check_cross_platform(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let peer = self.resolve_peers(case, 1).await?.remove(0);
        let payload = self.prepare_payload(case).await?;
        let verified = self.transfer_verified(case, &payload, &peer).await?;

        let route = format!("{} -> {}", case.sender_platform.as_str(), case.receiver_platform.as_str());
        let outcome = if verified.verify.is_valid() {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed(format!("{} transfer not verified: {}", route, verified.verify.as_str()))
        };
        Ok(outcome
            .metric("bytes", verified.report.bytes_transferred as f64)
            .evidence("route", route))
    }

    async fn check_checksum(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let peer = self.resolve_peers(case, 1).await?.remove(0);
        let payload = self.prepare_payload(case).await?;
        let verified = self.transfer_verified(case, &payload, &peer).await?;

        let outcome = match &verified.verify {
            VerifyOutcome::Valid => CheckOutcome::passed(),
            VerifyOutcome::Mismatch { actual, .. } => {
                CheckOutcome::failed(format!("checksum mismatch: received {}", actual))
            }
            VerifyOutcome::Missing => CheckOutcome::failed("received file missing"),
            VerifyOutcome::Unreadable { reason } => {
                CheckOutcome::failed(format!("received file unreadable: {}", reason))
            }
            VerifyOutcome::Cancelled => CheckOutcome::failed("verification cancelled"),
        };
        Ok(outcome
            .metric("bytes", payload.size as f64)
            .evidence("source_sha256", payload.digest)
            .evidence("verification", verified.verify.as_str()))
    }

    async fn check_performance(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let peer = self.resolve_peers(case, 1).await?.remove(0);
        let payload = self.prepare_payload(case).await?;
        let verified = self.transfer_verified(case, &payload, &peer).await?;
        let throughput = verified.report.throughput_mbps();
        let minimum = self.config.min_throughput_mbps;

        let outcome = if !verified.verify.is_valid() {
            CheckOutcome::failed(format!("transfer not verified: {}", verified.verify.as_str()))
        } else if throughput < minimum {
            CheckOutcome::failed(format!("throughput {:.2} MB/s below {:.2} MB/s", throughput, minimum))
        } else {
            CheckOutcome::passed()
        };
        Ok(outcome
            .metric("throughput_mbps", throughput)
            .metric("duration_ms", verified.report.duration_ms as f64)
            .metric("bytes", verified.report.bytes_transferred as f64))
    }

    async fn check_error_handling(&self, case: &AuditTestCase) -> Result<CheckOutcome> {
        let transfer = self.transfer()?;
        let peer = case.target_peers.first().cloned().unwrap_or_else(|| "unreachable-peer".to_string());
        let missing = self.work_dir.join(format!("missing_{}.bin", case.id));

        let request = TransferRequest {
            transfer_id: uuid::Uuid::new_v4().to_string(),
            source: missing.clone(),
            peer_id: peer,
            connection_method: case.connection_method.clone(),
        };

        Ok(match transfer.send_file(request).await {
            Err(e) => CheckOutcome::passed().evidence("rejection", e.to_string()),
            Ok(report) => CheckOutcome::failed(format!(
                "transfer of missing {} reported success ({} bytes)",
                missing.display(),
                report.bytes_transferred
            )),
        })
    }

    fn discovery(&self) -> Result<&Arc<dyn DiscoveryRepository>> {
        self.collaborators
            .discovery
            .as_ref()
            .ok_or_else(|| AuditError::Collaborator("no discovery repository configured".to_string()))
    }

    fn transfer(&self) -> Result<&Arc<dyn TransferService>> {
        self.collaborators
            .transfer
            .as_ref()
            .ok_or_else(|| AuditError::Collaborator("no transfer service configured".to_string()))
    }

    async fn resolve_peers(&self, case: &AuditTestCase, min: usize) -> Result<Vec<String>> {
        let peers = if case.target_peers.len() >= min {
            case.target_peers.clone()
        } else if let Some(discovery) = &self.collaborators.discovery {
            discovery
                .discover(DISCOVERY_TIMEOUT)
                .await?
                .into_iter()
                .map(|p| p.device_id)
                .collect()
        } else {
            case.target_peers.clone()
        };

        if peers.len() < min {
            return Err(AuditError::Collaborator(format!(
                "{} needs {} peer(s), found {}",
                case.id,
                min,
                peers.len()
            )));
        }
        Ok(peers)
    }

    async fn prepare_payload(&self, case: &AuditTestCase) -> Result<Payload> {
        let (ext, size) = case
            .file
            .as_ref()
            .map(|f| (f.file_type.as_str(), f.size_bytes))
            .unwrap_or(("bin", DEFAULT_PAYLOAD_BYTES));

        fs::create_dir_all(&self.work_dir)?;
        let path = self.work_dir.join(format!("{}.{}", case.id, ext));
        let seed = case.id.len() as u64;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_payload(&target, size, seed))
            .await
            .map_err(|e| AuditError::Collaborator(format!("payload writer aborted: {}", e)))??;

        let digest = match self.checksum.compute_checksum_async(path.clone(), self.cancel.clone()).await {
            ChecksumOutcome::Digest(d) => d,
            other => {
                return Err(AuditError::Collaborator(format!(
                    "could not hash payload {}: {:?}",
                    path.display(),
                    other
                )))
            }
        };
        Ok(Payload { path, size, digest })
    }

    async fn transfer_verified(&self, case: &AuditTestCase, payload: &Payload, peer: &str) -> Result<VerifiedTransfer> {
        let transfer = self.transfer()?;
        let state = TransferState::new(
            payload.path.display().to_string(),
            payload.size,
            peer,
            case.connection_method.clone(),
        );
        let transfer_id = state.transfer_id.clone();
        self.sessions.insert(state).await?;
        self.sessions.update(&transfer_id, |s| s.start()).await?;

        let request = TransferRequest {
            transfer_id: transfer_id.clone(),
            source: payload.path.clone(),
            peer_id: peer.to_string(),
            connection_method: case.connection_method.clone(),
        };

        let report = match transfer.send_file(request).await {
            Ok(report) => report,
            Err(e) => {
                let reason = e.to_string();
                if let Err(update_err) = self.sessions.update(&transfer_id, |s| s.fail(reason, true)).await {
                    self.log.warn(&format!("Could not mark transfer {} failed: {}", transfer_id, update_err));
                }
                return Err(e);
            }
        };

        let sent = report.bytes_transferred.min(payload.size);
        self.sessions
            .update(&transfer_id, |s| {
                s.record_progress(sent)?;
                if sent == s.total_bytes {
                    s.complete()
                } else {
                    s.fail(format!("short transfer: {}/{} bytes", sent, s.total_bytes), true)
                }
            })
            .await?;

        let verify = match &report.received_path {
            Some(received) => {
                self.checksum
                    .verify_detailed_async(received.clone(), &payload.digest, self.cancel.clone())
                    .await
            }
            None => VerifyOutcome::Missing,
        };
        Ok(VerifiedTransfer { report, verify })
    }

    async fn record_inbound(&self, case: &AuditTestCase, peer: &str, report: &TransferReport) {
        let path = report
            .received_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let state = TransferState::with_id(
            report.transfer_id.clone(),
            path,
            report.total_bytes,
            peer,
            case.connection_method.clone(),
        );
        if let Err(e) = self.sessions.insert(state).await {
            self.log.warn(&format!("Inbound transfer {} not recorded: {}", report.transfer_id, e));
            return;
        }
        let bytes = report.bytes_transferred.min(report.total_bytes);
        let recorded = self
            .sessions
            .update(&report.transfer_id, |s| {
                s.start()?;
                s.record_progress(bytes)?;
                if bytes == s.total_bytes {
                    s.complete()
                } else {
                    s.fail("short inbound transfer", true)
                }
            })
            .await;
        if let Err(e) = recorded {
            self.log.warn(&format!("Inbound transfer {} not recorded: {}", report.transfer_id, e));
        }
    }

    fn set_state(&self, test_id: &str, state: RunState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(test_id.to_string(), state);
        }
    }
}

fn write_payload(path: &Path, size: u64, seed: u64) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut block = [0u8; 4096];
    let mut written: u64 = 0;
    while written < size {
        let n = ((size - written) as usize).min(block.len());
        for (i, byte) in block[..n].iter_mut().enumerate() {
            *byte = ((written + i as u64).wrapping_mul(31).wrapping_add(seed) % 251) as u8;
        }
        writer.write_all(&block[..n])?;
        written += n as u64;
    }
    writer.flush()?;
    Ok(())
}

fn describe(result: &Result<TransferReport>) -> String {
    match result {
        Ok(r) => format!("{}/{} bytes", r.bytes_transferred, r.total_bytes),
        Err(e) => e.to_string(),
    }
}

fn describe_verified(result: &Result<VerifiedTransfer>) -> String {
    match result {
        Ok(v) => format!("verification {}", v.verify.as_str()),
        Err(e) => e.to_string(),
    }
}
