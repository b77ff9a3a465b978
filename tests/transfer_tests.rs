use airlink_audit::checksum::ChecksumOutcome;
use airlink_audit::{AuditError, CancelFlag, ChecksumVerificationService, TransferSessions, TransferState, TransferStatus};
use std::sync::Arc;

fn started(id: &str, total: u64) -> TransferState {
    let mut state = TransferState::with_id(id, format!("/data/{}.bin", id), total, "pixel-7", "wifi_aware");
    state.start().unwrap();
    state
}

#[test]
fn test_progress_never_decreases() {
    let mut state = started("t1", 1000);
    state.record_progress(400).unwrap();
    state.record_progress(400).unwrap();

    let err = state.record_progress(100).unwrap_err();
    assert!(matches!(err, AuditError::Progress(_)));
    assert_eq!(state.bytes_transferred, 400);

    assert!(state.record_progress(1001).is_err());
    assert_eq!(state.bytes_transferred, 400);
}

#[test]
fn test_progress_rejected_outside_transferring() {
    let mut state = TransferState::with_id("t1", "/data/a.bin", 10, "peer", "wifi_aware");
    assert!(state.record_progress(5).is_err());

    state.start().unwrap();
    state.pause().unwrap();
    assert!(state.record_progress(5).is_err());
    assert!(state.paused_at.is_some());
}

#[test]
fn test_progress_percent_with_zero_total() {
    let state = started("empty", 0);
    assert_eq!(state.progress_percent(), 0.0);

    let mut half = started("half", 200);
    half.record_progress(100).unwrap();
    assert!((half.progress_percent() - 50.0).abs() < f64::EPSILON);
}

#[test]
fn test_complete_requires_all_bytes() {
    let mut state = started("t1", 100);
    state.record_progress(99).unwrap();
    assert!(state.complete().is_err());
    assert_eq!(state.status, TransferStatus::Transferring);

    state.record_progress(100).unwrap();
    state.complete().unwrap();
    assert_eq!(state.status, TransferStatus::Completed);
    assert!(state.completed_at.is_some());
    assert!(state.is_terminal());
}

#[test]
fn test_terminal_states_reject_transitions() {
    let mut state = started("t1", 10);
    state.cancel().unwrap();

    let err = state.start().unwrap_err();
    assert!(matches!(
        err,
        AuditError::InvalidTransition { from: TransferStatus::Cancelled, to: TransferStatus::Transferring }
    ));
}

#[test]
fn test_json_round_trip_keeps_null_optionals() {
    let mut state = started("t1", 2048);
    state.record_progress(1024).unwrap();

    let json = state.to_json().unwrap();
    assert!(json.contains("\"pausedAt\":null"));
    assert!(json.contains("\"status\":\"transferring\""));

    let restored = TransferState::from_json(&json).unwrap();
    assert_eq!(restored, state);
    assert_eq!(restored.paused_at, None);
    assert_eq!(restored.error, None);
}

#[test]
fn test_unknown_status_loads_as_pending() {
    let state = started("t1", 10);
    let json = state.to_json().unwrap().replace("\"transferring\"", "\"teleporting\"");

    let restored = TransferState::from_json(&json).unwrap();
    assert_eq!(restored.status, TransferStatus::Pending);
}

#[test]
fn test_retry_supersedes_failed_attempt() {
    let mut state = started("t1", 10);
    state.fail("link lost", true).unwrap();
    assert!(state.is_resumable());

    let next = state.retry().unwrap();
    assert_ne!(next.transfer_id, state.transfer_id);
    assert_eq!(next.supersedes.as_deref(), Some("t1"));
    assert_eq!(next.status, TransferStatus::Pending);
    assert_eq!(next.bytes_transferred, 0);
    assert_eq!(next.file_path, state.file_path);
}

#[test]
fn test_retry_refused_when_not_retryable() {
    let mut state = started("t1", 10);
    state.fail("peer rejected", false).unwrap();
    assert!(state.retry().is_err());

    let mut pending = TransferState::with_id("t2", "/data/b.bin", 0, "peer", "wifi_aware");
    assert!(pending.retry().is_err());
}

#[tokio::test]
async fn test_sessions_isolate_concurrent_transfers() {
    let sessions = Arc::new(TransferSessions::new());
    for i in 0..8 {
        sessions.insert(started(&format!("t{}", i), 800)).await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let sessions = sessions.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("t{}", i);
            for step in 1..=8u64 {
                sessions.update(&id, |s| s.record_progress(step * 100)).await.unwrap();
            }
            sessions.update(&id, |s| s.complete()).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = sessions.snapshot().await;
    assert_eq!(all.len(), 8);
    assert!(all.iter().all(|s| s.status == TransferStatus::Completed && s.bytes_transferred == 800));
}

#[tokio::test]
async fn test_failed_update_leaves_session_unchanged() {
    let sessions = TransferSessions::new();
    sessions.insert(started("t1", 100)).await.unwrap();
    sessions.update("t1", |s| s.record_progress(60)).await.unwrap();

    let result = sessions
        .update("t1", |s| {
            s.record_progress(80)?;
            s.complete()
        })
        .await;
    assert!(result.is_err());

    let stored = sessions.get("t1").await.unwrap();
    assert_eq!(stored.bytes_transferred, 60);
    assert_eq!(stored.status, TransferStatus::Transferring);
}

#[tokio::test]
async fn test_sessions_retry_and_lookup() {
    let sessions = TransferSessions::new();
    sessions.insert(started("t1", 100)).await.unwrap();
    assert!(matches!(
        sessions.insert(started("t1", 100)).await,
        Err(AuditError::DuplicateTransfer(_))
    ));

    sessions.update("t1", |s| s.fail("timeout", true)).await.unwrap();
    let next_id = sessions.retry("t1").await.unwrap();

    assert_eq!(sessions.len().await, 2);
    let next = sessions.get(&next_id).await.unwrap();
    assert_eq!(next.supersedes.as_deref(), Some("t1"));
    assert_eq!(sessions.active().await.len(), 1);
    assert!(sessions.resumable().await.is_empty());

    assert!(sessions.retry("t1").await.is_err());
    assert_eq!(sessions.len().await, 2);
    assert_eq!(sessions.get("t1").await.unwrap().superseded_by, Some(next_id));

    assert!(matches!(sessions.retry("missing").await, Err(AuditError::TransferNotFound(_))));
}

#[test]
fn test_checksum_is_deterministic_and_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    let mut bytes: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&a, &bytes).unwrap();
    bytes[5_000] ^= 0x01;
    std::fs::write(&b, &bytes).unwrap();

    let service = ChecksumVerificationService::new(1024);
    let first = service.compute_checksum(&a);
    let second = service.compute_checksum(&a);
    assert_eq!(first, second);

    let digest = first.digest().unwrap().to_string();
    assert_eq!(digest.len(), 64);
    assert_ne!(service.compute_checksum(&b).digest().unwrap(), digest);

    assert!(service.verify(&a, &digest));
    assert!(service.verify(&a, &digest.to_uppercase()));
    assert!(!service.verify(&b, &digest));
}

#[test]
fn test_checksum_chunk_size_does_not_change_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin");
    std::fs::write(&path, vec![7u8; 5_000]).unwrap();

    let small = ChecksumVerificationService::new(64).compute_checksum(&path);
    let large = ChecksumVerificationService::new(1 << 20).compute_checksum(&path);
    assert_eq!(small, large);
}

#[test]
fn test_verify_missing_file_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let service = ChecksumVerificationService::new(1024);
    let path = dir.path().join("nope.bin");

    assert!(!service.verify(&path, "00"));
    assert_eq!(service.compute_checksum(&path), ChecksumOutcome::Missing);
    assert_eq!(service.verify_detailed(&path, "00").as_str(), "missing");
}

#[test]
fn test_cancelled_checksum_yields_no_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    std::fs::write(&path, vec![1u8; 4096]).unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let outcome = ChecksumVerificationService::new(512).compute_checksum_cancellable(&path, &cancel);
    assert_eq!(outcome, ChecksumOutcome::Cancelled);
    assert!(outcome.digest().is_none());
}

#[tokio::test]
async fn test_async_checksum_matches_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.bin");
    std::fs::write(&path, b"airlink payload").unwrap();

    let service = ChecksumVerificationService::new(4);
    let sync = service.compute_checksum(&path);
    let async_outcome = service.compute_checksum_async(path.clone(), CancelFlag::new()).await;
    assert_eq!(sync, async_outcome);
}

#[test]
fn test_chunk_digests_locate_first_difference() {
    let dir = tempfile::tempdir().unwrap();
    let sent = dir.path().join("sent.bin");
    let received = dir.path().join("received.bin");
    let mut bytes = vec![0u8; 1000];
    std::fs::write(&sent, &bytes).unwrap();
    bytes[650] = 9;
    std::fs::write(&received, &bytes[..900]).unwrap();

    let service = ChecksumVerificationService::new(256);
    let expected = service.compute_chunk_digests(&sent).unwrap();
    let actual = service.compute_chunk_digests(&received).unwrap();

    assert_eq!(expected.len(), 4);
    assert_eq!(expected[3].len, 232);
    assert_eq!(expected[2].offset, 512);
    assert_eq!(ChecksumVerificationService::first_mismatch(&expected, &actual), Some(2));
    assert_eq!(ChecksumVerificationService::first_mismatch(&expected, &expected), None);
    assert_eq!(ChecksumVerificationService::first_mismatch(&expected, &expected[..2]), Some(2));
}
