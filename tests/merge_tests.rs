use airlink_audit::merge::{load_results, parse_results};
use airlink_audit::{
    classify, merge, merge_results, AuditResult, AuditStatus, AuditTestCase, CoreCheck, MergedTestRecord, SourceType,
    TestType,
};
use chrono::{Duration, Utc};

fn record(id: &str, status: AuditStatus, source: SourceType) -> MergedTestRecord {
    MergedTestRecord::new(id, id, status, source)
}

#[test]
fn test_manual_result_overrides_automated() {
    let automated = vec![
        record("qr_scan", AuditStatus::Failed, SourceType::Automated),
        record("discovery_lan", AuditStatus::Passed, SourceType::Automated),
    ];
    let manual = vec![record("qr_scan", AuditStatus::Passed, SourceType::Manual)];

    let merged = merge(&automated, &manual);
    let qr = merged.get("qr_scan").unwrap();
    assert_eq!(qr.status, AuditStatus::Passed);
    assert_eq!(qr.source, SourceType::Manual);
    assert_eq!(merged.get("discovery_lan").unwrap().source, SourceType::Automated);
}

#[test]
fn test_total_counts_overlap_once() {
    let automated = vec![
        record("a1", AuditStatus::Passed, SourceType::Automated),
        record("a2", AuditStatus::Passed, SourceType::Automated),
        record("shared", AuditStatus::Failed, SourceType::Automated),
    ];
    let manual = vec![
        record("shared", AuditStatus::Passed, SourceType::Manual),
        record("m1", AuditStatus::Skipped, SourceType::Manual),
    ];

    let merged = merge(&automated, &manual);
    assert_eq!(merged.automated_count, 3);
    assert_eq!(merged.manual_count, 2);
    assert_eq!(merged.overlap_count, 1);
    assert_eq!(merged.total_tests(), 3 + 2 - 1);
    assert_eq!(merged.passed(), 3);
    assert_eq!(merged.skipped(), 1);
}

#[test]
fn test_pass_rate_edges() {
    let one = merge(&[record("t1", AuditStatus::Passed, SourceType::Automated)], &[]);
    assert_eq!(one.pass_rate(), 100.0);

    let none = merge(&[], &[]);
    assert_eq!(none.total_tests(), 0);
    assert_eq!(none.pass_rate(), 0.0);

    let third = merge(
        &[
            record("t1", AuditStatus::Passed, SourceType::Automated),
            record("t2", AuditStatus::Failed, SourceType::Automated),
            record("t3", AuditStatus::Skipped, SourceType::Automated),
        ],
        &[],
    );
    assert_eq!(third.pass_rate(), 33.3);
}

#[test]
fn test_checksum_outranks_qr_everywhere() {
    assert_eq!(classify("qr_checksum_verify", "", ""), Some(CoreCheck::ChecksumVerification));
    assert_eq!(classify("t9", "QR code payload checksum", ""), Some(CoreCheck::ChecksumVerification));
    assert_eq!(classify("t9", "QR scan", "checksum"), Some(CoreCheck::ChecksumVerification));
    assert_eq!(classify("t9", "QR scan", ""), Some(CoreCheck::QrPairing));

    let record = MergedTestRecord::new("qr_checksum", "QR checksum", AuditStatus::Passed, SourceType::Manual);
    assert_eq!(record.core_check, Some(CoreCheck::ChecksumVerification));
}

#[test]
fn test_short_keywords_match_whole_tokens() {
    assert_eq!(classify("build_guide", "", ""), None);
    assert_eq!(classify("main_ui_flow", "", ""), Some(CoreCheck::UiUx));
    assert_eq!(classify("t1", "Wi-Fi Aware session setup", ""), Some(CoreCheck::WifiAwareSession));
    assert_eq!(classify("default_theme", "Default theme applied", ""), None);
    assert_eq!(classify("fault_recovery", "", ""), Some(CoreCheck::ErrorHandling));
}

#[test]
fn test_core_check_summaries_cover_all_checks() {
    let merged = merge(
        &[
            record("discovery_scan", AuditStatus::Passed, SourceType::Automated),
            record("discovery_timeout", AuditStatus::Failed, SourceType::Automated),
            record("misc", AuditStatus::Passed, SourceType::Automated),
        ],
        &[],
    );

    let summaries = merged.by_core_check();
    assert_eq!(summaries.len(), 11);

    let discovery = &summaries[&CoreCheck::Discovery];
    assert_eq!(discovery.total, 2);
    assert_eq!(discovery.status(), AuditStatus::Failed);
    assert_eq!(summaries[&CoreCheck::Performance].status(), AuditStatus::Skipped);
    assert_eq!(merged.unclassified().len(), 1);
}

#[test]
fn test_merge_automated_audit_results() {
    let case = AuditTestCase::new("checksum_01", "Checksum of 10 MB file", TestType::ChecksumVerification);
    let start = Utc::now();
    let result = AuditResult::new(case, AuditStatus::Passed, start, start + Duration::milliseconds(250));

    let manual = vec![record("ui_dark_mode", AuditStatus::Passed, SourceType::Manual)];
    let merged = merge_results(&[result], &manual);

    let automated = merged.get("checksum_01").unwrap();
    assert_eq!(automated.duration_ms, 250);
    assert_eq!(automated.core_check, Some(CoreCheck::ChecksumVerification));
    assert_eq!(merged.total_tests(), 2);
}

#[test]
fn test_manual_file_parses_into_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manual_results.json");
    std::fs::write(
        &path,
        r#"{"tests": [
            {"testId": "settings_persist", "testName": "Settings survive restart", "passed": true},
            {"testId": "perf_throughput", "status": "partial", "duration": 5400}
        ]}"#,
    )
    .unwrap();

    let parsed = load_results(&path, SourceType::Manual);
    assert!(!parsed.is_error());
    let records = parsed.into_data().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].core_check, Some(CoreCheck::SettingsPersistence));
    assert_eq!(records[1].status, AuditStatus::Partial);
    assert_eq!(records[1].duration_ms, 5400);
}

#[test]
fn test_malformed_manual_results_become_error_marker() {
    let parsed = parse_results("{\"tests\": [", SourceType::Manual);
    assert!(parsed.is_error());
    assert!(parsed.data().is_none());

    let json = serde_json::to_value(&parsed).unwrap();
    assert!(json.get("error").and_then(|e| e.as_str()).is_some());

    let missing_id = parse_results(r#"{"tests": [{"passed": true}]}"#, SourceType::Manual);
    assert!(missing_id.error_message().unwrap().contains("no test id"));

    let unreadable = load_results("/definitely/not/here.json", SourceType::Manual);
    assert!(unreadable.is_error());
}
