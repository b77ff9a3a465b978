use std::fmt;
use serde::{Serialize, Serializer};

/// The eleven compliance categories every result and evidence file is
/// reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoreCheck {
    Discovery,
    WifiAwareSession,
    SimultaneousTransfer,
    MultiReceiver,
    CrossPlatform,
    ChecksumVerification,
    UiUx,
    QrPairing,
    SettingsPersistence,
    ErrorHandling,
    Performance,
}

/// Ordered keyword cascade. The first rule with a matching keyword wins.
pub const CORE_CHECK_RULES: &[(CoreCheck, &[&str])] = &[
    (CoreCheck::Discovery, &["discovery", "discover"]),
    (CoreCheck::WifiAwareSession, &["wifi_aware", "wifiaware", "wi_fi_aware", "nan_session"]),
    (CoreCheck::SimultaneousTransfer, &["simultaneous", "concurrent_transfer", "bidirectional"]),
    (CoreCheck::MultiReceiver, &["multi_receiver", "multireceiver", "multi_device", "broadcast_send"]),
    (CoreCheck::CrossPlatform, &["cross_platform", "crossplatform", "interop"]),
    (CoreCheck::ChecksumVerification, &["checksum", "integrity", "sha256"]),
    (CoreCheck::UiUx, &["ui", "ux", "ui_ux", "user_interface", "accessibility"]),
    (CoreCheck::QrPairing, &["qr", "qr_pairing", "qr_code", "pairing"]),
    (CoreCheck::SettingsPersistence, &["settings", "persistence", "preferences"]),
    (CoreCheck::ErrorHandling, &["error", "failure_recovery", "fault", "faults"]),
    (CoreCheck::Performance, &["performance", "benchmark", "throughput"]),
];

/// Keywords at or below this length only match whole tokens.
const SHORT_KEYWORD_LEN: usize = 3;

/// Longer keywords that are common inside unrelated words (`default`).
const WHOLE_TOKEN_KEYWORDS: &[&str] = &["fault", "faults"];

impl CoreCheck {
    pub const ALL: [CoreCheck; 11] = [
        CoreCheck::Discovery,
        CoreCheck::WifiAwareSession,
        CoreCheck::SimultaneousTransfer,
        CoreCheck::MultiReceiver,
        CoreCheck::CrossPlatform,
        CoreCheck::ChecksumVerification,
        CoreCheck::UiUx,
        CoreCheck::QrPairing,
        CoreCheck::SettingsPersistence,
        CoreCheck::ErrorHandling,
        CoreCheck::Performance,
    ];

    pub fn number(&self) -> u8 {
        match self {
            CoreCheck::Discovery => 1,
            CoreCheck::WifiAwareSession => 2,
            CoreCheck::SimultaneousTransfer => 3,
            CoreCheck::MultiReceiver => 4,
            CoreCheck::CrossPlatform => 5,
            CoreCheck::ChecksumVerification => 6,
            CoreCheck::UiUx => 7,
            CoreCheck::QrPairing => 8,
            CoreCheck::SettingsPersistence => 9,
            CoreCheck::ErrorHandling => 10,
            CoreCheck::Performance => 11,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.number() == n)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoreCheck::Discovery => "Device Discovery",
            CoreCheck::WifiAwareSession => "Wi-Fi Aware Session",
            CoreCheck::SimultaneousTransfer => "Simultaneous Transfer",
            CoreCheck::MultiReceiver => "Multi-Receiver Transfer",
            CoreCheck::CrossPlatform => "Cross-Platform Transfer",
            CoreCheck::ChecksumVerification => "Checksum Verification",
            CoreCheck::UiUx => "UI/UX",
            CoreCheck::QrPairing => "QR Pairing",
            CoreCheck::SettingsPersistence => "Settings Persistence",
            CoreCheck::ErrorHandling => "Error Handling",
            CoreCheck::Performance => "Performance",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            CoreCheck::Discovery => "discovery",
            CoreCheck::WifiAwareSession => "wifi_aware",
            CoreCheck::SimultaneousTransfer => "simultaneous",
            CoreCheck::MultiReceiver => "multi_receiver",
            CoreCheck::CrossPlatform => "cross_platform",
            CoreCheck::ChecksumVerification => "checksum",
            CoreCheck::UiUx => "ui",
            CoreCheck::QrPairing => "qr_pairing",
            CoreCheck::SettingsPersistence => "settings",
            CoreCheck::ErrorHandling => "error",
            CoreCheck::Performance => "performance",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        CORE_CHECK_RULES
            .iter()
            .find(|(check, _)| check == self)
            .map(|(_, kws)| *kws)
            .unwrap_or(&[])
    }
}

impl fmt::Display for CoreCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Core Check {}: {}", self.number(), self.name())
    }
}

impl Serialize for CoreCheck {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.number())
    }
}

/// Lowercases and folds separators to `_`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '-' | ' ' | '/' | '\\' | '.' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn keyword_matches(normalized: &str, keyword: &str) -> bool {
    if keyword.len() <= SHORT_KEYWORD_LEN || WHOLE_TOKEN_KEYWORDS.contains(&keyword) {
        normalized.split('_').any(|token| token == keyword)
    } else {
        normalized.contains(keyword)
    }
}

pub fn classify_text(text: &str) -> Option<CoreCheck> {
    let normalized = normalize(text);
    CORE_CHECK_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| keyword_matches(&normalized, kw)))
        .map(|(check, _)| *check)
}

/// Classifies a test record from its id, name and category taken together,
/// so precedence comes from the rule order rather than the field order.
pub fn classify(id: &str, name: &str, category: &str) -> Option<CoreCheck> {
    classify_text(&format!("{}_{}_{}", id, name, category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_roundtrip() {
        for check in CoreCheck::ALL {
            assert_eq!(CoreCheck::from_number(check.number()), Some(check));
        }
        assert_eq!(CoreCheck::from_number(0), None);
        assert_eq!(CoreCheck::from_number(12), None);
    }

    #[test]
    fn test_rules_cover_every_check_in_order() {
        let order: Vec<u8> = CORE_CHECK_RULES.iter().map(|(c, _)| c.number()).collect();
        assert_eq!(order, (1..=11).collect::<Vec<u8>>());
    }

    #[test]
    fn test_classify_basic() {
        assert_eq!(classify_text("logs/discovery_scan.log"), Some(CoreCheck::Discovery));
        assert_eq!(classify_text("Wi-Fi Aware session"), Some(CoreCheck::WifiAwareSession));
        assert_eq!(classify_text("qr_pairing_success.png"), Some(CoreCheck::QrPairing));
        assert_eq!(classify_text("settings persistence"), Some(CoreCheck::SettingsPersistence));
        assert_eq!(classify_text("benchmark_results.json"), Some(CoreCheck::Performance));
    }

    #[test]
    fn test_qr_and_checksum_resolves_to_checksum() {
        let first = classify("qr_checksum_combo", "QR then checksum", "");
        assert_eq!(first, Some(CoreCheck::ChecksumVerification));
        for _ in 0..5 {
            assert_eq!(classify("qr_checksum_combo", "QR then checksum", ""), first);
        }
    }

    #[test]
    fn test_short_keywords_need_whole_tokens() {
        assert_eq!(classify_text("build_output_linux"), None);
        assert_eq!(classify_text("main_ui_flow"), Some(CoreCheck::UiUx));
        assert_eq!(classify_text("squirrel"), None);
    }

    #[test]
    fn test_fault_needs_whole_token() {
        assert_eq!(classify_text("default_theme_applied"), None);
        assert_eq!(classify_text("faultless_send"), None);
        assert_eq!(classify_text("fault_injection_run"), Some(CoreCheck::ErrorHandling));
        assert_eq!(classify_text("network faults"), Some(CoreCheck::ErrorHandling));
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(classify("t1", "smoke", "misc"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CoreCheck::QrPairing.to_string(), "Core Check 8: QR Pairing");
    }
}
