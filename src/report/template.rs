use std::collections::BTreeMap;
use regex::{Captures, Regex};
use crate::error::{AuditError, Result};
use crate::merge::CoreCheck;

/// Every token a consolidated report template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    AppName,
    AppVersion,
    ReportDate,
    Timestamp,
    TotalTests,
    PassedTests,
    FailedTests,
    SkippedTests,
    PassRate,
    TotalDuration,
    OverallStatus,
    DeviceModel,
    OsVersion,
    AppBuild,
    EvidenceCount,
    LineCoverage,
    CoreStatus(CoreCheck),
    CoreDetails(CoreCheck),
    CoreDuration(CoreCheck),
}

const FIXED: &[(Placeholder, &str)] = &[
    (Placeholder::AppName, "APP_NAME"),
    (Placeholder::AppVersion, "APP_VERSION"),
    (Placeholder::ReportDate, "REPORT_DATE"),
    (Placeholder::Timestamp, "TIMESTAMP"),
    (Placeholder::TotalTests, "TOTAL_TESTS"),
    (Placeholder::PassedTests, "PASSED_TESTS"),
    (Placeholder::FailedTests, "FAILED_TESTS"),
    (Placeholder::SkippedTests, "SKIPPED_TESTS"),
    (Placeholder::PassRate, "PASS_RATE"),
    (Placeholder::TotalDuration, "TOTAL_DURATION"),
    (Placeholder::OverallStatus, "OVERALL_STATUS"),
    (Placeholder::DeviceModel, "DEVICE_MODEL"),
    (Placeholder::OsVersion, "OS_VERSION"),
    (Placeholder::AppBuild, "APP_BUILD"),
    (Placeholder::EvidenceCount, "EVIDENCE_COUNT"),
    (Placeholder::LineCoverage, "LINE_COVERAGE"),
];

impl Placeholder {
    /// Fixed placeholders followed by the three per-check ones for each
    /// core check.
    pub fn all() -> Vec<Placeholder> {
        let mut all: Vec<Placeholder> = FIXED.iter().map(|(p, _)| *p).collect();
        for check in CoreCheck::ALL {
            all.push(Placeholder::CoreStatus(check));
            all.push(Placeholder::CoreDetails(check));
            all.push(Placeholder::CoreDuration(check));
        }
        all
    }

    pub fn token(&self) -> String {
        match self {
            Placeholder::CoreStatus(c) => format!("CORE_{:02}_STATUS", c.number()),
            Placeholder::CoreDetails(c) => format!("CORE_{:02}_DETAILS", c.number()),
            Placeholder::CoreDuration(c) => format!("CORE_{:02}_DURATION", c.number()),
            fixed => FIXED
                .iter()
                .find(|(p, _)| p == fixed)
                .map(|(_, name)| name.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        if let Some((placeholder, _)) = FIXED.iter().find(|(_, name)| *name == token) {
            return Some(*placeholder);
        }

        let rest = token.strip_prefix("CORE_")?;
        let (num, field) = rest.split_once('_')?;
        let check = CoreCheck::from_number(num.parse().ok()?)?;
        match field {
            "STATUS" => Some(Placeholder::CoreStatus(check)),
            "DETAILS" => Some(Placeholder::CoreDetails(check)),
            "DURATION" => Some(Placeholder::CoreDuration(check)),
            _ => None,
        }
    }

    /// Value used when the report has no data for this placeholder.
    pub fn default_value(&self) -> &'static str {
        match self {
            Placeholder::TotalTests
            | Placeholder::PassedTests
            | Placeholder::FailedTests
            | Placeholder::SkippedTests
            | Placeholder::EvidenceCount
            | Placeholder::TotalDuration
            | Placeholder::CoreDuration(_) => "0",
            Placeholder::CoreStatus(_) => "⏭️ SKIPPED",
            _ => "N/A",
        }
    }
}

pub type TemplateValues = BTreeMap<Placeholder, String>;

pub struct TemplateRenderer {
    token_pattern: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        let token_pattern = Regex::new(r"\{\{([^{}]*)\}\}")
            .map_err(|e| AuditError::Template(e.to_string()))?;
        Ok(Self { token_pattern })
    }

    /// Substitutes every `{{...}}`, whatever is between the braces. Known
    /// tokens without a value get their default and anything else becomes
    /// `N/A`, so no raw token survives.
    pub fn render(&self, template: &str, values: &TemplateValues) -> String {
        self.token_pattern
            .replace_all(template, |caps: &Captures| {
                let token = caps[1].trim().to_ascii_uppercase();
                match Placeholder::parse(&token) {
                    Some(p) => values
                        .get(&p)
                        .filter(|v| !v.is_empty())
                        .cloned()
                        .unwrap_or_else(|| p.default_value().to_string()),
                    None => "N/A".to_string(),
                }
            })
            .into_owned()
    }

    pub fn tokens_in(&self, template: &str) -> Vec<String> {
        self.token_pattern
            .captures_iter(template)
            .map(|caps| caps[1].trim().to_ascii_uppercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        for placeholder in Placeholder::all() {
            assert_eq!(Placeholder::parse(&placeholder.token()), Some(placeholder));
        }
        assert_eq!(Placeholder::all().len(), 16 + 33);
    }

    #[test]
    fn test_core_tokens() {
        assert_eq!(Placeholder::CoreStatus(CoreCheck::QrPairing).token(), "CORE_08_STATUS");
        assert_eq!(Placeholder::parse("CORE_11_DURATION"), Some(Placeholder::CoreDuration(CoreCheck::Performance)));
        assert_eq!(Placeholder::parse("CORE_12_STATUS"), None);
        assert_eq!(Placeholder::parse("CORE_01_COLOUR"), None);
    }

    #[test]
    fn test_render_with_defaults() {
        let renderer = TemplateRenderer::new().unwrap();
        let mut values = TemplateValues::new();
        values.insert(Placeholder::TotalTests, "4".to_string());

        let out = renderer.render(
            "Total {{TOTAL_TESTS}}, failed {{ FAILED_TESTS }}, device {{DEVICE_MODEL}}, qr {{CORE_08_STATUS}}, x {{NOT_A_THING}}",
            &values,
        );
        assert_eq!(out, "Total 4, failed 0, device N/A, qr ⏭️ SKIPPED, x N/A");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_malformed_tokens_become_na() {
        let renderer = TemplateRenderer::new().unwrap();
        let out = renderer.render("a {{PASS-RATE}} b {{Device Model}} c {{}} d {{ }}", &TemplateValues::new());
        assert_eq!(out, "a N/A b N/A c N/A d N/A");
    }

    #[test]
    fn test_tokens_in() {
        let renderer = TemplateRenderer::new().unwrap();
        assert_eq!(renderer.tokens_in("{{a}} {{PASS_RATE}}"), vec!["A", "PASS_RATE"]);
    }
}
