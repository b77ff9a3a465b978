use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{AuditError, Result};
use crate::merge::ParsedSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMetric {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    /// Optional pass line; compared with `value` in the direction given by
    /// `higher_is_better` (default true).
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub higher_is_better: Option<bool>,
}

impl BenchmarkMetric {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            target: None,
            higher_is_better: None,
        }
    }

    pub fn with_target(mut self, target: f64, higher_is_better: bool) -> Self {
        self.target = Some(target);
        self.higher_is_better = Some(higher_is_better);
        self
    }

    /// `None` when no target was given.
    pub fn meets_target(&self) -> Option<bool> {
        let target = self.target?;
        Some(if self.higher_is_better.unwrap_or(true) {
            self.value >= target
        } else {
            self.value <= target
        })
    }

    pub fn status(&self) -> &'static str {
        match self.meets_target() {
            Some(true) => "PASS",
            Some(false) => "FAIL",
            None => "INFO",
        }
    }

    pub fn display_value(&self) -> String {
        if self.unit.is_empty() {
            format!("{:.2}", self.value)
        } else {
            format!("{:.2} {}", self.value, self.unit)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSummary {
    pub metrics: Vec<BenchmarkMetric>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BenchmarkDocument {
    Metrics { metrics: Vec<BenchmarkMetric> },
    Bare(Vec<BenchmarkMetric>),
    Flat(BTreeMap<String, f64>),
}

impl BenchmarkSummary {
    pub fn new(metrics: Vec<BenchmarkMetric>) -> Self {
        Self { metrics }
    }

    /// Accepts `{"metrics": [...]}`, a bare metric array, or a flat
    /// `{"name": value}` object.
    pub fn from_json(content: &str) -> Result<Self> {
        let document: BenchmarkDocument = serde_json::from_str(content)
            .map_err(|e| AuditError::Report(format!("unrecognised benchmark document: {}", e)))?;
        let metrics = match document {
            BenchmarkDocument::Metrics { metrics } | BenchmarkDocument::Bare(metrics) => metrics,
            BenchmarkDocument::Flat(values) => values
                .into_iter()
                .map(|(name, value)| BenchmarkMetric::new(name, value, ""))
                .collect(),
        };
        Ok(Self { metrics })
    }

    pub fn load(path: impl AsRef<Path>) -> ParsedSection<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content).into(),
            Err(e) => ParsedSection::error(format!("{}: {}", path.display(), e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BenchmarkMetric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn failing(&self) -> Vec<&BenchmarkMetric> {
        self.metrics.iter().filter(|m| m.meets_target() == Some(false)).collect()
    }
}
