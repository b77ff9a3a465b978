use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use glob::{glob, Pattern};
use serde::Serialize;
use crate::error::Result;
use crate::merge::{classify_text, CoreCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceCategory {
    Screenshot,
    Log,
    Checksum,
    Data,
    Video,
    Other,
}

impl EvidenceCategory {
    pub const ALL: [EvidenceCategory; 6] = [
        EvidenceCategory::Screenshot,
        EvidenceCategory::Log,
        EvidenceCategory::Checksum,
        EvidenceCategory::Data,
        EvidenceCategory::Video,
        EvidenceCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceCategory::Screenshot => "screenshot",
            EvidenceCategory::Log => "log",
            EvidenceCategory::Checksum => "checksum",
            EvidenceCategory::Data => "data",
            EvidenceCategory::Video => "video",
            EvidenceCategory::Other => "other",
        }
    }

    /// First match wins, in this order: screenshots dir, logs, checksums,
    /// json data, video.
    pub fn classify(relative_path: &str) -> Self {
        let path = relative_path.to_lowercase().replace('\\', "/");
        let in_dir = |dir: &str| path.starts_with(&format!("{}/", dir)) || path.contains(&format!("/{}/", dir));

        if in_dir("screenshots") {
            EvidenceCategory::Screenshot
        } else if in_dir("logs") || path.ends_with(".log") || path.ends_with(".txt") {
            EvidenceCategory::Log
        } else if in_dir("checksums") || path.contains("checksum") {
            EvidenceCategory::Checksum
        } else if path.ends_with(".json") {
            EvidenceCategory::Data
        } else if path.ends_with(".mp4") || path.ends_with(".mov") {
            EvidenceCategory::Video
        } else {
            EvidenceCategory::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub path: PathBuf,
    pub relative_path: String,
    pub filename: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub category: EvidenceCategory,
    pub core_check: Option<CoreCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceIndex {
    pub root: PathBuf,
    pub items: Vec<EvidenceItem>,
    pub errors: Vec<String>,
    pub indexed_at: DateTime<Utc>,
}

impl EvidenceIndex {
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            items: Vec::new(),
            errors: Vec::new(),
            indexed_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size_bytes).sum()
    }

    /// Items with an inferred core check; unmatched files stay out.
    pub fn by_core_check(&self) -> BTreeMap<CoreCheck, Vec<&EvidenceItem>> {
        let mut map: BTreeMap<CoreCheck, Vec<&EvidenceItem>> = BTreeMap::new();
        for item in &self.items {
            if let Some(check) = item.core_check {
                map.entry(check).or_default().push(item);
            }
        }
        map
    }

    pub fn for_check(&self, check: CoreCheck) -> Vec<&EvidenceItem> {
        self.items.iter().filter(|i| i.core_check == Some(check)).collect()
    }

    pub fn count_by_category(&self) -> BTreeMap<EvidenceCategory, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.category).or_insert(0) += 1;
        }
        counts
    }
}

/// Walks an evidence tree. Every call re-reads the directory; nothing is
/// cached between runs.
#[derive(Debug, Clone)]
pub struct EvidenceIndexer {
    root: PathBuf,
}

impl EvidenceIndexer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> EvidenceIndex {
        let mut index = EvidenceIndex::empty(&self.root);

        if !self.root.is_dir() {
            index.errors.push(format!("evidence directory not found: {}", self.root.display()));
            return index;
        }

        let Some(root_str) = self.root.to_str() else {
            index.errors.push(format!("evidence path is not valid UTF-8: {}", self.root.display()));
            return index;
        };
        let entries = match walk(root_str) {
            Ok(entries) => entries,
            Err(e) => {
                index.errors.push(e.to_string());
                return index;
            }
        };

        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => match self.describe(&path) {
                    Ok(item) => index.items.push(item),
                    Err(e) => index.errors.push(format!("{}: {}", path.display(), e)),
                },
                Ok(_) => {}
                Err(e) => index.errors.push(e.to_string()),
            }
        }

        index.items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        tracing::debug!(
            "Indexed {} evidence files under {} ({} errors)",
            index.items.len(),
            self.root.display(),
            index.errors.len()
        );
        index
    }

    fn describe(&self, path: &Path) -> std::io::Result<EvidenceItem> {
        let metadata = fs::metadata(path)?;
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(EvidenceItem {
            path: path.to_path_buf(),
            category: EvidenceCategory::classify(&relative_path),
            core_check: classify_text(&relative_path),
            relative_path,
            filename,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }
}

/// Every path under `root`, with glob metacharacters in the root escaped.
fn walk(root: &str) -> Result<glob::Paths> {
    glob_paths(&format!("{}/**/*", Pattern::escape(root.trim_end_matches('/'))))
}

fn glob_paths(pattern: &str) -> Result<glob::Paths> {
    Ok(glob(pattern)?)
}
