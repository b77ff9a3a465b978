use std::fs;
use std::path::Path;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl EnvironmentCheck {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { name: name.into(), passed: true, detail: detail.into() }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { name: name.into(), passed: false, detail: detail.into() }
    }
}

/// Outcome of the first phase. It gates nothing; callers decide what an
/// invalid environment means for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentValidation {
    pub is_valid: bool,
    pub checks: Vec<EnvironmentCheck>,
}

impl EnvironmentValidation {
    pub fn from_checks(checks: Vec<EnvironmentCheck>) -> Self {
        Self {
            is_valid: checks.iter().all(|c| c.passed),
            checks,
        }
    }

    pub fn failures(&self) -> Vec<&EnvironmentCheck> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn check(&self, name: &str) -> Option<&EnvironmentCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

pub fn check_directory(name: &str, path: &Path) -> EnvironmentCheck {
    if path.is_dir() {
        EnvironmentCheck::pass(name, path.display().to_string())
    } else {
        EnvironmentCheck::fail(name, format!("{} is not a directory", path.display()))
    }
}

pub fn check_file(name: &str, path: &Path) -> EnvironmentCheck {
    if path.is_file() {
        EnvironmentCheck::pass(name, path.display().to_string())
    } else {
        EnvironmentCheck::fail(name, format!("{} not found", path.display()))
    }
}

/// Creates `dir` if needed and checks it is writable with a scratch file.
pub fn check_output_dir(dir: &Path) -> EnvironmentCheck {
    const NAME: &str = "output_dir";
    if let Err(e) = fs::create_dir_all(dir) {
        return EnvironmentCheck::fail(NAME, format!("cannot create {}: {}", dir.display(), e));
    }
    let scratch = dir.join(format!(".airlink_write_check_{}", uuid::Uuid::new_v4()));
    match fs::write(&scratch, b"ok") {
        Ok(()) => {
            let _ = fs::remove_file(&scratch);
            EnvironmentCheck::pass(NAME, format!("{} is writable", dir.display()))
        }
        Err(e) => EnvironmentCheck::fail(NAME, format!("{} is not writable: {}", dir.display(), e)),
    }
}
