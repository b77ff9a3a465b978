use thiserror::Error;

use crate::transfer::TransferStatus;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid transfer transition: {from} -> {to}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("Transfer progress error: {0}")]
    Progress(String),

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Transfer already registered: {0}")]
    DuplicateTransfer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manual results error: {0}")]
    ManualResults(String),

    #[error("Coverage parse error: {0}")]
    Coverage(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Render error: {0}")]
    Render(#[from] tera::Error),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = AuditError::InvalidTransition {
            from: TransferStatus::Completed,
            to: TransferStatus::Transferring,
        };
        assert_eq!(err.to_string(), "Invalid transfer transition: completed -> transferring");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AuditError = io.into();
        assert!(matches!(err, AuditError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_glob_pattern_error_converts() {
        let err: AuditError = glob::Pattern::new("evidence/[").unwrap_err().into();
        assert!(matches!(err, AuditError::Pattern(_)));
        assert!(err.to_string().starts_with("Glob pattern error"));
    }
}
