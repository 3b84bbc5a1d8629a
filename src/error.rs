//! Error types for the generator

use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single document-schema violation, with the path and value that failed.
#[derive(Debug, Clone)]
pub struct Violation {
    /// JSON-pointer-ish path into the document ("(root)" when empty)
    pub path: String,
    /// Human-readable message from the validator
    pub message: String,
    /// The offending value, rendered as JSON
    pub value: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (value: {})", self.path, self.message, self.value)
    }
}

/// Generator errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Definition document is invalid ({} violation(s)): {}", .violations.len(), format_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error(
        "Input/output for {service}.{operation} would be named {name} which clashes \
         with {prior_service}.{prior_operation}"
    )]
    NameCollision {
        name: String,
        service: String,
        operation: String,
        prior_service: String,
        prior_operation: String,
    },

    #[error("Unresolvable reference {reference} in {service}.{operation}: {reason}")]
    UnresolvableExternalReference {
        reference: String,
        service: String,
        operation: String,
        reason: String,
    },

    #[error("Internal inconsistency in {backend} backend: no emitted type named {name}")]
    BackendInternalInconsistency { backend: String, name: String },

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl Error {
    /// Whether this error indicates a bug in the preparer rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::BackendInternalInconsistency { .. })
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
