//! Document loading and validation
//!
//! Loads YAML definition documents and validates them against the embedded
//! document schema (`schemas/definition.schema.json`) before deserializing.
//! Validation reports every violation at once — a document either loads
//! completely or not at all.

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::debug;

use crate::definition::Definition;
use crate::error::{Error, Result, Violation};

static DOCUMENT_SCHEMA: OnceLock<JSONSchema> = OnceLock::new();

fn document_schema() -> &'static JSONSchema {
    DOCUMENT_SCHEMA.get_or_init(|| {
        let raw: Value = serde_json::from_str(include_str!("../schemas/definition.schema.json"))
            .expect("embedded document schema is valid JSON");
        JSONSchema::compile(&raw).expect("embedded document schema compiles")
    })
}

/// Load and validate a single definition document.
pub fn load(path: impl AsRef<Path>) -> Result<Definition> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading definition document");
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}

/// Load and validate a definition document from YAML text.
pub fn load_str(text: &str) -> Result<Definition> {
    // Parse to a JSON value first so the schema validator sees the raw
    // document, not the serde model's defaults.
    let document: Value = serde_yaml::from_str(text)?;
    validate(&document)?;
    Ok(serde_json::from_value(document)?)
}

/// Load several documents and merge them into one definition.
///
/// Duplicate service or shared-type names across documents are a validation
/// error. At least one path is required.
pub fn load_all(paths: &[impl AsRef<Path>]) -> Result<Definition> {
    let mut iter = paths.iter();
    let first = iter.next().ok_or_else(|| Error::Validation {
        violations: vec![Violation {
            path: "(root)".to_string(),
            message: "at least one input document is required".to_string(),
            value: "[]".to_string(),
        }],
    })?;
    let mut merged = load(first)?;
    for path in iter {
        merged.merge(load(path)?)?;
    }
    Ok(merged)
}

fn validate(document: &Value) -> Result<()> {
    let schema = document_schema();
    if let Err(errors) = schema.validate(document) {
        let violations: Vec<Violation> = errors
            .map(|e| Violation {
                path: match e.instance_path.to_string() {
                    p if p.is_empty() => "(root)".to_string(),
                    p => p,
                },
                message: e.to_string(),
                value: serde_json::to_string(e.instance.as_ref()).unwrap_or_default(),
            })
            .collect();
        return Err(Error::Validation { violations });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_document() {
        let def = load_str(
            r#"
rpcgen: alpha
services:
  UserService:
    description: A service for managing users.
    operations:
      getUser:
        input: { type: object }
"#,
        )
        .unwrap();
        assert_eq!(def.rpcgen, "alpha");
        assert!(def.services.contains_key("UserService"));
    }

    #[test]
    fn test_missing_marker_is_violation() {
        let err = load_str("services: {}\n").unwrap_err();
        match err {
            Error::Validation { violations } => {
                assert!(!violations.is_empty());
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_every_violation_reported() {
        // Two independent problems: missing marker and a service without
        // operations. Both must surface in one error.
        let err = load_str(
            r#"
services:
  Broken:
    description: no operations key
"#,
        )
        .unwrap_err();
        match err {
            Error::Validation { violations } => {
                assert!(violations.len() >= 2, "got: {:?}", violations);
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpcgen: alpha").unwrap();
        let def = load(file.path()).unwrap();
        assert!(def.services.is_empty());
    }

    #[test]
    fn test_load_all_merges() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        writeln!(a, "rpcgen: alpha\nservices:\n  A: {{ operations: {{}} }}").unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        writeln!(b, "rpcgen: alpha\nservices:\n  B: {{ operations: {{}} }}").unwrap();
        let def = load_all(&[a.path(), b.path()]).unwrap();
        assert_eq!(def.services.len(), 2);
    }
}
