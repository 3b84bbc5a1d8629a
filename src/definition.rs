//! Definition document model
//!
//! The deserialized form of an input document. Maps are insertion-ordered:
//! the order services and operations appear in the document decides
//! registration order, which is significant for deterministic tie-breaks
//! when synthesized names collide.
//!
//! Shape descriptors stay as raw `serde_json::Value` — the core never
//! interprets structure beyond reference markers; structural rendering is
//! the type renderers' job.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result, Violation};

/// A parsed and validated definition document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Definition format marker (e.g. "alpha")
    pub rpcgen: String,
    /// Service name → service, in document order
    #[serde(default)]
    pub services: IndexMap<String, ServiceDef>,
    /// Shared type pool: type name → structural shape
    #[serde(default)]
    pub types: IndexMap<String, Value>,
}

/// A service definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Operation name → operation, in document order
    pub operations: IndexMap<String, OperationDef>,
}

/// An operation definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input shape descriptor, absent for input-less operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Output shape descriptor, absent for void operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl Definition {
    /// Merge another document into this one.
    ///
    /// Duplicate service or shared-type names across documents are reported
    /// as validation errors rather than silently overwritten.
    pub fn merge(&mut self, other: Definition) -> Result<()> {
        let mut violations = Vec::new();
        for (name, service) in other.services {
            if self.services.contains_key(&name) {
                violations.push(Violation {
                    path: format!("/services/{}", name),
                    message: "service defined in more than one input document".to_string(),
                    value: format!("\"{}\"", name),
                });
            } else {
                self.services.insert(name, service);
            }
        }
        for (name, shape) in other.types {
            if self.types.contains_key(&name) {
                violations.push(Violation {
                    path: format!("/types/{}", name),
                    message: "shared type defined in more than one input document".to_string(),
                    value: format!("\"{}\"", name),
                });
            } else {
                self.types.insert(name, shape);
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { violations })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Definition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_preserves_document_order() {
        let def = doc(
            r#"
rpcgen: alpha
services:
  Zebra: { operations: {} }
  Apple: { operations: {} }
  Mango: { operations: {} }
"#,
        );
        let names: Vec<_> = def.services.keys().cloned().collect();
        assert_eq!(names, vec!["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn test_merge_rejects_duplicate_service() {
        let mut a = doc("rpcgen: alpha\nservices:\n  Svc: { operations: {} }\n");
        let b = doc("rpcgen: alpha\nservices:\n  Svc: { operations: {} }\n");
        let err = a.merge(b).unwrap_err();
        match err {
            Error::Validation { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].path, "/services/Svc");
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_combines_type_pools() {
        let mut a = doc("rpcgen: alpha\ntypes:\n  User: { type: object }\n");
        let b = doc("rpcgen: alpha\ntypes:\n  Account: { type: object }\n");
        a.merge(b).unwrap();
        assert_eq!(a.types.len(), 2);
        assert!(a.types.contains_key("Account"));
    }
}
