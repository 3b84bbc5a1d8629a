//! Schema preparation and reference resolution
//!
//! Builds the immutable intermediate model handed to per-language emission:
//! which types must be generated, which already exist in the target
//! language, and under what names. This pass runs AFTER document loading
//! and BEFORE any backend orchestration.
//!
//! Resolution of an operation's input/output descriptor, in priority order:
//! 1. A `$<lang>Ref` marker for the targeted backend → an existing type,
//!    owned entirely by the target codebase and never generated.
//! 2. A local `$ref` into the shared type pool → a generated type named from
//!    the target's `title`, or from the last path segment when that segment
//!    is a string key. A target with neither falls through to case 3.
//! 3. Anything else (inline shape, unnamed local reference) → a generated
//!    type under the synthesized name `<Service><PascalCase(op)><Role>`.
//!
//! This module is the only place new generated types are introduced.

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::debug;

use crate::definition::Definition;
use crate::error::{Error, Result};

/// A resolved reference to an operation's input or output type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeReference {
    /// A type this run must emit, identified by a synthesized or shared name.
    Generated { name: String },
    /// An opaque backend-qualified name, emitted verbatim and never generated.
    Existing { name: String },
}

impl TypeReference {
    pub fn name(&self) -> &str {
        match self {
            TypeReference::Generated { name } | TypeReference::Existing { name } => name,
        }
    }
}

/// Which side of an operation a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

impl Role {
    fn suffix(self) -> &'static str {
        match self {
            Role::Input => "Input",
            Role::Output => "Output",
        }
    }
}

/// A prepared operation
#[derive(Debug, Clone)]
pub struct PreparedOperation {
    pub description: Option<String>,
    pub input: Option<TypeReference>,
    pub output: Option<TypeReference>,
}

/// A prepared service
#[derive(Debug, Clone)]
pub struct PreparedService {
    pub description: Option<String>,
    pub operations: IndexMap<String, PreparedOperation>,
}

/// A type the renderers must emit, with the operation that introduced it.
#[derive(Debug, Clone)]
pub struct PreparedType {
    /// The structural shape to render
    pub shape: Value,
    /// Local pointer this entry was derived from, when it names a shared type
    pub pointer: Option<String>,
    /// Operation that first registered the name (for collision diagnostics)
    pub service: String,
    pub operation: String,
}

/// The fully resolved intermediate model.
///
/// Built once per (definition, target language) pair, then read immutably by
/// that language's backend orchestrator.
#[derive(Debug, Clone)]
pub struct PreparedSchema {
    pub services: IndexMap<String, PreparedService>,
    /// Shared type pool as declared in the document
    pub shared_types: IndexMap<String, Value>,
    /// Generated-type name → shape, in registration order
    types: IndexMap<String, PreparedType>,
    /// `{"types": {...}}` root for local pointer resolution
    shared_root: Value,
}

impl PreparedSchema {
    /// Names of every type the renderer must emit, in registration order.
    pub fn generated_type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// All types to emit, in registration order.
    pub fn prepared_types(&self) -> impl Iterator<Item = (&str, &PreparedType)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Shape registered under a generated-type name.
    pub fn type_shape(&self, name: &str) -> Option<&Value> {
        self.types.get(name).map(|t| &t.shape)
    }

    /// Resolve a local `#/...` reference against the shared pool.
    pub fn resolve_local_ref(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.shared_root.pointer(pointer)
    }

    /// The registered name for a local reference, if its target was named.
    pub fn name_for_pointer(&self, reference: &str) -> Option<&str> {
        self.types
            .iter()
            .find(|(_, t)| t.pointer.as_deref() == Some(reference))
            .map(|(name, _)| name.as_str())
    }
}

/// Prepare a definition for one target language.
///
/// `lang_aliases` are the backend's language names (e.g. `["typescript",
/// "ts"]`); they select which `$<lang>Ref` markers denote existing types.
/// Fails fast on the first collision or unresolvable reference, naming the
/// offending service/operation pair.
pub fn prepare(definition: &Definition, lang_aliases: &[&str]) -> Result<PreparedSchema> {
    Preparer::new(definition, lang_aliases).run()
}

struct Preparer<'a> {
    definition: &'a Definition,
    marker_keys: Vec<String>,
    types: IndexMap<String, PreparedType>,
    shared_root: Value,
}

impl<'a> Preparer<'a> {
    fn new(definition: &'a Definition, lang_aliases: &[&str]) -> Self {
        let marker_keys = lang_aliases
            .iter()
            .map(|alias| format!("${}Ref", alias.to_lowercase()))
            .collect();
        let shared_root = json!({ "types": definition.types });
        Self {
            definition,
            marker_keys,
            types: IndexMap::new(),
            shared_root,
        }
    }

    fn run(mut self) -> Result<PreparedSchema> {
        let definition = self.definition;
        let mut services = IndexMap::new();
        for (service_name, service) in &definition.services {
            let mut operations = IndexMap::new();
            for (operation_name, operation) in &service.operations {
                let input = match &operation.input {
                    Some(descriptor) => Some(self.resolve(
                        descriptor,
                        service_name,
                        operation_name,
                        Role::Input,
                    )?),
                    None => None,
                };
                let output = match &operation.output {
                    Some(descriptor) => Some(self.resolve(
                        descriptor,
                        service_name,
                        operation_name,
                        Role::Output,
                    )?),
                    None => None,
                };
                operations.insert(
                    operation_name.clone(),
                    PreparedOperation {
                        description: operation.description.clone(),
                        input,
                        output,
                    },
                );
            }
            services.insert(
                service_name.clone(),
                PreparedService {
                    description: service.description.clone(),
                    operations,
                },
            );
        }
        debug!(
            services = services.len(),
            types = self.types.len(),
            "prepared schema"
        );
        Ok(PreparedSchema {
            services,
            shared_types: definition.types.clone(),
            types: self.types,
            shared_root: self.shared_root,
        })
    }

    /// Resolve one input/output descriptor to a type reference.
    fn resolve(
        &mut self,
        descriptor: &Value,
        service: &str,
        operation: &str,
        role: Role,
    ) -> Result<TypeReference> {
        // An existing-type marker for the targeted backend wins outright.
        for key in &self.marker_keys {
            if let Some(marker) = descriptor.get(key) {
                let name = marker.as_str().ok_or_else(|| {
                    Error::UnresolvableExternalReference {
                        reference: marker.to_string(),
                        service: service.to_string(),
                        operation: operation.to_string(),
                        reason: format!("{} marker must be a string", key),
                    }
                })?;
                return Ok(TypeReference::Existing {
                    name: name.to_string(),
                });
            }
        }

        // A lone local reference names a shared type when a name can be
        // derived for it; otherwise it falls through to synthesis below.
        if let Some(reference) = descriptor.get("$ref").and_then(Value::as_str) {
            if !reference.starts_with('#') {
                return Err(Error::UnresolvableExternalReference {
                    reference: reference.to_string(),
                    service: service.to_string(),
                    operation: operation.to_string(),
                    reason: "external references are never fetched".to_string(),
                });
            }
            let target = self.lookup(reference).ok_or_else(|| {
                Error::UnresolvableExternalReference {
                    reference: reference.to_string(),
                    service: service.to_string(),
                    operation: operation.to_string(),
                    reason: "reference target does not exist in the shared type pool"
                        .to_string(),
                }
            })?;
            if let Some(name) = derive_ref_name(&self.shared_root, reference) {
                let shape = target.clone();
                self.register(
                    name.clone(),
                    shape.clone(),
                    Some(reference.to_string()),
                    service,
                    operation,
                )?;
                self.register_nested_refs(&shape, service, operation)?;
                return Ok(TypeReference::Generated { name });
            }
        }

        // Inline shape or unnamed local reference: synthesize from context.
        let name = format!(
            "{}{}{}",
            service,
            pascal_case(operation),
            role.suffix()
        );
        self.register(name.clone(), descriptor.clone(), None, service, operation)?;
        self.register_nested_refs(descriptor, service, operation)?;
        Ok(TypeReference::Generated { name })
    }

    /// Register a generated type, enforcing name uniqueness.
    ///
    /// Re-registering the same name is allowed only when it is bound to the
    /// same pointer or an identical shape; anything else is a collision.
    fn register(
        &mut self,
        name: String,
        shape: Value,
        pointer: Option<String>,
        service: &str,
        operation: &str,
    ) -> Result<()> {
        if let Some(existing) = self.types.get(&name) {
            let same_pointer = pointer.is_some() && existing.pointer == pointer;
            if same_pointer || existing.shape == shape {
                return Ok(());
            }
            return Err(Error::NameCollision {
                name,
                service: service.to_string(),
                operation: operation.to_string(),
                prior_service: existing.service.clone(),
                prior_operation: existing.operation.clone(),
            });
        }
        self.types.insert(
            name,
            PreparedType {
                shape,
                pointer,
                service: service.to_string(),
                operation: operation.to_string(),
            },
        );
        Ok(())
    }

    /// Walk a registered shape and pull in every shared type it references.
    ///
    /// Remote references and dangling local references fail here, so emission
    /// never encounters a reference it cannot satisfy. Nameless local targets
    /// are left for the renderer to inline.
    fn register_nested_refs(
        &mut self,
        shape: &Value,
        service: &str,
        operation: &str,
    ) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let mut pending = collect_refs(shape);
        while let Some(reference) = pending.pop() {
            if !seen.insert(reference.clone()) {
                continue;
            }
            if !reference.starts_with('#') {
                return Err(Error::UnresolvableExternalReference {
                    reference,
                    service: service.to_string(),
                    operation: operation.to_string(),
                    reason: "external references are never fetched".to_string(),
                });
            }
            let target = self
                .lookup(&reference)
                .ok_or_else(|| Error::UnresolvableExternalReference {
                    reference: reference.clone(),
                    service: service.to_string(),
                    operation: operation.to_string(),
                    reason: "reference target does not exist in the shared type pool"
                        .to_string(),
                })?
                .clone();
            if let Some(name) = derive_ref_name(&self.shared_root, &reference) {
                if self.types.contains_key(&name)
                    && self.types[&name].pointer.as_deref() == Some(reference.as_str())
                {
                    continue; // already registered, stop the walk here
                }
                self.register(name, target.clone(), Some(reference), service, operation)?;
            }
            pending.extend(collect_refs(&target));
        }
        Ok(())
    }

    fn lookup(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.shared_root.pointer(pointer)
    }
}

/// Derive a display name for a local reference target: its `title`, or the
/// last path segment when that segment is a key into an object (an array
/// index is not a usable name).
fn derive_ref_name(root: &Value, reference: &str) -> Option<String> {
    let pointer = reference.strip_prefix('#')?;
    let target = root.pointer(pointer)?;
    if let Some(title) = target.get("title").and_then(Value::as_str) {
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    let segments: Vec<&str> = pointer.split('/').filter(|s| !s.is_empty()).collect();
    let last = *segments.last()?;
    let parent_pointer: String = segments[..segments.len() - 1]
        .iter()
        .map(|s| format!("/{}", s))
        .collect();
    let parent = root.pointer(&parent_pointer)?;
    if parent.is_object() {
        Some(unescape_pointer_segment(last))
    } else {
        None
    }
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Every `$ref` string directly reachable in a shape.
fn collect_refs(shape: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs_into(shape, &mut refs);
    refs
}

fn collect_refs_into(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if key == "$ref" {
                    if let Some(r) = v.as_str() {
                        refs.push(r.to_string());
                    }
                } else {
                    collect_refs_into(v, refs);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs_into(item, refs);
            }
        }
        _ => {}
    }
}

/// Convert to PascalCase: capitalize the first letter of each `_`/`-`/space
/// separated word, preserving interior capitals (`getUser` → `GetUser`).
pub fn pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;

    const TS_ALIASES: &[&str] = &["typescript", "ts"];

    fn prepared(yaml: &str) -> PreparedSchema {
        prepare(&load_str(yaml).unwrap(), TS_ALIASES).unwrap()
    }

    #[test]
    fn test_synthesized_name_formula() {
        let schema = prepared(
            r#"
rpcgen: alpha
services:
  UserService:
    operations:
      getUser:
        input: { type: object, properties: { userId: { type: string } } }
"#,
        );
        let names: Vec<_> = schema.generated_type_names().collect();
        assert_eq!(names, vec!["UserServiceGetUserInput"]);
    }

    #[test]
    fn test_local_ref_uses_last_segment_key() {
        let schema = prepared(
            r##"
rpcgen: alpha
services:
  UserService:
    operations:
      getUser:
        output: { $ref: "#/types/User" }
types:
  User:
    type: object
    properties:
      email: { type: string }
"##,
        );
        let names: Vec<_> = schema.generated_type_names().collect();
        assert_eq!(names, vec!["User"]);
        let op = &schema.services["UserService"].operations["getUser"];
        assert_eq!(
            op.output,
            Some(TypeReference::Generated {
                name: "User".to_string()
            })
        );
    }

    #[test]
    fn test_local_ref_title_beats_path_segment() {
        let schema = prepared(
            r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input: { $ref: "#/types/user_record" }
types:
  user_record:
    title: Account
    type: object
"##,
        );
        let names: Vec<_> = schema.generated_type_names().collect();
        assert_eq!(names, vec!["Account"]);
    }

    #[test]
    fn test_existing_marker_takes_priority() {
        let schema = prepared(
            r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input:
          $tsRef: "./types.js#MyExistingType"
          $ref: "#/types/User"
types:
  User: { type: object }
"##,
        );
        let op = &schema.services["Svc"].operations["op"];
        assert_eq!(
            op.input,
            Some(TypeReference::Existing {
                name: "./types.js#MyExistingType".to_string()
            })
        );
        // Marker for the active backend never lands in the generated set.
        assert_eq!(schema.generated_type_names().count(), 0);
    }

    #[test]
    fn test_marker_for_other_backend_is_ignored() {
        let schema = prepared(
            r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input:
          $goRef: "example.com/pkg.Thing"
          type: object
"#,
        );
        let op = &schema.services["Svc"].operations["op"];
        assert_eq!(
            op.input,
            Some(TypeReference::Generated {
                name: "SvcOpInput".to_string()
            })
        );
    }

    #[test]
    fn test_round_trip_scenario() {
        let schema = prepared(
            r##"
rpcgen: alpha
services:
  UserService:
    operations:
      getUser:
        input: { type: object, properties: { userId: { type: string } }, required: [userId] }
        output: { $ref: "#/types/User" }
      deleteUser:
        input: { type: object, properties: { userId: { type: string } }, required: [userId] }
types:
  User:
    type: object
    properties:
      email: { type: string }
      userId: { type: string }
"##,
        );
        let mut names: Vec<_> = schema.generated_type_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["User", "UserServiceDeleteUserInput", "UserServiceGetUserInput"]
        );
        // Output reused the shared reference: no synthesized output type.
        assert!(!names.contains(&"UserServiceGetUserOutput"));
        let delete = &schema.services["UserService"].operations["deleteUser"];
        assert!(delete.output.is_none());
    }

    #[test]
    fn test_collision_names_both_operations() {
        let err = prepare(
            &load_str(
                r#"
rpcgen: alpha
services:
  Svc:
    operations:
      getItem:
        input: { type: object, properties: { a: { type: string } } }
      get_item:
        input: { type: object, properties: { b: { type: number } } }
"#,
            )
            .unwrap(),
            TS_ALIASES,
        )
        .unwrap_err();
        match err {
            Error::NameCollision {
                name,
                service,
                operation,
                prior_service,
                prior_operation,
            } => {
                assert_eq!(name, "SvcGetItemInput");
                assert_eq!((service.as_str(), operation.as_str()), ("Svc", "get_item"));
                assert_eq!(
                    (prior_service.as_str(), prior_operation.as_str()),
                    ("Svc", "getItem")
                );
            }
            other => panic!("expected NameCollision, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_ref_is_unresolvable() {
        let err = prepare(
            &load_str(
                r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input: { $ref: "https://example.com/schema.json#/Thing" }
"#,
            )
            .unwrap(),
            TS_ALIASES,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnresolvableExternalReference { .. }));
    }

    #[test]
    fn test_dangling_local_ref_is_unresolvable() {
        let err = prepare(
            &load_str(
                r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input: { $ref: "#/types/Missing" }
"##,
            )
            .unwrap(),
            TS_ALIASES,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnresolvableExternalReference { .. }));
    }

    #[test]
    fn test_nested_shared_refs_are_pulled_in() {
        let schema = prepared(
            r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input: { $ref: "#/types/ComplexInput" }
types:
  ComplexInput:
    type: object
    properties:
      selfRef: { $ref: "#/types/ComplexInput" }
      someSharedObj: { $ref: "#/types/SharedObject" }
  SharedObject:
    type: object
    properties:
      someField: { type: number }
"##,
        );
        let mut names: Vec<_> = schema.generated_type_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["ComplexInput", "SharedObject"]);
    }

    #[test]
    fn test_determinism() {
        let yaml = r##"
rpcgen: alpha
services:
  A:
    operations:
      one: { input: { type: object } }
      two: { output: { $ref: "#/types/Shared" } }
types:
  Shared: { type: object }
"##;
        let first = prepared(yaml);
        let second = prepared(yaml);
        let a: Vec<_> = first.generated_type_names().collect();
        let b: Vec<_> = second.generated_type_names().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("getUser"), "GetUser");
        assert_eq!(pascal_case("get_user"), "GetUser");
        assert_eq!(pascal_case("get-user"), "GetUser");
        assert_eq!(pascal_case("GetUser"), "GetUser");
    }
}
