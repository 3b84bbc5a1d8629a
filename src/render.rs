//! Type rendering capability
//!
//! The orchestrator drives an external-style renderer through an explicit
//! capability interface: emit declarations for the prepared types, then
//! answer name lookups and identifier queries. Orchestrator-injected source
//! (service bindings, imports) is composed around `emit_types` according to
//! the backend's declared ordering — there is no interception.
//!
//! `TypePlan` is the shared, language-agnostic projection the concrete
//! renderers consume. Emitters never read raw shape JSON — classification
//! and child-type naming happen once, here, so every backend sees the same
//! names in the same order.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::Result;
use crate::prepare::{pascal_case, PreparedSchema};
use crate::writer::SourceWriter;

/// Renderer capability the backend orchestrator drives.
pub trait TypeRenderer {
    /// Emit backend-native declarations for every prepared type.
    fn emit_types(&mut self, out: &mut SourceWriter) -> Result<()>;

    /// Post-emission lookup: declared name → backend-native source
    /// expression for referencing that type.
    fn native_expr(&self, name: &str) -> Option<String>;

    /// Identifiers the backend reserves outright (keywords, globals).
    fn forbidden_identifiers(&self) -> &HashSet<&'static str>;

    /// Whether the renderer declares `name` (decided at construction, before
    /// any emission happens).
    fn identifier_in_use(&self, name: &str) -> bool;

    /// Import lines the emitted declarations require, for the backend's
    /// prelude. Decided at construction.
    fn imports(&self) -> Vec<String> {
        Vec::new()
    }
}

// =============================================================================
// Type Plan
// =============================================================================

/// How a declared type renders.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A record with named fields
    Object { fields: Vec<FieldDecl> },
    /// A closed set of string values
    StringEnum { values: Vec<String> },
    /// A top-level alias for a non-record shape (`type ScalarInput = string`)
    Alias { target: FieldType },
}

/// One declared type, named and classified.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub description: Option<String>,
    pub kind: TypeKind,
}

/// A field of an object declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Name as it appears on the wire
    pub json_name: String,
    pub description: Option<String>,
    pub required: bool,
    pub field_type: FieldType,
}

/// A field's resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Float,
    Int,
    Bool,
    Any,
    Array(Box<FieldType>),
    /// Reference to another declared type by name
    Named(String),
}

/// The full set of declarations for one backend run, in emission order.
///
/// Built once from the prepared schema; immutable afterwards. Inline child
/// shapes (an object nested directly inside another) get synthesized names
/// `<Parent><PascalCase(field)>`, numbered from 2 on collision.
#[derive(Debug, Clone)]
pub struct TypePlan {
    pub decls: Vec<TypeDecl>,
    names: HashSet<String>,
}

impl TypePlan {
    pub fn build(schema: &PreparedSchema) -> Result<Self> {
        Planner::new(schema).run()
    }

    pub fn declares(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

struct Planner<'a> {
    schema: &'a PreparedSchema,
    decls: Vec<TypeDecl>,
    names: HashSet<String>,
}

// Bound on `$ref` chains; anything deeper degrades to `Any` rather than
// looping on a self-referential alias.
const MAX_REF_HOPS: usize = 32;

impl<'a> Planner<'a> {
    fn new(schema: &'a PreparedSchema) -> Self {
        Self {
            schema,
            decls: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn run(mut self) -> Result<TypePlan> {
        // Reserve every top-level name before planning bodies so synthesized
        // child names can never steal one.
        for (name, _) in self.schema.prepared_types() {
            self.names.insert(name.to_string());
        }
        let top_level: Vec<(String, Value)> = self
            .schema
            .prepared_types()
            .map(|(name, prepared)| (name.to_string(), prepared.shape.clone()))
            .collect();
        for (name, shape) in top_level {
            // Reserve the slot first so a declaration always precedes the
            // children its fields synthesize.
            let slot = self.reserve_slot(name.clone());
            let decl = self.plan_decl(name, &shape);
            self.decls[slot] = decl;
        }
        Ok(TypePlan {
            decls: self.decls,
            names: self.names,
        })
    }

    fn plan_decl(&mut self, name: String, shape: &Value) -> TypeDecl {
        let shape = self.deref(shape);
        let description = shape
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let kind = self.classify(&name, &shape);
        TypeDecl {
            name,
            description,
            kind,
        }
    }

    /// Follow a lone `$ref` chain to the underlying structural shape.
    fn deref(&self, shape: &Value) -> Value {
        let mut current = shape.clone();
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return current;
            };
            match self.schema.resolve_local_ref(reference) {
                Some(target) => current = target.clone(),
                None => return current,
            }
        }
        Value::Object(serde_json::Map::new())
    }

    fn classify(&mut self, parent: &str, shape: &Value) -> TypeKind {
        if let Some(values) = string_enum_values(shape) {
            return TypeKind::StringEnum { values };
        }
        let declared = shape.get("type").and_then(Value::as_str);
        if declared == Some("object") || shape.get("properties").is_some() {
            return TypeKind::Object {
                fields: self.plan_fields(parent, shape),
            };
        }
        TypeKind::Alias {
            target: self.plan_field_type(parent, "value", shape),
        }
    }

    fn plan_fields(&mut self, parent: &str, shape: &Value) -> Vec<FieldDecl> {
        let required: HashSet<&str> = shape
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let Some(properties) = shape.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        properties
            .iter()
            .map(|(json_name, prop)| FieldDecl {
                json_name: json_name.clone(),
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                required: required.contains(json_name.as_str()),
                field_type: self.plan_field_type(parent, json_name, prop),
            })
            .collect()
    }

    fn plan_field_type(&mut self, parent: &str, field: &str, shape: &Value) -> FieldType {
        // A reference to a named shared type resolves to that name; an
        // unnamed target is treated like an inline shape below.
        if let Some(reference) = shape.get("$ref").and_then(Value::as_str) {
            if let Some(name) = self.schema.name_for_pointer(reference) {
                return FieldType::Named(name.to_string());
            }
            let resolved = self.deref(shape);
            return self.plan_inline(parent, field, &resolved);
        }
        if string_enum_values(shape).is_some() {
            return self.plan_inline(parent, field, shape);
        }
        match shape.get("type").and_then(Value::as_str) {
            Some("string") => FieldType::String,
            Some("number") => FieldType::Float,
            Some("integer") => FieldType::Int,
            Some("boolean") => FieldType::Bool,
            Some("array") => {
                let items = shape.get("items").cloned().unwrap_or(Value::Null);
                FieldType::Array(Box::new(self.plan_field_type(parent, field, &items)))
            }
            Some("object") => self.plan_inline(parent, field, shape),
            _ if shape.get("properties").is_some() => self.plan_inline(parent, field, shape),
            _ => FieldType::Any,
        }
    }

    /// Declare an inline child shape under a synthesized name.
    fn plan_inline(&mut self, parent: &str, field: &str, shape: &Value) -> FieldType {
        let name = self.claim_child_name(parent, field);
        let slot = self.reserve_slot(name.clone());
        let decl = self.plan_decl(name.clone(), shape);
        self.decls[slot] = decl;
        FieldType::Named(name)
    }

    fn reserve_slot(&mut self, name: String) -> usize {
        self.decls.push(TypeDecl {
            name,
            description: None,
            kind: TypeKind::Object { fields: Vec::new() },
        });
        self.decls.len() - 1
    }

    fn claim_child_name(&mut self, parent: &str, field: &str) -> String {
        let ideal = format!("{}{}", parent, pascal_case(field));
        let mut name = ideal.clone();
        let mut index = 2usize;
        while !self.names.insert(name.clone()) {
            name = format!("{}{}", ideal, index);
            index += 1;
        }
        name
    }
}

fn string_enum_values(shape: &Value) -> Option<Vec<String>> {
    let values = shape.get("enum")?.as_array()?;
    let strings: Vec<String> = values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if strings.len() == values.len() && !strings.is_empty() {
        Some(strings)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;
    use crate::prepare::prepare;

    fn plan(yaml: &str) -> TypePlan {
        let definition = load_str(yaml).unwrap();
        let schema = prepare(&definition, &["typescript", "ts"]).unwrap();
        TypePlan::build(&schema).unwrap()
    }

    #[test]
    fn test_object_fields_and_required() {
        let plan = plan(
            r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input:
          type: object
          properties:
            userId: { type: string }
            count: { type: integer }
          required: [userId]
"#,
        );
        assert_eq!(plan.decls.len(), 1);
        let decl = &plan.decls[0];
        assert_eq!(decl.name, "SvcOpInput");
        let TypeKind::Object { fields } = &decl.kind else {
            panic!("expected object, got {:?}", decl.kind);
        };
        let user_id = fields.iter().find(|f| f.json_name == "userId").unwrap();
        assert!(user_id.required);
        assert_eq!(user_id.field_type, FieldType::String);
        let count = fields.iter().find(|f| f.json_name == "count").unwrap();
        assert!(!count.required);
        assert_eq!(count.field_type, FieldType::Int);
    }

    #[test]
    fn test_scalar_top_level_becomes_alias() {
        let plan = plan(
            r#"
rpcgen: alpha
services:
  Svc:
    operations:
      count:
        input: { type: string, description: String to count }
        output: { type: number }
"#,
        );
        assert_eq!(plan.decls.len(), 2);
        assert_eq!(
            plan.decls[0].kind,
            TypeKind::Alias {
                target: FieldType::String
            }
        );
        assert_eq!(plan.decls[0].description.as_deref(), Some("String to count"));
    }

    #[test]
    fn test_inline_child_gets_synthesized_name() {
        let plan = plan(
            r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input:
          type: object
          properties:
            address:
              type: object
              properties:
                street: { type: string }
"#,
        );
        let names: Vec<_> = plan.decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["SvcOpInput", "SvcOpInputAddress"]);
        assert!(plan.declares("SvcOpInputAddress"));
    }

    #[test]
    fn test_named_ref_field_resolves_to_name() {
        let plan = plan(
            r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        output: { $ref: "#/types/User" }
        input:
          type: object
          properties:
            user: { $ref: "#/types/User" }
types:
  User:
    type: object
    properties:
      email: { type: string }
"##,
        );
        let input = plan.decls.iter().find(|d| d.name == "SvcOpInput").unwrap();
        let TypeKind::Object { fields } = &input.kind else {
            panic!("expected object");
        };
        assert_eq!(
            fields[0].field_type,
            FieldType::Named("User".to_string())
        );
    }

    #[test]
    fn test_string_enum() {
        let plan = plan(
            r#"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input: { enum: [red, green, blue] }
"#,
        );
        assert_eq!(
            plan.decls[0].kind,
            TypeKind::StringEnum {
                values: vec!["red".into(), "green".into(), "blue".into()]
            }
        );
    }

    #[test]
    fn test_array_of_refs() {
        let plan = plan(
            r##"
rpcgen: alpha
services:
  Svc:
    operations:
      op:
        input:
          type: object
          properties:
            users:
              type: array
              items: { $ref: "#/types/User" }
types:
  User: { type: object }
"##,
        );
        let input = plan.decls.iter().find(|d| d.name == "SvcOpInput").unwrap();
        let TypeKind::Object { fields } = &input.kind else {
            panic!("expected object");
        };
        assert_eq!(
            fields[0].field_type,
            FieldType::Array(Box::new(FieldType::Named("User".to_string())))
        );
    }
}
