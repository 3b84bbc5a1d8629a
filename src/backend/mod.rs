//! Backend orchestration
//!
//! One orchestrator is constructed per target-language generation request.
//! It owns the language-independent protocol: disambiguating service and
//! operation identifiers, resolving every type reference to a backend-native
//! source expression, tracking existing-type imports, and interleaving the
//! renderer's type emission with the service bindings according to the
//! backend's declared ordering.
//!
//! Backends declare their properties (emission order, file naming, forbidden
//! words, existing-type syntax) — the orchestrator never infers them.

pub mod go;
pub mod python;
pub mod typescript;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::names::{disambiguate_operation_name, disambiguate_service_name, NameRegistry};
use crate::prepare::{PreparedSchema, TypeReference};
use crate::render::TypeRenderer;
use crate::writer::SourceWriter;

/// Whether service bindings precede or follow the generated types in the
/// output file. Declared per backend: languages without hoisting must see
/// all types before the bindings that reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOrder {
    ServicesFirst,
    TypesFirst,
}

/// An existing type referenced by the definition, with its module qualifier
/// split out so it can be imported exactly once.
#[derive(Debug, Clone)]
pub struct ExistingType {
    /// The marker string exactly as given in the document
    pub marker: String,
    /// Module/package qualifier, when the marker carries one
    pub module: Option<String>,
    /// Bare type name
    pub name: String,
    /// Import alias assigned when the bare name (or package name) collides
    pub alias: Option<String>,
}

/// Existing types in first-reference order, keyed by marker.
pub type ExistingTable = IndexMap<String, ExistingType>;

/// One operation with naming and type references fully resolved.
#[derive(Debug, Clone)]
pub struct BoundOperation {
    /// Operation name as declared in the document
    pub wire_name: String,
    /// Collision-free backend identifier
    pub ident: String,
    pub description: Option<String>,
    /// Backend-native source expression for the input type; the backend's
    /// void form when the operation declares none
    pub input: String,
    pub output: String,
}

/// One service with naming and operations fully resolved.
#[derive(Debug, Clone)]
pub struct BoundService {
    pub wire_name: String,
    pub ident: String,
    pub description: Option<String>,
    pub operations: Vec<BoundOperation>,
}

/// Everything a backend needs to emit the file prelude.
#[derive(Debug)]
pub struct PreludeInfo<'a> {
    pub has_services: bool,
    pub existing: &'a ExistingTable,
    /// Import lines the renderer's declarations require
    pub renderer_imports: Vec<String>,
}

/// A target-language backend: declared properties plus syntax emitters.
pub trait Backend {
    fn display_name(&self) -> &'static str;

    /// Language aliases, also selecting `$<name>Ref` existing-type markers.
    fn language_names(&self) -> &'static [&'static str];

    fn emit_order(&self) -> EmitOrder;

    fn indent(&self) -> &'static str;

    /// Output file name: derived from the service when there is exactly one,
    /// from the first input document's base name otherwise.
    fn file_name(&self, schema: &PreparedSchema, first_stem: &str) -> String;

    /// Identifier style for service bindings.
    fn service_ident(&self, wire_name: &str) -> String;

    /// Identifier style for operation members.
    fn operation_ident(&self, wire_name: &str) -> String;

    /// Operation-level forbidden words (keywords, reserved member names).
    fn operation_forbidden(&self, name: &str) -> bool;

    /// Source expression for an absent input/output.
    fn void_expr(&self) -> String;

    fn make_renderer(&self, schema: &PreparedSchema) -> Result<Box<dyn TypeRenderer>>;

    /// Split an existing-type marker into module qualifier and bare name.
    fn split_existing(&self, marker: &str) -> (Option<String>, String);

    /// Assign import aliases for the existing types of this run.
    fn build_existing_table(
        &self,
        markers: &[String],
        renderer: &dyn TypeRenderer,
    ) -> ExistingTable;

    /// Source expression for referencing an existing type.
    fn existing_expr(&self, entry: &ExistingType) -> String;

    fn emit_prelude(&self, info: &PreludeInfo<'_>, out: &mut SourceWriter);

    fn emit_service(&self, service: &BoundService, out: &mut SourceWriter);
}

/// Drives one backend over one prepared schema.
///
/// The existing-type table and the renderer's name assignments are computed
/// at construction and never change afterwards.
pub struct Orchestrator<'a> {
    schema: &'a PreparedSchema,
    backend: &'a dyn Backend,
    renderer: Box<dyn TypeRenderer>,
    existing: ExistingTable,
}

impl<'a> Orchestrator<'a> {
    pub fn new(schema: &'a PreparedSchema, backend: &'a dyn Backend) -> Result<Self> {
        let renderer = backend.make_renderer(schema)?;
        let markers = collect_existing_markers(schema);
        let existing = backend.build_existing_table(&markers, renderer.as_ref());
        Ok(Self {
            schema,
            backend,
            renderer,
            existing,
        })
    }

    /// Generate this backend's output files.
    ///
    /// `first_stem` is the first input document's base name, used by file
    /// naming policies when the definition holds more than one service.
    pub fn generate(&mut self, first_stem: &str) -> Result<BTreeMap<String, String>> {
        // Types render first regardless of text order: the emitted-type
        // table must be complete before references are resolved.
        let mut types_out = SourceWriter::new(self.backend.indent());
        self.renderer.emit_types(&mut types_out)?;
        let types_src = types_out.finish();

        let bound = self.bind_services()?;
        let mut services_out = SourceWriter::new(self.backend.indent());
        for service in &bound {
            self.backend.emit_service(service, &mut services_out);
        }
        let services_src = services_out.finish();

        let mut out = SourceWriter::new(self.backend.indent());
        let info = PreludeInfo {
            has_services: !self.schema.services.is_empty(),
            existing: &self.existing,
            renderer_imports: self.renderer.imports(),
        };
        self.backend.emit_prelude(&info, &mut out);
        let mut assembled = out.finish();
        let (first, second) = match self.backend.emit_order() {
            EmitOrder::ServicesFirst => (&services_src, &types_src),
            EmitOrder::TypesFirst => (&types_src, &services_src),
        };
        append_section(&mut assembled, first);
        append_section(&mut assembled, second);

        let file_name = self.backend.file_name(self.schema, first_stem);
        debug!(
            backend = self.backend.display_name(),
            file = %file_name,
            "generated"
        );
        let mut files = BTreeMap::new();
        files.insert(file_name, assembled);
        Ok(files)
    }

    /// Resolve naming and type references for every service, in definition
    /// order. Service identifiers share one registry per run; operation
    /// identifiers are scoped per service.
    fn bind_services(&self) -> Result<Vec<BoundService>> {
        let mut services = Vec::new();
        let mut service_registry = NameRegistry::new();
        for (wire_name, service) in &self.schema.services {
            let taken = |name: &str| {
                self.renderer.forbidden_identifiers().contains(name)
                    || self.renderer.identifier_in_use(name)
            };
            let ident = disambiguate_service_name(
                &self.backend.service_ident(wire_name),
                taken,
                &mut service_registry,
            );
            let mut operations = Vec::new();
            let mut op_scope = NameRegistry::new();
            for (op_wire, op) in &service.operations {
                let op_ident = disambiguate_operation_name(
                    &self.backend.operation_ident(op_wire),
                    |name| self.backend.operation_forbidden(name),
                    &mut op_scope,
                );
                let input = match &op.input {
                    Some(reference) => self.source_expr(reference)?,
                    None => self.backend.void_expr(),
                };
                let output = match &op.output {
                    Some(reference) => self.source_expr(reference)?,
                    None => self.backend.void_expr(),
                };
                operations.push(BoundOperation {
                    wire_name: op_wire.clone(),
                    ident: op_ident,
                    description: op.description.clone(),
                    input,
                    output,
                });
            }
            services.push(BoundService {
                wire_name: wire_name.clone(),
                ident,
                description: service.description.clone(),
                operations,
            });
        }
        Ok(services)
    }

    /// Backend-native source expression for a resolved type reference.
    fn source_expr(&self, reference: &TypeReference) -> Result<String> {
        match reference {
            TypeReference::Existing { name } => {
                let entry = self.existing.get(name).ok_or_else(|| {
                    Error::BackendInternalInconsistency {
                        backend: self.backend.display_name().to_string(),
                        name: name.clone(),
                    }
                })?;
                Ok(self.backend.existing_expr(entry))
            }
            TypeReference::Generated { name } => self
                .renderer
                .native_expr(name)
                .ok_or_else(|| Error::BackendInternalInconsistency {
                    backend: self.backend.display_name().to_string(),
                    name: name.clone(),
                }),
        }
    }
}

fn append_section(assembled: &mut String, section: &str) {
    if section.is_empty() {
        return;
    }
    if !assembled.is_empty() && !assembled.ends_with("\n\n") {
        assembled.push('\n');
    }
    assembled.push_str(section);
}

/// Every existing-type marker in the schema, in first-reference order.
fn collect_existing_markers(schema: &PreparedSchema) -> Vec<String> {
    let mut markers = Vec::new();
    for service in schema.services.values() {
        for op in service.operations.values() {
            for reference in [&op.input, &op.output].into_iter().flatten() {
                if let TypeReference::Existing { name } = reference {
                    if !markers.contains(name) {
                        markers.push(name.clone());
                    }
                }
            }
        }
    }
    markers
}

/// Convert to lowerCamelCase, treating any non-alphanumeric run as a word
/// separator and preserving interior capitals.
pub(crate) fn camel_case(s: &str) -> String {
    let pascal = pascal_ident(s);
    let mut chars = pascal.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

/// Convert to PascalCase, treating any non-alphanumeric run as a separator.
pub(crate) fn pascal_ident(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert to snake_case.
pub(crate) fn snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if !c.is_ascii_alphanumeric() {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    result.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("UserService"), "userService");
        assert_eq!(camel_case("getUser"), "getUser");
        assert_eq!(camel_case("Strange{Item}"), "strangeItem");
    }

    #[test]
    fn test_pascal_ident() {
        assert_eq!(pascal_ident("getUser"), "GetUser");
        assert_eq!(pascal_ident("Strange{Item}"), "StrangeItem");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("getUser"), "get_user");
        assert_eq!(snake_case("UserService"), "user_service");
        assert_eq!(snake_case("Strange{Item}"), "strange_item");
    }
}
