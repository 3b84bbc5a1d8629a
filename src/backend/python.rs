//! Python backend
//!
//! Data types render as pydantic models; services render strictly AFTER all
//! types so the handler annotations never need a forward reference. Existing
//! types use dotted `module.Type` markers: the module is imported once and
//! use sites stay fully qualified.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::PythonConfig;
use crate::error::Result;
use crate::prepare::PreparedSchema;
use crate::render::{FieldType, TypeKind, TypePlan, TypeRenderer};
use crate::writer::{wrap_description, SourceWriter};

use super::{
    pascal_ident, snake_case, Backend, BoundService, EmitOrder, ExistingTable, ExistingType,
    PreludeInfo,
};

const FORBIDDEN: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

/// Keywords plus pydantic model members an operation attribute must not shadow.
const OP_FORBIDDEN: &[&str] = &[
    "copy",
    "dict",
    "json",
    "model_config",
    "model_dump",
    "model_fields",
    "model_validate",
    "schema",
];

fn forbidden_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| FORBIDDEN.iter().copied().collect())
}

#[derive(Debug, Clone)]
pub struct PythonBackend {
    config: PythonConfig,
}

impl PythonBackend {
    pub fn new(config: PythonConfig) -> Self {
        Self { config }
    }
}

impl Backend for PythonBackend {
    fn display_name(&self) -> &'static str {
        "Python"
    }

    fn language_names(&self) -> &'static [&'static str] {
        &["python", "py"]
    }

    fn emit_order(&self) -> EmitOrder {
        EmitOrder::TypesFirst
    }

    fn indent(&self) -> &'static str {
        "    "
    }

    fn file_name(&self, schema: &PreparedSchema, first_stem: &str) -> String {
        let base = match schema.services.keys().next() {
            Some(name) if schema.services.len() == 1 => name.as_str(),
            _ => first_stem,
        };
        format!("{}.py", snake_case(base))
    }

    fn service_ident(&self, wire_name: &str) -> String {
        pascal_ident(wire_name)
    }

    fn operation_ident(&self, wire_name: &str) -> String {
        snake_case(wire_name)
    }

    fn operation_forbidden(&self, name: &str) -> bool {
        FORBIDDEN.contains(&name) || OP_FORBIDDEN.contains(&name)
    }

    fn void_expr(&self) -> String {
        "None".to_string()
    }

    fn make_renderer(&self, schema: &PreparedSchema) -> Result<Box<dyn TypeRenderer>> {
        let plan = TypePlan::build(schema)?;
        Ok(Box::new(PyRenderer::new(plan)))
    }

    fn split_existing(&self, marker: &str) -> (Option<String>, String) {
        match marker.rfind('.') {
            Some(index) if index > 0 => (
                Some(marker[..index].to_string()),
                marker[index + 1..].to_string(),
            ),
            _ => (None, marker.to_string()),
        }
    }

    fn build_existing_table(
        &self,
        markers: &[String],
        _renderer: &dyn TypeRenderer,
    ) -> ExistingTable {
        // Use sites stay fully qualified, so no aliasing is ever needed.
        let mut table = ExistingTable::new();
        for marker in markers {
            let (module, name) = self.split_existing(marker);
            table.insert(
                marker.clone(),
                ExistingType {
                    marker: marker.clone(),
                    module,
                    name,
                    alias: None,
                },
            );
        }
        table
    }

    fn existing_expr(&self, entry: &ExistingType) -> String {
        entry.marker.clone()
    }

    fn emit_prelude(&self, info: &PreludeInfo<'_>, out: &mut SourceWriter) {
        out.line("from __future__ import annotations");
        out.blank();
        for import in &info.renderer_imports {
            out.line(import);
        }
        if info.has_services {
            out.line(format!(
                "from {} import Operation, service",
                self.config.runtime_module
            ));
        }
        let mut modules: Vec<&str> = info
            .existing
            .values()
            .filter_map(|e| e.module.as_deref())
            .collect();
        modules.sort_unstable();
        modules.dedup();
        for module in modules {
            out.line(format!("import {}", module));
        }
    }

    fn emit_service(&self, service: &BoundService, out: &mut SourceWriter) {
        out.ensure_blank();
        out.blank();
        if service.ident == service.wire_name {
            out.line("@service");
        } else {
            out.line(format!(
                "@service(name=\"{}\")",
                escape_string(&service.wire_name)
            ));
        }
        out.line(format!("class {}:", service.ident));
        out.indented(|out| {
            docstring(out, service.description.as_deref());
            if service.operations.is_empty() {
                out.line("pass");
                return;
            }
            for (index, op) in service.operations.iter().enumerate() {
                if index > 0 {
                    out.blank();
                }
                let assignment = if op.ident == op.wire_name {
                    String::new()
                } else {
                    format!(" = Operation(name=\"{}\")", escape_string(&op.wire_name))
                };
                out.line(format!(
                    "{}: Operation[{}, {}]{}",
                    op.ident, op.input, op.output, assignment
                ));
                docstring(out, op.description.as_deref());
            }
        });
    }
}

/// Renderer for the generated data types.
struct PyRenderer {
    plan: TypePlan,
    imports: Vec<String>,
}

impl PyRenderer {
    fn new(plan: TypePlan) -> Self {
        let imports = collect_imports(&plan);
        Self { plan, imports }
    }
}

impl TypeRenderer for PyRenderer {
    fn emit_types(&mut self, out: &mut SourceWriter) -> Result<()> {
        for decl in &self.plan.decls {
            match &decl.kind {
                TypeKind::Object { fields } => {
                    out.ensure_blank();
                    out.blank();
                    out.line(format!("class {}(BaseModel):", decl.name));
                    out.indented(|out| {
                        let had_docstring = docstring_block(out, decl.description.as_deref());
                        if fields.is_empty() {
                            out.line("pass");
                            return;
                        }
                        if had_docstring {
                            out.blank();
                        }
                        for (index, field) in fields.iter().enumerate() {
                            if index > 0 {
                                out.blank();
                            }
                            out.line(field_line(field));
                            docstring(out, field.description.as_deref());
                        }
                    });
                }
                TypeKind::StringEnum { values } => {
                    out.ensure_blank();
                    let literals: Vec<String> = values
                        .iter()
                        .map(|v| format!("\"{}\"", escape_string(v)))
                        .collect();
                    out.line(format!("{} = Literal[{}]", decl.name, literals.join(", ")));
                }
                TypeKind::Alias { target } => {
                    out.ensure_blank();
                    out.line(format!("{} = {}", decl.name, py_type(target)));
                }
            }
        }
        Ok(())
    }

    fn native_expr(&self, name: &str) -> Option<String> {
        self.plan.declares(name).then(|| name.to_string())
    }

    fn forbidden_identifiers(&self) -> &HashSet<&'static str> {
        forbidden_set()
    }

    fn identifier_in_use(&self, name: &str) -> bool {
        self.plan.declares(name)
    }

    fn imports(&self) -> Vec<String> {
        self.imports.clone()
    }
}

/// One pydantic field line.
///
/// A snake_case attribute diverging from the wire name carries a
/// `serialization_alias`; optional fields default to `None`.
fn field_line(field: &crate::render::FieldDecl) -> String {
    let attribute = snake_case(&field.json_name);
    let needs_alias = attribute != field.json_name;
    let base_type = py_type(&field.field_type);
    let annotation = if field.required {
        base_type
    } else {
        format!("Optional[{}]", base_type)
    };
    match (needs_alias, field.required) {
        (false, true) => format!("{}: {}", attribute, annotation),
        (false, false) => format!("{}: {} = None", attribute, annotation),
        (true, required) => {
            let default = if required { "..." } else { "None" };
            format!(
                "{}: {} = Field({}, serialization_alias=\"{}\")",
                attribute,
                annotation,
                default,
                escape_string(&field.json_name)
            )
        }
    }
}

fn py_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "str".to_string(),
        FieldType::Float => "float".to_string(),
        FieldType::Int => "int".to_string(),
        FieldType::Bool => "bool".to_string(),
        FieldType::Any => "Any".to_string(),
        FieldType::Array(inner) => format!("List[{}]", py_type(inner)),
        FieldType::Named(name) => name.clone(),
    }
}

/// Record the typing constructs a field type pulls in.
fn note_type(field_type: &FieldType, typing: &mut Vec<&'static str>) {
    let mut current = field_type;
    loop {
        match current {
            FieldType::Any => {
                if !typing.contains(&"Any") {
                    typing.push("Any");
                }
                return;
            }
            FieldType::Array(inner) => {
                if !typing.contains(&"List") {
                    typing.push("List");
                }
                current = inner.as_ref();
            }
            _ => return,
        }
    }
}

/// Imports the declarations will need, in the order they are emitted.
fn collect_imports(plan: &TypePlan) -> Vec<String> {
    let mut uses_model = false;
    let mut uses_field = false;
    let mut typing: Vec<&str> = Vec::new();
    for decl in &plan.decls {
        match &decl.kind {
            TypeKind::Object { fields } => {
                uses_model = true;
                for field in fields {
                    if !field.required && !typing.contains(&"Optional") {
                        typing.push("Optional");
                    }
                    if snake_case(&field.json_name) != field.json_name {
                        uses_field = true;
                    }
                    note_type(&field.field_type, &mut typing);
                }
            }
            TypeKind::StringEnum { .. } => {
                if !typing.contains(&"Literal") {
                    typing.push("Literal");
                }
            }
            TypeKind::Alias { target } => note_type(target, &mut typing),
        }
    }
    let mut imports = Vec::new();
    if uses_model {
        imports.push(if uses_field {
            "from pydantic import BaseModel, Field".to_string()
        } else {
            "from pydantic import BaseModel".to_string()
        });
    }
    if !typing.is_empty() {
        typing.sort_unstable();
        imports.push(format!("from typing import {}", typing.join(", ")));
    }
    imports
}

fn docstring(out: &mut SourceWriter, description: Option<&str>) {
    docstring_block(out, description);
}

/// Emit a docstring; returns whether anything was written.
fn docstring_block(out: &mut SourceWriter, description: Option<&str>) -> bool {
    let Some(lines) = wrap_description(description) else {
        return false;
    };
    if lines.len() == 1 {
        out.line(format!("\"\"\"{}\"\"\"", lines[0]));
    } else {
        out.line(format!("\"\"\"{}", lines[0]));
        for line in &lines[1..] {
            out.line(line);
        }
        out.line("\"\"\"");
    }
    true
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FieldDecl;

    #[test]
    fn test_field_line_alias_and_optional() {
        let field = FieldDecl {
            json_name: "userId".to_string(),
            description: None,
            required: false,
            field_type: FieldType::String,
        };
        assert_eq!(
            field_line(&field),
            "user_id: Optional[str] = Field(None, serialization_alias=\"userId\")"
        );
    }

    #[test]
    fn test_field_line_required_plain() {
        let field = FieldDecl {
            json_name: "email".to_string(),
            description: None,
            required: true,
            field_type: FieldType::String,
        };
        assert_eq!(field_line(&field), "email: str");
    }

    #[test]
    fn test_split_existing_marker() {
        let backend = PythonBackend::new(PythonConfig::default());
        assert_eq!(
            backend.split_existing("my.module.MyType"),
            (Some("my.module".to_string()), "MyType".to_string())
        );
        assert_eq!(backend.split_existing("Bare"), (None, "Bare".to_string()));
    }
}
