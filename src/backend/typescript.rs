//! TypeScript backend
//!
//! Services render as `const <name> = rpc.service(...)` objects ahead of the
//! generated types — TypeScript hoists type declarations, so bindings may
//! reference types declared later in the file. Existing types use
//! `module#Type` markers and are imported as `import { type T } from ...`,
//! aliased when the bare name is already claimed.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::TypeScriptConfig;
use crate::error::Result;
use crate::prepare::PreparedSchema;
use crate::render::{FieldType, TypeKind, TypePlan, TypeRenderer};
use crate::writer::{wrap_description, SourceWriter};

use super::{
    camel_case, Backend, BoundService, EmitOrder, ExistingTable, ExistingType, PreludeInfo,
};

/// Globals and reserved words that generated top-level names must avoid.
const FORBIDDEN: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "Function", "JSON", "Map", "Math", "Number", "Object",
    "Promise", "Proxy", "Reflect", "RegExp", "Set", "String", "Symbol", "break", "case", "catch",
    "class", "const", "continue", "debugger", "default", "delete", "do", "else", "enum", "export",
    "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof", "new",
    "null", "return", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void",
    "while", "with",
];

/// Base-object members an operation property must never shadow.
const OP_FORBIDDEN: &[&str] = &[
    "__defineGetter__",
    "__defineSetter__",
    "__lookupGetter__",
    "__lookupSetter__",
    "__proto__",
    "constructor",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

fn forbidden_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| FORBIDDEN.iter().copied().collect())
}

#[derive(Debug, Clone)]
pub struct TypeScriptBackend {
    config: TypeScriptConfig,
}

impl TypeScriptBackend {
    pub fn new(config: TypeScriptConfig) -> Self {
        Self { config }
    }
}

impl Backend for TypeScriptBackend {
    fn display_name(&self) -> &'static str {
        "TypeScript"
    }

    fn language_names(&self) -> &'static [&'static str] {
        &["typescript", "ts"]
    }

    fn emit_order(&self) -> EmitOrder {
        EmitOrder::ServicesFirst
    }

    fn indent(&self) -> &'static str {
        "  "
    }

    fn file_name(&self, schema: &PreparedSchema, first_stem: &str) -> String {
        match schema.services.keys().next() {
            Some(name) if schema.services.len() == 1 => format!("{}.ts", name),
            _ => format!("{}.ts", first_stem),
        }
    }

    fn service_ident(&self, wire_name: &str) -> String {
        camel_case(wire_name)
    }

    fn operation_ident(&self, wire_name: &str) -> String {
        camel_case(wire_name)
    }

    fn operation_forbidden(&self, name: &str) -> bool {
        OP_FORBIDDEN.contains(&name)
    }

    fn void_expr(&self) -> String {
        "void".to_string()
    }

    fn make_renderer(&self, schema: &PreparedSchema) -> Result<Box<dyn TypeRenderer>> {
        Ok(Box::new(TsRenderer {
            plan: TypePlan::build(schema)?,
        }))
    }

    fn split_existing(&self, marker: &str) -> (Option<String>, String) {
        match marker.rfind('#') {
            Some(index) => (
                Some(marker[..index].to_string()),
                marker[index + 1..].to_string(),
            ),
            None => (None, marker.to_string()),
        }
    }

    fn build_existing_table(
        &self,
        markers: &[String],
        renderer: &dyn TypeRenderer,
    ) -> ExistingTable {
        let mut table = ExistingTable::new();
        let mut claimed: HashSet<String> = HashSet::new();
        for marker in markers {
            let (module, name) = self.split_existing(marker);
            let mut candidate = name.clone();
            let mut index = 1usize;
            while claimed.contains(&candidate)
                || renderer.identifier_in_use(&candidate)
                || renderer.forbidden_identifiers().contains(candidate.as_str())
            {
                candidate = format!("{}{}", name, index);
                index += 1;
            }
            claimed.insert(candidate.clone());
            let alias = (candidate != name).then_some(candidate);
            table.insert(
                marker.clone(),
                ExistingType {
                    marker: marker.clone(),
                    module,
                    name,
                    alias,
                },
            );
        }
        table
    }

    fn existing_expr(&self, entry: &ExistingType) -> String {
        entry.alias.clone().unwrap_or_else(|| entry.name.clone())
    }

    fn emit_prelude(&self, info: &PreludeInfo<'_>, out: &mut SourceWriter) {
        if !info.has_services {
            return;
        }
        out.line(format!(
            "import * as rpc from \"{}\";",
            escape_string(&self.config.runtime_module)
        ));
        // Group existing-type imports by module, both levels sorted.
        let mut modules: Vec<&str> = info
            .existing
            .values()
            .filter_map(|e| e.module.as_deref())
            .collect();
        modules.sort_unstable();
        modules.dedup();
        for module in modules {
            let mut entries: Vec<&ExistingType> = info
                .existing
                .values()
                .filter(|e| e.module.as_deref() == Some(module))
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            let pieces: Vec<String> = entries
                .iter()
                .map(|e| match &e.alias {
                    Some(alias) => format!("type {} as {}", e.name, alias),
                    None => format!("type {}", e.name),
                })
                .collect();
            out.line(format!(
                "import {{ {} }} from \"{}\";",
                pieces.join(", "),
                escape_string(module)
            ));
        }
    }

    fn emit_service(&self, service: &BoundService, out: &mut SourceWriter) {
        out.ensure_blank();
        doc_comment(out, service.description.as_deref());
        out.line(format!(
            "export const {} = rpc.service(\"{}\", {{",
            service.ident,
            escape_string(&service.wire_name)
        ));
        out.indented(|out| {
            for (index, op) in service.operations.iter().enumerate() {
                if index > 0 {
                    out.blank();
                }
                doc_comment(out, op.description.as_deref());
                let arguments = if op.ident == op.wire_name {
                    String::new()
                } else {
                    format!("{{ name: \"{}\" }}", escape_string(&op.wire_name))
                };
                out.line(format!(
                    "{}: rpc.operation<{}, {}>({}),",
                    op.ident, op.input, op.output, arguments
                ));
            }
        });
        out.line("});");
    }
}

/// Renderer for the generated data types.
struct TsRenderer {
    plan: TypePlan,
}

impl TypeRenderer for TsRenderer {
    fn emit_types(&mut self, out: &mut SourceWriter) -> Result<()> {
        for decl in &self.plan.decls {
            out.ensure_blank();
            doc_comment(out, decl.description.as_deref());
            match &decl.kind {
                TypeKind::Object { fields } => {
                    out.line(format!("export interface {} {{", decl.name));
                    out.indented(|out| {
                        for field in fields {
                            doc_comment(out, field.description.as_deref());
                            let optional = if field.required { "" } else { "?" };
                            out.line(format!(
                                "{}{}: {};",
                                property_name(&field.json_name),
                                optional,
                                ts_type(&field.field_type)
                            ));
                        }
                    });
                    out.line("}");
                }
                TypeKind::StringEnum { values } => {
                    let union: Vec<String> = values
                        .iter()
                        .map(|v| format!("\"{}\"", escape_string(v)))
                        .collect();
                    out.line(format!("export type {} = {};", decl.name, union.join(" | ")));
                }
                TypeKind::Alias { target } => {
                    out.line(format!("export type {} = {};", decl.name, ts_type(target)));
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
}

fn ts_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "string".to_string(),
        FieldType::Float | FieldType::Int => "number".to_string(),
        FieldType::Bool => "boolean".to_string(),
        FieldType::Any => "any".to_string(),
        FieldType::Array(inner) => format!("{}[]", ts_type(inner)),
        FieldType::Named(name) => name.clone(),
    }
}

/// Quote a property name that is not a legal bare identifier.
fn property_name(json_name: &str) -> String {
    let legal = !json_name.is_empty()
        && json_name
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if legal {
        json_name.to_string()
    } else {
        format!("\"{}\"", escape_string(json_name))
    }
}

fn doc_comment(out: &mut SourceWriter, description: Option<&str>) {
    if let Some(lines) = wrap_description(description) {
        out.line("/**");
        for line in &lines {
            out.line(format!(" * {}", line));
        }
        out.line(" */");
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
