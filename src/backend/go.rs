//! Go backend
//!
//! Each service renders as a `var` of an anonymous struct holding typed
//! operation references. Existing types use `import/path.Type` markers; the
//! import path is imported once with a numbered package alias when its base
//! name is already claimed. Nullable primitives stay value types unless the
//! `primitive_pointers` option is set.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::GoConfig;
use crate::error::Result;
use crate::prepare::PreparedSchema;
use crate::render::{FieldType, TypeKind, TypePlan, TypeRenderer};
use crate::writer::{wrap_description, SourceWriter};

use super::{
    pascal_ident, Backend, BoundService, EmitOrder, ExistingTable, ExistingType, PreludeInfo,
};

const FORBIDDEN: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

fn forbidden_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| FORBIDDEN.iter().copied().collect())
}

#[derive(Debug, Clone)]
pub struct GoBackend {
    config: GoConfig,
}

impl GoBackend {
    pub fn new(config: GoConfig) -> Self {
        Self { config }
    }

    /// Package alias the runtime SDK is referenced through.
    fn runtime_alias(&self) -> &str {
        package_base(&self.config.runtime_import)
    }
}

impl Backend for GoBackend {
    fn display_name(&self) -> &'static str {
        "Go"
    }

    fn language_names(&self) -> &'static [&'static str] {
        &["go", "golang"]
    }

    fn emit_order(&self) -> EmitOrder {
        EmitOrder::ServicesFirst
    }

    fn indent(&self) -> &'static str {
        "\t"
    }

    fn file_name(&self, schema: &PreparedSchema, first_stem: &str) -> String {
        let name = match schema.services.keys().next() {
            Some(name) if schema.services.len() == 1 => format!("{}.go", name),
            _ => format!("{}.go", first_stem),
        };
        name.to_lowercase()
    }

    fn service_ident(&self, wire_name: &str) -> String {
        pascal_ident(wire_name)
    }

    fn operation_ident(&self, wire_name: &str) -> String {
        pascal_ident(wire_name)
    }

    fn operation_forbidden(&self, name: &str) -> bool {
        // The reference struct already carries a ServiceName field.
        name == "ServiceName" || FORBIDDEN.contains(&name)
    }

    fn void_expr(&self) -> String {
        format!("{}.NoValue", self.runtime_alias())
    }

    fn make_renderer(&self, schema: &PreparedSchema) -> Result<Box<dyn TypeRenderer>> {
        Ok(Box::new(GoRenderer {
            plan: TypePlan::build(schema)?,
            primitive_pointers: self.config.primitive_pointers,
        }))
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
        // One alias per import path, numbered from 1 when the base package
        // name is already taken (the runtime import counts as taken).
        let mut table = ExistingTable::new();
        let mut aliases: IndexAliasMap = IndexAliasMap::new(self.runtime_alias());
        for marker in markers {
            let (module, name) = self.split_existing(marker);
            let alias = module.as_deref().map(|path| aliases.claim(path));
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
        match &entry.alias {
            Some(alias) => format!("{}.{}", alias, entry.name),
            None => entry.name.clone(),
        }
    }

    fn emit_prelude(&self, info: &PreludeInfo<'_>, out: &mut SourceWriter) {
        out.line(format!("package {}", self.config.package));
        out.blank();
        let mut imports: Vec<(String, String)> = vec![(
            self.config.runtime_import.clone(),
            self.runtime_alias().to_string(),
        )];
        for entry in info.existing.values() {
            if let (Some(module), Some(alias)) = (&entry.module, &entry.alias) {
                let pair = (module.clone(), alias.clone());
                if !imports.contains(&pair) {
                    imports.push(pair);
                }
            }
        }
        imports.sort();
        // goimports ordering: plain paths first, then dotted domains.
        for (path, alias) in imports.iter().filter(|(p, _)| !p.contains('.')) {
            out.line(import_line(path, alias));
        }
        let dotted: Vec<_> = imports.iter().filter(|(p, _)| p.contains('.')).collect();
        if !dotted.is_empty() {
            out.ensure_blank();
            for (path, alias) in dotted {
                out.line(import_line(path, alias));
            }
        }
    }

    fn emit_service(&self, service: &BoundService, out: &mut SourceWriter) {
        let rt = self.runtime_alias().to_string();
        out.ensure_blank();
        comment(out, service.description.as_deref());
        out.line(format!("var {} = struct {{", service.ident));
        out.indented(|out| {
            out.line("ServiceName string");
            for op in &service.operations {
                comment(out, op.description.as_deref());
                out.line(format!(
                    "{} {}.OperationReference[{}, {}]",
                    op.ident, rt, op.input, op.output
                ));
            }
        });
        out.line("}{");
        out.indented(|out| {
            out.line(format!(
                "ServiceName: \"{}\",",
                escape_string(&service.wire_name)
            ));
            for op in &service.operations {
                out.line(format!(
                    "{}: {}.NewOperationReference[{}, {}](\"{}\"),",
                    op.ident,
                    rt,
                    op.input,
                    op.output,
                    escape_string(&op.wire_name)
                ));
            }
        });
        out.line("}");
    }
}

/// Assigns package aliases, numbering duplicates of a base name from 1.
struct IndexAliasMap {
    by_path: indexmap::IndexMap<String, String>,
    used: HashSet<String>,
}

impl IndexAliasMap {
    fn new(reserved: &str) -> Self {
        let mut used = HashSet::new();
        used.insert(reserved.to_string());
        Self {
            by_path: indexmap::IndexMap::new(),
            used,
        }
    }

    fn claim(&mut self, path: &str) -> String {
        if let Some(alias) = self.by_path.get(path) {
            return alias.clone();
        }
        let base = package_base(path).to_string();
        let mut alias = base.clone();
        let mut number = 0usize;
        while self.used.contains(&alias) {
            number += 1;
            alias = format!("{}{}", base, number);
        }
        self.used.insert(alias.clone());
        self.by_path.insert(path.to_string(), alias.clone());
        alias
    }
}

fn package_base(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn import_line(path: &str, alias: &str) -> String {
    if alias == package_base(path) {
        format!("import \"{}\"", escape_string(path))
    } else {
        format!("import {} \"{}\"", alias, escape_string(path))
    }
}

/// Renderer for the generated data types.
struct GoRenderer {
    plan: TypePlan,
    primitive_pointers: bool,
}

impl TypeRenderer for GoRenderer {
    fn emit_types(&mut self, out: &mut SourceWriter) -> Result<()> {
        for decl in &self.plan.decls {
            out.ensure_blank();
            comment(out, decl.description.as_deref());
            match &decl.kind {
                TypeKind::Object { fields } => {
                    out.line(format!("type {} struct {{", decl.name));
                    out.indented(|out| {
                        for field in fields {
                            comment(out, field.description.as_deref());
                            out.line(self.field_line(&decl.name, field));
                        }
                    });
                    out.line("}");
                }
                TypeKind::StringEnum { values } => {
                    out.line(format!("type {} string", decl.name));
                    out.blank();
                    out.line("const (");
                    out.indented(|out| {
                        for value in values {
                            out.line(format!(
                                "{}{} {} = \"{}\"",
                                decl.name,
                                pascal_ident(value),
                                decl.name,
                                escape_string(value)
                            ));
                        }
                    });
                    out.line(")");
                }
                TypeKind::Alias { target } => {
                    out.line(format!("type {} = {}", decl.name, go_type(target)));
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

impl GoRenderer {
    fn field_line(&self, type_name: &str, field: &crate::render::FieldDecl) -> String {
        let ident = pascal_ident(&field.json_name);
        let base = go_type(&field.field_type);
        let pointer = !field.required
            && match field.field_type {
                FieldType::Named(_) => true,
                FieldType::String
                | FieldType::Float
                | FieldType::Int
                | FieldType::Bool => self.primitive_pointers,
                FieldType::Any | FieldType::Array(_) => false,
            };
        let go = if pointer { format!("*{}", base) } else { base };
        let tag = if field.required {
            format!("`json:\"{}\"`", field.json_name)
        } else {
            format!("`json:\"{},omitempty\"`", field.json_name)
        };
        // Self-referential value fields would be infinitely sized.
        let go = if !pointer && field.field_type == FieldType::Named(type_name.to_string()) {
            format!("*{}", go)
        } else {
            go
        };
        format!("{} {} {}", ident, go, tag)
    }
}

fn go_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "string".to_string(),
        FieldType::Float => "float64".to_string(),
        FieldType::Int => "int64".to_string(),
        FieldType::Bool => "bool".to_string(),
        FieldType::Any => "interface{}".to_string(),
        FieldType::Array(inner) => format!("[]{}", go_type(inner)),
        FieldType::Named(name) => name.clone(),
    }
}

fn comment(out: &mut SourceWriter, description: Option<&str>) {
    if let Some(lines) = wrap_description(description) {
        out.comment_lines("//", lines.iter().map(String::as_str));
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_numbering_starts_at_one() {
        let mut aliases = IndexAliasMap::new("rpc");
        assert_eq!(aliases.claim("example.com/a/widgets"), "widgets");
        assert_eq!(aliases.claim("example.com/b/widgets"), "widgets1");
        // Same path yields the same alias.
        assert_eq!(aliases.claim("example.com/a/widgets"), "widgets");
    }

    #[test]
    fn test_runtime_alias_is_reserved() {
        let mut aliases = IndexAliasMap::new("rpc");
        assert_eq!(aliases.claim("example.com/other/rpc"), "rpc1");
    }

    #[test]
    fn test_split_existing_marker() {
        let backend = GoBackend::new(GoConfig::default());
        assert_eq!(
            backend.split_existing("example.com/pkg.Thing"),
            (Some("example.com/pkg".to_string()), "Thing".to_string())
        );
        assert_eq!(backend.split_existing("Local"), (None, "Local".to_string()));
    }

    #[test]
    fn test_go_type_forms() {
        assert_eq!(go_type(&FieldType::Int), "int64");
        assert_eq!(
            go_type(&FieldType::Array(Box::new(FieldType::Named("User".into())))),
            "[]User"
        );
    }
}
