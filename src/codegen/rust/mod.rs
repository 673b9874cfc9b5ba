//! Rust code generator
//!
//! Generates one serde-enabled struct per table.

use std::collections::HashSet;
use std::path::Path;

use minijinja::Environment;
use tracing::{debug, info};

use crate::codegen::CodeGenerator;
use crate::error::SqlizerError;
use crate::schema::{to_field_ident, Attribute, GeneratedType, HostType};

mod imports;

/// Rust code generator
pub struct RustGenerator {
    env: Environment<'static>,
}

impl RustGenerator {
    pub fn new() -> Result<Self, SqlizerError> {
        let mut env = Environment::new();

        env.add_template("struct", include_str!("templates/struct.rs.jinja"))
            .map_err(|e| SqlizerError::Template(format!("Failed to load struct template: {}", e)))?;

        Ok(Self { env })
    }
}

impl CodeGenerator for RustGenerator {
    fn extension(&self) -> &'static str {
        "rs"
    }

    fn render(&self, generated: &GeneratedType) -> Result<String, SqlizerError> {
        info!(
            table = ?generated.table_name,
            attributes = generated.attributes.len(),
            "Rendering Rust struct"
        );

        let template = self
            .env
            .get_template("struct")
            .map_err(|e| SqlizerError::Template(format!("Template error: {}", e)))?;

        let ctx = build_type_context(generated);

        template
            .render(ctx)
            .map_err(|e| SqlizerError::Template(format!("Render error: {}", e)))
    }

    fn format(&self, source: &str) -> Result<String, SqlizerError> {
        let file = syn::parse_file(source).map_err(|e| SqlizerError::Format(e.to_string()))?;
        Ok(prettyplease::unparse(&file))
    }

    fn normalize_imports(&self, path: &Path, source: &str) -> Result<String, SqlizerError> {
        let normalized =
            imports::normalize(source).map_err(|message| SqlizerError::ImportNormalization {
                path: path.to_path_buf(),
                message,
            })?;
        debug!(path = ?path, "Normalized imports");
        Ok(normalized)
    }
}

/// Build template context for a generated type
fn build_type_context(generated: &GeneratedType) -> minijinja::Value {
    let mut seen = HashSet::new();
    let fields: Vec<_> = generated
        .attributes
        .iter()
        .map(|attr| build_field_context(attr, unique_ident(attr, &mut seen)))
        .collect();

    minijinja::context! {
        table_name => &generated.table_name,
        type_name => struct_name(generated),
        fields => fields,
    }
}

/// Names the generated file itself refers to
const EMITTED_TYPE_NAMES: &[&str] = &["String", "Vec", "Debug", "Clone", "PartialEq"];

/// Struct name for the table, suffixed when it would shadow a name the file uses
fn struct_name(generated: &GeneratedType) -> String {
    let name = generated.type_name();
    let clashes = EMITTED_TYPE_NAMES.contains(&name.as_str())
        || imports::KNOWN_IMPORTS.iter().any(|(ident, _)| *ident == name);
    if clashes {
        format!("{}Record", name)
    } else {
        name
    }
}

/// Build template context for one field
fn build_field_context(attr: &Attribute, ident: String) -> minijinja::Value {
    minijinja::context! {
        ident => ident,
        tag_literal => format!("{:?}", attr.serde_tag()),
        rust_type => attr.host_type.map(rust_type),
        sql_type => &attr.sql_type,
    }
}

/// Field identifier that does not collide with earlier fields
fn unique_ident(attr: &Attribute, seen: &mut HashSet<String>) -> String {
    let base = to_field_ident(&attr.name);
    let mut ident = base.clone();
    let mut n = 2;
    while !seen.insert(ident.clone()) {
        ident = format!("{}_{}", base, n);
        n += 1;
    }
    ident
}

/// Convert HostType to Rust type string
fn rust_type(host_type: HostType) -> &'static str {
    match host_type {
        HostType::Text => "String",
        HostType::Int64 => "i64",
        HostType::Float64 => "f64",
        HostType::Boolean => "bool",
        HostType::Timestamp => "NaiveDateTime",
        HostType::Bytes => "Vec<u8>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnMetadata;
    use quote::ToTokens;

    fn users() -> GeneratedType {
        GeneratedType::from_columns(
            "Users",
            &[
                ColumnMetadata::new("Users", "Id", 1, "int"),
                ColumnMetadata::new("Users", "Name", 2, "varchar"),
                ColumnMetadata::new("Users", "CreatedAt", 3, "datetime"),
            ],
        )
    }

    /// (field ident, type tokens, attribute tokens) for every field
    fn struct_fields(source: &str) -> (String, Vec<(String, String, String)>) {
        let file = syn::parse_file(source).unwrap();
        let item = file
            .items
            .iter()
            .find_map(|item| match item {
                syn::Item::Struct(s) => Some(s),
                _ => None,
            })
            .unwrap();
        let fields = item
            .fields
            .iter()
            .map(|f| {
                let ident = f.ident.as_ref().unwrap().to_string();
                let ty = quote_tokens(&f.ty);
                let attrs = f
                    .attrs
                    .iter()
                    .filter(|a| a.path().is_ident("serde"))
                    .map(|a| quote_tokens(&a.meta))
                    .collect::<Vec<_>>()
                    .join(" ");
                (ident, ty, attrs)
            })
            .collect();
        (item.ident.to_string(), fields)
    }

    fn quote_tokens<T: ToTokens>(node: &T) -> String {
        node.to_token_stream().to_string()
    }

    #[test]
    fn test_rust_type() {
        assert_eq!(rust_type(HostType::Text), "String");
        assert_eq!(rust_type(HostType::Int64), "i64");
        assert_eq!(rust_type(HostType::Float64), "f64");
        assert_eq!(rust_type(HostType::Boolean), "bool");
        assert_eq!(rust_type(HostType::Timestamp), "NaiveDateTime");
        assert_eq!(rust_type(HostType::Bytes), "Vec<u8>");
    }

    #[test]
    fn test_render_users() {
        let generator = RustGenerator::new().unwrap();
        let source = generator.render(&users()).unwrap();

        assert!(source.contains("pub struct Users {"));
        assert!(source.contains("#[serde(rename = \"id\")]"));
        assert!(source.contains("pub id: i64,"));
        assert!(source.contains("#[serde(rename = \"name\")]"));
        assert!(source.contains("pub name: String,"));
        assert!(source.contains("#[serde(rename = \"createdat\")]"));
        assert!(source.contains("pub created_at: NaiveDateTime,"));

        let id = source.find("pub id").unwrap();
        let name = source.find("pub name").unwrap();
        let created = source.find("pub created_at").unwrap();
        assert!(id < name && name < created);
    }

    #[test]
    fn test_formatted_users_struct() {
        let generator = RustGenerator::new().unwrap();
        let formatted = generator
            .format(&generator.render(&users()).unwrap())
            .unwrap();

        let (name, fields) = struct_fields(&formatted);
        assert_eq!(name, "Users");
        let idents: Vec<_> = fields.iter().map(|(i, _, _)| i.as_str()).collect();
        assert_eq!(idents, vec!["id", "name", "created_at"]);
        assert_eq!(fields[0].1, "i64");
        assert_eq!(fields[1].1, "String");
        assert_eq!(fields[2].1, "NaiveDateTime");
        assert!(fields[2].2.contains("\"createdat\""));
    }

    #[test]
    fn test_render_unmapped_column() {
        let generated = GeneratedType::from_columns(
            "Profiles",
            &[
                ColumnMetadata::new("Profiles", "Id", 1, "int"),
                ColumnMetadata::new("Profiles", "Payload", 2, "xml"),
            ],
        );
        let generator = RustGenerator::new().unwrap();

        let source = generator.render(&generated).unwrap();
        assert!(source.contains("Unmapped SQL type `xml`"));

        let formatted = generator.format(&source).unwrap();
        let (_, fields) = struct_fields(&formatted);
        assert_eq!(fields[1].0, "payload");
        assert_eq!(fields[1].1, "()");
        assert!(fields[1].2.contains("skip"));
        assert!(fields[1].2.contains("\"payload\""));
    }

    #[test]
    fn test_render_empty_table() {
        let generator = RustGenerator::new().unwrap();
        let source = generator
            .render(&GeneratedType::from_columns("Empty", &[]))
            .unwrap();
        let formatted = generator.format(&source).unwrap();

        let (name, fields) = struct_fields(&formatted);
        assert_eq!(name, "Empty");
        assert!(fields.is_empty());
    }

    #[test]
    fn test_colliding_idents_are_suffixed() {
        let generated = GeneratedType::from_columns(
            "Odd",
            &[
                ColumnMetadata::new("Odd", "UserId", 1, "int"),
                ColumnMetadata::new("Odd", "user_id", 2, "int"),
            ],
        );
        let generator = RustGenerator::new().unwrap();
        let formatted = generator
            .format(&generator.render(&generated).unwrap())
            .unwrap();

        let (_, fields) = struct_fields(&formatted);
        assert_eq!(fields[0].0, "user_id");
        assert_eq!(fields[1].0, "user_id_2");
    }

    #[test]
    fn test_tag_with_quote_is_escaped() {
        let generated = GeneratedType::from_columns(
            "Odd",
            &[ColumnMetadata::new("Odd", "Say\"Hi", 1, "varchar")],
        );
        let generator = RustGenerator::new().unwrap();

        assert!(generator.format(&generator.render(&generated).unwrap()).is_ok());
    }

    #[test]
    fn test_struct_name_avoids_used_names() {
        for (table, expected) in [
            ("Serialize", "SerializeRecord"),
            ("String", "StringRecord"),
            ("naive_date_time", "NaiveDateTimeRecord"),
            ("Users", "Users"),
        ] {
            let generated = GeneratedType::from_columns(table, &[]);
            assert_eq!(struct_name(&generated), expected);
        }
    }

    #[test]
    fn test_clashing_table_name_keeps_imports_usable() {
        let generated = GeneratedType::from_columns(
            "Serialize",
            &[ColumnMetadata::new("Serialize", "Name", 1, "varchar")],
        );
        let generator = RustGenerator::new().unwrap();
        let formatted = generator
            .format(&generator.render(&generated).unwrap())
            .unwrap();
        let normalized = generator
            .normalize_imports(Path::new("serialize.rs"), &formatted)
            .unwrap();

        let (name, fields) = struct_fields(&normalized);
        assert_eq!(name, "SerializeRecord");
        assert_eq!(fields[0].1, "String");
        assert!(normalized.contains("use serde::{Deserialize, Serialize};"));
    }

    #[test]
    fn test_format_rejects_invalid_syntax() {
        let generator = RustGenerator::new().unwrap();
        let err = generator.format("pub struct {").unwrap_err();
        assert!(matches!(err, SqlizerError::Format(_)));
    }
}
