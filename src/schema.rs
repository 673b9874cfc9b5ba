//! Schema data structures
//!
//! These types represent table metadata read from `INFORMATION_SCHEMA` and form
//! the contract between introspection (produces) and code generation (consumes).

use tracing::warn;

/// Connection parameters for a SQL Server instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// One row of `INFORMATION_SCHEMA.COLUMNS`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMetadata {
    pub table_catalog: String,
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    /// 1-based position of the column within its table
    pub ordinal_position: i32,
    pub column_default: Option<String>,
    pub is_nullable: bool,
    pub data_type: String,
    pub character_maximum_length: Option<i32>,
    pub character_octet_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_precision_radix: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub datetime_precision: Option<i32>,
    pub character_set_catalog: Option<String>,
    pub character_set_schema: Option<String>,
    pub character_set_name: Option<String>,
    pub collation_catalog: Option<String>,
    pub collation_schema: Option<String>,
    pub collation_name: Option<String>,
    pub domain_catalog: Option<String>,
    pub domain_schema: Option<String>,
    pub domain_name: Option<String>,
}

#[cfg(test)]
impl ColumnMetadata {
    /// Minimal column in the `dbo` schema, all optional facets unset
    pub(crate) fn new(table_name: &str, column_name: &str, ordinal_position: i32, data_type: &str) -> Self {
        Self {
            table_schema: "dbo".to_string(),
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            ordinal_position,
            data_type: data_type.to_string(),
            ..Default::default()
        }
    }
}

/// Output-side type a SQL column maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Text,
    Int64,
    Float64,
    Boolean,
    Timestamp,
    Bytes,
}

/// Fixed SQL Server type name to host type lookup
pub const MSSQL_TYPE_MAP: [(&str, HostType); 8] = [
    ("varchar", HostType::Text),
    ("nvarchar", HostType::Text),
    ("char", HostType::Text),
    ("int", HostType::Int64),
    ("float", HostType::Float64),
    ("bit", HostType::Boolean),
    ("datetime", HostType::Timestamp),
    ("binary", HostType::Bytes),
];

/// Map a SQL Server `DATA_TYPE` to its host type.
///
/// Types outside [`MSSQL_TYPE_MAP`] yield `None`; callers keep the column and
/// leave its type unset.
pub fn map_sql_type(data_type: &str) -> Option<HostType> {
    let trimmed = data_type.trim();
    MSSQL_TYPE_MAP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, host_type)| *host_type)
}

/// A generated field: column name plus its resolved type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub sql_type: String,
    pub host_type: Option<HostType>,
}

impl Attribute {
    pub fn from_column(column: &ColumnMetadata) -> Self {
        Self {
            name: column.column_name.clone(),
            sql_type: column.data_type.clone(),
            host_type: map_sql_type(&column.data_type),
        }
    }

    /// Serialized name of the field
    pub fn serde_tag(&self) -> String {
        self.name.to_lowercase()
    }
}

/// The type to generate for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType {
    pub table_name: String,
    /// Attributes in ascending ordinal position
    pub attributes: Vec<Attribute>,
}

impl GeneratedType {
    /// Build the generated type for `table_name` from its column rows.
    ///
    /// The name comes from the query subject, so an empty result still yields
    /// a named type.
    pub fn from_columns(table_name: &str, columns: &[ColumnMetadata]) -> Self {
        let mut ordered: Vec<&ColumnMetadata> = columns.iter().collect();
        ordered.sort_by_key(|col| col.ordinal_position);

        if let Some(first) = ordered.first() {
            if ordered.iter().any(|col| col.table_schema != first.table_schema) {
                warn!(
                    table = ?table_name,
                    "Columns span several schemas; pass --schema to pick one"
                );
            }
        }

        Self {
            table_name: table_name.to_string(),
            attributes: ordered.into_iter().map(Attribute::from_column).collect(),
        }
    }

    /// PascalCase type name derived from the table name
    pub fn type_name(&self) -> String {
        to_type_ident(&self.table_name)
    }

    /// Directory and file stem for the generated output
    pub fn module_name(&self) -> String {
        self.table_name.to_lowercase()
    }
}

/// Convert a table name to PascalCase
///
/// Every non-alphanumeric character acts as a word separator. The rest of each
/// word keeps its case, so `Users` stays `Users`.
pub fn to_pascal_case(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let first_upper = first.to_uppercase().to_string();
                    first_upper + chars.as_str()
                }
            }
        })
        .collect()
}

/// Valid Rust type identifier for a table name
pub fn to_type_ident(table_name: &str) -> String {
    let pascal = to_pascal_case(table_name);
    if pascal.is_empty() {
        return "Table".to_string();
    }
    if pascal.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("T{}", pascal);
    }
    if pascal == "Self" {
        return "Self_".to_string();
    }
    pascal
}

/// Valid Rust field identifier for a column name
pub fn to_field_ident(column_name: &str) -> String {
    use heck::ToSnakeCase;

    let snake: String = column_name
        .to_snake_case()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if snake.is_empty() || snake.chars().all(|c| c == '_') {
        return "field".to_string();
    }
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{}", snake);
    }
    match snake.as_str() {
        // Cannot be raw identifiers
        "self" | "super" | "crate" => format!("{}_", snake),
        kw if RUST_KEYWORDS.contains(&kw) => format!("r#{}", kw),
        _ => snake,
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe",
    "unsized", "use", "virtual", "where", "while", "yield",
];
