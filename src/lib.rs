//! # sqlizer
//!
//! Generate Rust types from SQL Server tables
//!
//! This crate provides a CLI tool and library for reading a table's
//! `INFORMATION_SCHEMA` metadata and generating a matching serde struct.

pub mod codegen;
pub mod config;
pub mod error;
pub mod introspect;
pub mod pipeline;
pub mod prompt;
pub mod schema;

pub mod prelude {
    pub use crate::codegen::{CodeGenConfig, CodeGenerator, RustGenerator};
    pub use crate::config::{ConfigFile, DbConfig};
    pub use crate::error::{Phase, SqlizerError};
    pub use crate::introspect::{Introspector, QueryExecutor, TableIntrospector, TableTarget};
    pub use crate::schema::{
        Attribute, ColumnMetadata, ConnectionParams, GeneratedType, HostType,
    };
}

#[cfg(feature = "mssql")]
pub use introspect::MssqlExecutor;
