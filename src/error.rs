use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// sqlizer errors
#[derive(Error, Debug)]
pub enum SqlizerError {
    #[error("Failed to connect to database server: {0}")]
    Connection(String),

    #[error("Database '{database}' does not exist")]
    DatabaseNotFound { database: String },

    #[error("Table '{table}' does not exist in catalog '{catalog}'")]
    TableNotFound { table: String, catalog: String },

    #[error("Query failed while {step}: {message}")]
    Query { step: &'static str, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Generated code is not valid Rust: {0}")]
    Format(String),

    #[error("Output directory {} already exists", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Failed to normalize imports in {}: {message}", path.display())]
    ImportNormalization { path: PathBuf, message: String },

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The stage of a command a failure belongs to, used in user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Connecting,
    ReadingTable,
    Generating,
    Writing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Phase::Configuring => "configuring",
            Phase::Connecting => "connecting",
            Phase::ReadingTable => "reading table",
            Phase::Generating => "generating",
            Phase::Writing => "writing",
        };
        f.write_str(phase)
    }
}

impl SqlizerError {
    pub fn phase(&self) -> Phase {
        match self {
            SqlizerError::Config(_) => Phase::Configuring,
            SqlizerError::Connection(_) => Phase::Connecting,
            SqlizerError::DatabaseNotFound { .. }
            | SqlizerError::TableNotFound { .. }
            | SqlizerError::Query { .. } => Phase::ReadingTable,
            SqlizerError::Template(_) | SqlizerError::Format(_) => Phase::Generating,
            SqlizerError::DirectoryExists(_)
            | SqlizerError::ImportNormalization { .. }
            | SqlizerError::FileWrite { .. } => Phase::Writing,
        }
    }

    /// Whether the generated file may have been left on disk
    pub fn is_partial_write(&self) -> bool {
        matches!(self, SqlizerError::ImportNormalization { .. })
    }
}
