//! Code generation
//!
//! This module turns a [`GeneratedType`] into source text for a target
//! language and writes it to disk.

use std::path::{Path, PathBuf};

use crate::prelude::{GeneratedType, SqlizerError};

pub mod output;
pub mod rust;

pub use output::write_generated;
pub use rust::RustGenerator;

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Directory the per-table output directory is created in
    pub output_root: PathBuf,
}

impl CodeGenConfig {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }
}

/// Trait for language-specific code generators
pub trait CodeGenerator {
    /// File extension of generated files, without the dot
    fn extension(&self) -> &'static str;

    /// Render the source text for one generated type
    fn render(&self, generated: &GeneratedType) -> Result<String, SqlizerError>;

    /// Reformat source text in the language's canonical style
    fn format(&self, source: &str) -> Result<String, SqlizerError>;

    /// Add missing imports and drop unused ones from the file at `path`
    fn normalize_imports(&self, path: &Path, source: &str) -> Result<String, SqlizerError>;
}
