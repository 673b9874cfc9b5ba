//! The generate pipeline: introspect, build the type, render, write.

use std::path::PathBuf;

use tracing::debug;

use crate::codegen::{write_generated, CodeGenConfig, CodeGenerator};
use crate::introspect::{Introspector, TableTarget};
use crate::prelude::{GeneratedType, SqlizerError};

/// Generate the source file for one table and return its path
pub fn generate<I, G>(
    introspector: &mut I,
    target: &TableTarget,
    generator: &G,
    config: &CodeGenConfig,
) -> Result<PathBuf, SqlizerError>
where
    I: Introspector + ?Sized,
    G: CodeGenerator + ?Sized,
{
    let columns = introspector.introspect(target)?;

    let generated = GeneratedType::from_columns(&target.table, &columns);
    for attr in &generated.attributes {
        debug!(
            column = ?attr.name,
            sql_type = ?attr.sql_type,
            host_type = ?attr.host_type,
            "Attribute"
        );
    }

    let rendered = generator.render(&generated)?;
    write_generated(generator, &rendered, &generated, config)
}
