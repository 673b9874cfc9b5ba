//! Writing generated code to disk

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codegen::{CodeGenConfig, CodeGenerator};
use crate::error::SqlizerError;
use crate::schema::GeneratedType;

/// Format `rendered` and write it to `<root>/<module>/<module>.<ext>`.
///
/// The per-table directory must not exist yet. Once the file is written,
/// imports are normalized in place; a failure there leaves the formatted file
/// on disk and returns [`SqlizerError::ImportNormalization`].
pub fn write_generated<G: CodeGenerator + ?Sized>(
    generator: &G,
    rendered: &str,
    generated: &GeneratedType,
    config: &CodeGenConfig,
) -> Result<PathBuf, SqlizerError> {
    let formatted = generator.format(rendered)?;

    let module = generated.module_name();
    let dir = config.output_root.join(&module);
    create_output_dir(&dir)?;
    debug!(path = ?dir, "Created output directory");

    let file_path = dir.join(format!("{}.{}", module, generator.extension()));
    fs::write(&file_path, &formatted).map_err(|source| SqlizerError::FileWrite {
        path: file_path.clone(),
        source,
    })?;
    debug!(path = ?file_path, "Wrote formatted source");

    normalize_in_place(generator, &file_path).inspect_err(|e| {
        warn!(path = ?file_path, error = %e, "Generated file left without import normalization");
    })?;

    info!(path = ?file_path, "Generated file written");
    Ok(file_path)
}

fn create_output_dir(dir: &Path) -> Result<(), SqlizerError> {
    match fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(SqlizerError::DirectoryExists(dir.to_path_buf()))
        }
        Err(source) => Err(SqlizerError::FileWrite {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Re-read the written file, normalize its imports and replace it atomically
fn normalize_in_place<G: CodeGenerator + ?Sized>(
    generator: &G,
    file_path: &Path,
) -> Result<(), SqlizerError> {
    let import_error = |message: String| SqlizerError::ImportNormalization {
        path: file_path.to_path_buf(),
        message,
    };

    let source = fs::read_to_string(file_path)
        .map_err(|e| import_error(format!("Failed to re-read file: {}", e)))?;

    let normalized = generator.normalize_imports(file_path, &source)?;

    let permissions = fs::metadata(file_path)
        .map_err(|e| import_error(format!("Failed to read file metadata: {}", e)))?
        .permissions();

    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| import_error(format!("Failed to create temp file: {}", e)))?;
    tmp.write_all(normalized.as_bytes())
        .map_err(|e| import_error(format!("Failed to write temp file: {}", e)))?;
    // Temp files are created owner-only; keep the mode of the file being replaced
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(|e| import_error(format!("Failed to copy permissions: {}", e)))?;
    tmp.persist(file_path)
        .map_err(|e| import_error(format!("Failed to replace file: {}", e.error)))?;

    Ok(())
}
