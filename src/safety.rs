//! Output path checks for files the CLI writes.
//!
//! A report or catalog written over an input playlist or catalog destroys
//! the user's data, so outputs must be recognizably outputs.

use anyhow::{bail, Result};
use std::path::Path;

/// Input file kinds that must never be overwritten by an output.
const INPUT_EXTENSIONS: [&str; 4] = ["m3u", "m3u8", "sqlite", "sqlite3"];

/// Validates that an output path is safe to overwrite.
///
/// - the file name contains `required_pattern` ("report", "catalog")
/// - the extension is `required_extension`
/// - the path is none of `source_paths`, also after resolving symlinks when
///   the output is itself a playlist or database file
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    required_extension: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    if extension != required_extension {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            required_extension
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if !INPUT_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(());
    }

    // Databases as outputs: refuse an existing file that is also being read
    for source in source_paths {
        if let (Ok(a), Ok(b)) = (output.canonicalize(), source.canonicalize()) {
            if a == b {
                bail!(
                    "Safety check failed: output '{}' resolves to source '{}'",
                    output.display(),
                    source.display()
                );
            }
        }
    }

    Ok(())
}
