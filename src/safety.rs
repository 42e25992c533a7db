//! Safety checks for files the CLI writes.
//!
//! The only file written locally is the allocation report; these checks keep
//! it from clobbering a lineup.

use anyhow::{bail, Result};
use std::path::Path;

use crate::lineup::LINEUP_FILE;

/// Validates that a report path is safe to overwrite.
///
/// Checks:
/// - The file must have a `.json` extension
/// - It cannot be any of the provided source paths
/// - It cannot be named like a lineup file
pub fn validate_report_path(output: &Path, source_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    let is_json = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        bail!(
            "Safety check failed: report file '{}' must have a .json extension",
            output.display()
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: report '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if output_name == LINEUP_FILE {
        bail!(
            "Safety check failed: report '{}' would replace a festival lineup",
            output.display()
        );
    }

    Ok(())
}
