//! Persistence of the result mapping.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::AnalysisError;
use crate::models::ResultMapping;

/// Render the mapping as a JSON object indented with four spaces.
pub fn render_results(mapping: &ResultMapping) -> Result<Vec<u8>, AnalysisError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    mapping
        .serialize(&mut serializer)
        .map_err(|e| AnalysisError::schema(format!("failed to serialize results: {}", e)))?;
    Ok(buf)
}

/// Write the mapping to `path`, replacing whatever was there.
///
/// The content goes to a temporary file next to `path` first and is renamed
/// into place, so a failed write leaves the previous file untouched.
pub fn write_results(path: &Path, mapping: &ResultMapping) -> Result<(), AnalysisError> {
    let content = render_results(mapping)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        AnalysisError::output(format!("failed to create temp file in {}", dir.display()), e)
    })?;
    tmp.write_all(&content)
        .and_then(|_| tmp.flush())
        .map_err(|e| AnalysisError::output("failed to write results", e))?;
    tmp.persist(path).map_err(|e| {
        AnalysisError::output(format!("failed to write {}", path.display()), e.error)
    })?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
