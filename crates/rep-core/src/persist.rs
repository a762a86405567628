//! JSON file persistence.

use crate::{RepError, Result};
use rep_types::ExportFile;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `value` as indented JSON so readers never see a partial file.
///
/// The data goes to a temp file in the target directory which is then
/// renamed over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let data = serde_json::to_vec_pretty(value)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    set_readable(&tmp)?;
    tmp.persist(path).map_err(|e| RepError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::trace!(target: "rep::store", "Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

#[cfg(unix)]
fn set_readable(tmp: &NamedTempFile) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_readable(_tmp: &NamedTempFile) -> Result<()> {
    Ok(())
}

/// Load a capture agent export file.
pub fn read_export(path: &Path) -> Result<ExportFile> {
    let content = std::fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}
