//! Crash-safe file output.
//!
//! Every artifact a stage hands to the next one is written through
//! [`write_atomic`]: the bytes go to a temporary file in the destination
//! directory, which is renamed over the target only once fully flushed.
//! Readers therefore see either the previous file or the complete new one.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{DemandError, Result};

/// Create the parent directory of `path` (and its ancestors) if absent.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| DemandError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write `path` atomically, creating its parent directory if needed.
///
/// `write` receives a buffered writer over the temporary file. If it fails
/// the temporary file is removed and `path` is left untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let io_err = |source: std::io::Error| DemandError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut buf = BufWriter::new(tmp.as_file_mut());
        write(&mut buf)?;
        buf.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    tracing::debug!(path = %path.display(), "artifact written");
    Ok(())
}
