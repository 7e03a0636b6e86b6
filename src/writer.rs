//! Persisting a patched buffer.
//!
//! A file is rewritten only when the patch marked it modified, and then in a
//! single atomic replace: readers observe either the original or the new
//! content, never a partial write.

use crate::patch::PatchResult;
use crate::source::{fingerprint, SourceFile};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{path} changed on disk since it was read; refusing to overwrite")]
    ChangedOnDisk { path: PathBuf },

    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "WriteOutcome tells whether the file was rewritten"]
pub enum WriteOutcome {
    /// New content was written
    Written { path: PathBuf, bytes: usize },
    /// Patch did not modify the buffer; file left byte-identical
    Unchanged { path: PathBuf },
}

/// Write `result` over `source.path` if, and only if, it is modified.
pub fn write_if_modified(
    source: &SourceFile,
    result: &PatchResult,
) -> Result<WriteOutcome, WriteError> {
    if !result.modified {
        debug!(path = %source.path.display(), "Buffer not modified, skipping write");
        return Ok(WriteOutcome::Unchanged {
            path: source.path.clone(),
        });
    }

    let current = fs::read(&source.path)?;
    if fingerprint(&current) != source.fingerprint {
        return Err(WriteError::ChangedOnDisk {
            path: source.path.clone(),
        });
    }

    let content = result.content();
    atomic_write(&source.path, content.as_bytes())?;
    info!(path = %source.path.display(), bytes = content.len(), "Wrote patched file");

    Ok(WriteOutcome::Written {
        path: source.path.clone(),
        bytes: content.len(),
    })
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The tempfile lives in the target's directory so the rename stays on one
/// filesystem. Permissions of an existing target are carried over.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), WriteError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(WriteError::NoParent(path.to_path_buf())),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    // Coarse-grained filesystems may otherwise keep the old mtime.
    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}
