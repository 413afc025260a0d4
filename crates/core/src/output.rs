//! Atomic artifact writes.
//!
//! Every file is written to a temporary file in its destination directory and
//! renamed over the final name only after all bytes were written, so an
//! aborted write never leaves a partial artifact under the real name.

use crate::error::EngineError;
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::Builder;

/// Creates `dir` and its parents.
pub fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))
}

/// Atomically replaces `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), EngineError> {
    write_atomic_with(path, |out| out.write_all(contents))
}

/// Atomically replaces `path` with whatever `fill` writes. If `fill` fails,
/// the temporary file is discarded and `path` is left untouched.
pub fn write_atomic_with<F>(path: &Path, fill: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut tmp = Builder::new()
        .prefix(".designmark")
        .tempfile_in(parent)
        .map_err(|e| EngineError::io(parent, e))?;

    fill(tmp.as_file_mut()).map_err(|e| EngineError::io(path, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| EngineError::io(path, e))?;

    tmp.persist(path)
        .map_err(|err| EngineError::io(path, err.error))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Atomically copies `source` to `target`.
pub fn copy_atomic(source: &Path, target: &Path) -> Result<(), EngineError> {
    let bytes = fs::read(source).map_err(|e| EngineError::io(source, e))?;
    write_atomic(target, &bytes)
}

/// Removes the plain files directly inside `dir`, leaving sub-directories
/// alone. A missing directory counts as clean. Returns the number removed.
pub fn clean_dir(dir: &Path) -> Result<usize, EngineError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EngineError::io(dir, e)),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| EngineError::io(&path, e))?;
        if file_type.is_file() {
            fs::remove_file(&path).map_err(|e| EngineError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}
