//! Atomic file writes for generated site artifacts.
//!
//! Generated pages are written with the temp + fsync + rename protocol: a
//! crash at any point leaves either the old complete file or the new
//! complete file on disk, never a partial page that the static mounts would
//! happily serve.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Write `bytes` to `path` atomically.
///
/// The parent directory is created if missing. Data lands in a temp file in
/// the same directory, is fsynced, and is renamed over the final path; on
/// Unix the parent directory is fsynced afterwards so the rename itself is
/// durable.
///
/// # Errors
///
/// Returns the underlying I/O error. The final path is untouched on failure.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path has no parent directory: {}", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|persist_error| persist_error.error)?;

    #[cfg(unix)]
    fs::File::open(parent)?.sync_all()?;

    Ok(())
}
