//! Atomic file write via temp file + rename.
//!
//! Used for the metadata sidecar and the persisted-state file: a reader must
//! never observe a half-written value. On Windows, rename-over-existing
//! fails, so overwrites fall back to backup-and-restore to avoid losing the
//! previous content.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }

        // Windows fallback: move the existing file aside, persist, then
        // drop the backup. Restore on failure.
        let backup = path.with_extension("bak");
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;

        if let Err(persist_err) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(persist_err.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!(
                path = %backup.display(),
                "Failed to remove .bak after atomic write: {e}"
            );
        }
    }

    Ok(())
}
