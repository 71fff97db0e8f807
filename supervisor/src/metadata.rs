//! Sidecar metadata store.
//!
//! The sidecar lives at `<binary>.meta.json` and records the version tag and
//! publish timestamp of the binary currently on disk. A missing or malformed
//! sidecar reads as absent - malformed content is logged, never fatal, so a
//! corrupt sidecar can never block supervision.

use std::io;
use std::path::{Path, PathBuf};

use sidekick_types::InstalledMetadata;

pub struct MetadataStore;

impl MetadataStore {
    /// Path of the sidecar for a given binary: the full filename plus
    /// `.meta.json`, so `analyzer-linux-x86_64` maps to
    /// `analyzer-linux-x86_64.meta.json`.
    #[must_use]
    pub fn sidecar_path(binary_path: &Path) -> PathBuf {
        let mut name = binary_path.as_os_str().to_os_string();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// Read the sidecar for `binary_path`. `None` means "no tracked
    /// metadata": the file is missing or its content is malformed.
    #[must_use]
    pub fn read(binary_path: &Path) -> Option<InstalledMetadata> {
        let path = Self::sidecar_path(binary_path);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read metadata sidecar: {e}");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "Malformed metadata sidecar, treating as absent: {e}"
                );
                None
            }
        }
    }

    /// Atomically overwrite the sidecar for `binary_path`.
    ///
    /// A completed binary install is not rolled back when this fails; the
    /// caller logs the failure and tolerates the divergence window.
    pub fn write(binary_path: &Path, metadata: &InstalledMetadata) -> io::Result<()> {
        let path = Self::sidecar_path(binary_path);
        let json = serde_json::to_vec_pretty(metadata)?;
        sidekick_utils::atomic_write(&path, &json)
    }
}
