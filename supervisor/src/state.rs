//! Storage layout and persisted process-wide state.
//!
//! Everything Sidekick owns on disk lives under one root directory
//! (`$SIDEKICK_HOME`, defaulting to `~/.sidekick`): the managed binary under
//! `bin/`, the persisted-state file, and logs. The only persisted state is
//! the optional custom binary path; it is written atomically and survives
//! restarts until explicitly cleared.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sidekick_types::BinaryIdentifier;

const STATE_FILE: &str = "state.json";

/// Root-anchored paths for everything Sidekick persists.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root from `$SIDEKICK_HOME` or `~/.sidekick`. `None` only when
    /// the home directory cannot be determined.
    #[must_use]
    pub fn discover() -> Option<Self> {
        if let Some(home) = std::env::var_os("SIDEKICK_HOME") {
            return Some(Self::new(PathBuf::from(home)));
        }
        dirs::home_dir().map(|home| Self::new(home.join(".sidekick")))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Default on-disk location for the managed binary, keyed by its
    /// identifier.
    #[must_use]
    pub fn default_binary_path(&self, identifier: &BinaryIdentifier) -> PathBuf {
        self.bin_dir().join(identifier.as_str())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_binary_path: Option<PathBuf>,
}

/// Persisted process-wide state with explicit set/clear operations.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: PersistedState,
}

impl StateStore {
    /// Load persisted state. A missing file is a fresh state; a malformed
    /// file is logged and treated as fresh.
    #[must_use]
    pub fn load(paths: &StoragePaths) -> Self {
        let path = paths.state_file();
        let state = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Malformed state file, resetting: {e}");
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read state file: {e}");
                PersistedState::default()
            }
        };
        Self { path, state }
    }

    /// The user-chosen override path, if any. Callers still check that the
    /// file exists before honoring it.
    #[must_use]
    pub fn custom_binary_path(&self) -> Option<&Path> {
        self.state.custom_binary_path.as_deref()
    }

    pub fn set_custom_binary_path(&mut self, path: PathBuf) -> io::Result<()> {
        self.state.custom_binary_path = Some(path);
        self.persist()
    }

    pub fn clear_custom_binary_path(&mut self) -> io::Result<()> {
        self.state.custom_binary_path = None;
        self.persist()
    }

    fn persist(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.state)?;
        sidekick_utils::atomic_write(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::{StateStore, StoragePaths};
    use sidekick_types::BinaryIdentifier;
    use std::path::PathBuf;

    #[test]
    fn default_binary_path_lives_under_bin() {
        let paths = StoragePaths::new("/data/sidekick");
        let id = BinaryIdentifier::new("analyzer-linux-x86_64");
        assert_eq!(
            paths.default_binary_path(&id),
            PathBuf::from("/data/sidekick/bin/analyzer-linux-x86_64")
        );
    }

    #[test]
    fn fresh_store_has_no_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateStore::load(&StoragePaths::new(dir.path()));
        assert!(store.custom_binary_path().is_none());
    }

    #[test]
    fn override_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());

        let mut store = StateStore::load(&paths);
        store
            .set_custom_binary_path(PathBuf::from("/usr/local/bin/analyzer"))
            .expect("set");

        let reloaded = StateStore::load(&paths);
        assert_eq!(
            reloaded.custom_binary_path(),
            Some(std::path::Path::new("/usr/local/bin/analyzer"))
        );
    }

    #[test]
    fn clear_removes_the_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());

        let mut store = StateStore::load(&paths);
        store
            .set_custom_binary_path(PathBuf::from("/tmp/analyzer"))
            .expect("set");
        store.clear_custom_binary_path().expect("clear");

        let reloaded = StateStore::load(&paths);
        assert!(reloaded.custom_binary_path().is_none());
    }

    #[test]
    fn malformed_state_file_resets_to_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StoragePaths::new(dir.path());
        std::fs::write(dir.path().join("state.json"), b"{ bad").expect("write");

        let store = StateStore::load(&paths);
        assert!(store.custom_binary_path().is_none());
    }
}
