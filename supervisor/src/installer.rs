//! Binary download and install.
//!
//! The artifact streams to a sibling staging file and only replaces the
//! destination on success, so a failed download never disturbs a working
//! installation; failed downloads remove their staging file. After the
//! binary lands, the execute bit is set (non-Windows) before anything could
//! spawn it, then the sidecar is written from a fresh release lookup. A
//! failed sidecar write - or an absent secondary lookup - leaves metadata
//! stale but does not fail the install; the divergence is logged.

use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use sidekick_types::{BinaryIdentifier, InstallError, InstalledMetadata};

use crate::metadata::MetadataStore;
use crate::release::{ReleaseClient, http_client};

pub struct BinaryInstaller {
    client: ReleaseClient,
}

impl BinaryInstaller {
    #[must_use]
    pub fn new(client: ReleaseClient) -> Self {
        Self { client }
    }

    /// Download `identifier` from the release channel and place it at
    /// `dest_path`.
    pub async fn install(
        &self,
        identifier: &BinaryIdentifier,
        dest_path: &Path,
    ) -> Result<(), InstallError> {
        let dir = dest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                InstallError::Io(io::Error::other("destination path has no parent directory"))
            })?;
        tokio::fs::create_dir_all(dir).await?;

        let url = self.client.channel().download_url(identifier);
        tracing::info!(%url, "Downloading analyzer");
        let response = http_client()
            .get(&url)
            .send()
            .await
            .map_err(|e| InstallError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::Network(format!("{url} answered {status}")));
        }

        let staging = staging_path(dest_path);
        if let Err(e) = stream_to_file(response, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        if let Err(e) = replace_file(&staging, dest_path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(InstallError::Io(e));
        }

        set_executable(dest_path)?;
        tracing::info!(path = %dest_path.display(), "Analyzer installed");

        // Two-step contract: the install has already succeeded; the sidecar
        // write may lag behind it.
        match self.client.fetch_latest(identifier).await {
            Some(release) => {
                if let Err(e) = MetadataStore::write(dest_path, &InstalledMetadata::from(&release))
                {
                    tracing::warn!("Failed to write metadata sidecar: {e}");
                }
            }
            None => {
                tracing::warn!("Release info unavailable after install; metadata left as-is");
            }
        }

        Ok(())
    }
}

/// Staging file next to the destination: `<dest>.partial`.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Stream the response body to `path` chunk by chunk - the artifact is
/// never buffered whole in memory.
async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), InstallError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| InstallError::Download(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| InstallError::Download(e.to_string()))?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Rename `staging` over `dest`. On Windows, rename-over-existing fails, so
/// overwrites fall back to backup-and-restore.
async fn replace_file(staging: &Path, dest: &Path) -> io::Result<()> {
    match tokio::fs::rename(staging, dest).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if !dest.exists() {
                return Err(err);
            }

            let backup = dest.with_extension("bak");
            let _ = tokio::fs::remove_file(&backup).await;
            tokio::fs::rename(dest, &backup).await?;

            if let Err(e) = tokio::fs::rename(staging, dest).await {
                let _ = tokio::fs::rename(&backup, dest).await;
                return Err(e);
            }
            let _ = tokio::fs::remove_file(&backup).await;
            Ok(())
        }
    }
}

#[cfg(unix)]
pub(crate) fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub(crate) fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
