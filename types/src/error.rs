//! Error taxonomy for provisioning and supervision.
//!
//! Only [`SupervisorError::Unsupported`] is allowed to short-circuit a whole
//! supervision run. Network unavailability and malformed metadata never cross
//! component boundaries as errors - those components degrade to `None`/`false`
//! and log instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Host platform is outside the support matrix. Fatal for the run,
    /// surfaced once, never retried.
    #[error("unsupported platform: {os}/{arch}")]
    Unsupported { os: String, arch: String },

    /// Could not make the binary executable.
    #[error("failed to set execute permission on {path}: {source}")]
    PermissionDenied { path: PathBuf, source: io::Error },

    /// The analyzer process could not be spawned.
    #[error("failed to spawn {path}: {source}")]
    Spawn { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Failures from the binary installer.
///
/// A failed install leaves any pre-existing binary and its sidecar
/// untouched; the error only reports why no new binary landed.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The release channel was unreachable or answered non-2xx.
    #[error("could not download analyzer: {0}")]
    Network(String),

    /// The download stream broke mid-transfer.
    #[error("analyzer download interrupted: {0}")]
    Download(String),

    /// Local filesystem failure while staging or placing the binary.
    #[error("install failed: {0}")]
    Io(#[from] io::Error),
}
