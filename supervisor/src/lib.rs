//! Analyzer provisioning and supervision.
//!
//! This crate owns the binary provisioning and update state machine: it
//! resolves the platform-specific artifact, installs it on first use from
//! the rolling release channel, decides when a newer build is available,
//! and supervises the single running analyzer process.
//!
//! The editor-facing surface (prompts, notifications) is abstracted behind
//! [`HostSurface`]; the spawned process's stdio protocol is opaque here.

mod host;
mod installer;
mod metadata;
mod platform;
mod release;
mod state;
mod supervisor;
mod transport;
mod update;

pub use host::{HostSurface, Notice};
pub use installer::BinaryInstaller;
pub use metadata::MetadataStore;
pub use platform::resolve_binary_identifier;
pub use release::{ReleaseChannel, ReleaseClient};
pub use state::{StateStore, StoragePaths};
pub use supervisor::{ProcessSupervisor, SupervisorState};
pub use transport::TransportEvent;
pub use update::should_update;
