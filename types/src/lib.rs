//! Core domain types for Sidekick.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application.

mod error;
mod release;

pub use error::{InstallError, SupervisorError};
pub use release::{BinaryIdentifier, InstalledMetadata, ReleaseInfo};
