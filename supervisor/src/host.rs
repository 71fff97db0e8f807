//! Host surface - the supervisor's only channel to the user.
//!
//! The editor (or the CLI standing in for one) implements this trait.
//! Every failure the supervisor surfaces produces exactly one notification
//! through [`HostSurface::notify`] plus a log line.

use sidekick_types::BinaryIdentifier;

/// Severity of a user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Warning,
    Error,
}

#[allow(async_fn_in_trait)]
pub trait HostSurface {
    /// Ask permission to download and install the analyzer for the first
    /// time.
    async fn confirm_install(&self, identifier: &BinaryIdentifier) -> bool;

    /// Ask permission to replace the installed analyzer with a newer
    /// published build. Declining continues with the existing binary.
    async fn confirm_update(&self, identifier: &BinaryIdentifier) -> bool;

    /// Show a one-line, user-visible message.
    fn notify(&self, level: Notice, message: &str);
}
