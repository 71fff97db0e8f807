//! Host platform to binary identifier mapping.
//!
//! Supported matrix: {linux, macos} x {x86_64, aarch64}, plus windows on
//! x86_64 only. Anything else is a fatal, non-retryable condition for the
//! run - there is no fallback identifier.

use sidekick_types::{BinaryIdentifier, SupervisorError};

/// Resolve the analyzer artifact name for the host this process runs on.
pub fn resolve_binary_identifier() -> Result<BinaryIdentifier, SupervisorError> {
    identifier_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Pure mapping from (os, arch) to the canonical artifact name.
fn identifier_for(os: &str, arch: &str) -> Result<BinaryIdentifier, SupervisorError> {
    match (os, arch) {
        ("linux" | "macos", "x86_64" | "aarch64") => {
            Ok(BinaryIdentifier::new(format!("analyzer-{os}-{arch}")))
        }
        ("windows", "x86_64") => Ok(BinaryIdentifier::new(format!("analyzer-{os}-{arch}.exe"))),
        _ => Err(SupervisorError::Unsupported {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}
