//! Release and installation value types.
//!
//! [`ReleaseInfo`] is what the release channel reports for the latest
//! published analyzer build; [`InstalledMetadata`] is the sidecar mirror of
//! that information for the binary currently on disk. Both are immutable
//! values - comparison logic lives in the supervisor crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical name of the platform-specific analyzer artifact.
///
/// Doubles as the release-asset name and the on-disk filename, e.g.
/// `analyzer-linux-x86_64` or `analyzer-windows-x86_64.exe`. Computed once
/// per run by platform resolution; opaque everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryIdentifier(String);

impl BinaryIdentifier {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinaryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The latest published release for one binary identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    tag_name: String,
    published_at: DateTime<Utc>,
}

impl ReleaseInfo {
    #[must_use]
    pub fn new(tag_name: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            tag_name: tag_name.into(),
            published_at,
        }
    }

    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    #[must_use]
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Sidecar metadata persisted next to the installed binary.
///
/// Wire shape is exactly `{"updated_at": <rfc3339>, "tag_name": <string>}`;
/// the sidecar lives at `<binary>.meta.json`. Absence means "never
/// successfully installed with tracked metadata", which is distinct from
/// "binary present but untracked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMetadata {
    updated_at: DateTime<Utc>,
    tag_name: String,
}

impl InstalledMetadata {
    #[must_use]
    pub fn new(tag_name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            tag_name: tag_name.into(),
        }
    }

    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl From<&ReleaseInfo> for InstalledMetadata {
    fn from(release: &ReleaseInfo) -> Self {
        Self {
            updated_at: release.published_at,
            tag_name: release.tag_name.clone(),
        }
    }
}
