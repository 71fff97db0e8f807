//! Update decision.

use std::path::Path;

use sidekick_types::BinaryIdentifier;

use crate::metadata::MetadataStore;
use crate::release::ReleaseClient;

/// Whether a newer analyzer build than the installed one is published.
///
/// Pure decision over two external reads, no side effects: it never writes
/// metadata or triggers a download.
///
/// - No tracked metadata: `false`. A binary without a sidecar is freshly
///   installed or externally managed; don't nag.
/// - Release channel unreachable: `false`. Never block startup on the
///   network.
/// - Otherwise `true` iff the remote publish timestamp is strictly newer
///   than the local one - equal timestamps are not an update.
pub async fn should_update(
    client: &ReleaseClient,
    binary_path: &Path,
    identifier: &BinaryIdentifier,
) -> bool {
    let Some(local) = MetadataStore::read(binary_path) else {
        tracing::debug!(path = %binary_path.display(), "No tracked metadata, skipping update check");
        return false;
    };

    let Some(remote) = client.fetch_latest(identifier).await else {
        tracing::debug!("Release info unavailable, keeping current binary");
        return false;
    };

    remote.published_at() > local.updated_at()
}
