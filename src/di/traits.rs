//! Trait definitions for dependency injection

use crate::core::RmuResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use crate::metadata::MetadataLoader;
pub use crate::resolver::ReleaseResolver;

/// Trait for configuration access
///
/// Provides read-only access to the settings the update pipeline needs.
/// Implementations should be thread-safe (Send + Sync).
pub trait ConfigProvider: Send + Sync {
    /// Upper bound on mods processed at the same time
    fn max_concurrent(&self) -> usize;

    /// Base type name that marks a mod entry class
    fn marker_type(&self) -> &str;

    /// Property on the entry class holding the repository URL
    fn link_property(&self) -> &str;

    /// Domain references must be hosted on
    fn hosting_domain(&self) -> &str;

    /// File-name prefix that opts a file out of updates
    fn skip_prefix(&self) -> &str;

    /// Extension of candidate binaries (without the dot)
    fn extension(&self) -> &str;

    /// Overall deadline for a run
    fn deadline(&self) -> Option<Duration>;
}

/// Trait for fetching candidate artifacts
///
/// Returns the raw bytes behind a download URL. A non-success status is an
/// error, which is how a missing asset on a synthesized URL is detected.
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    async fn download(&self, url: &str, cancel: &CancellationToken) -> RmuResult<Vec<u8>>;
}
