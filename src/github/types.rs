//! GitHub API type definitions

use serde::{Deserialize, Serialize};

/// GitHub release information
///
/// `tag_name` and `assets` are required; a response without them is rejected
/// as malformed rather than read as an empty release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub assets: Vec<ReleaseAsset>,
}

/// GitHub release asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl GitHubRelease {
    /// Asset whose name equals `file_name` exactly (case-sensitive)
    pub fn find_asset(&self, file_name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == file_name)
    }
}
