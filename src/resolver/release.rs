use super::ReleaseResolver;
use crate::core::{RmuError, RmuResult};
use crate::extractor::RepositoryRef;
use crate::github::GitHubClient;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolves through the latest-release API
///
/// The asset must be named exactly like the local file. Anything else
/// (a zip, a differently cased name, a version suffix) is not a match.
pub struct LatestReleaseResolver {
    client: Arc<GitHubClient>,
}

impl LatestReleaseResolver {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseResolver for LatestReleaseResolver {
    fn name(&self) -> &'static str {
        "release"
    }

    async fn resolve(
        &self,
        repo: &RepositoryRef,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> RmuResult<String> {
        let release = self.client.get_latest_release(repo, cancel).await?;
        debug!("{} latest release is {}", repo, release.tag_name);

        release
            .find_asset(file_name)
            .map(|asset| asset.browser_download_url.clone())
            .ok_or_else(|| RmuError::AssetNotFound {
                asset: file_name.to_string(),
                repo: repo.to_string(),
            })
    }
}
