//! Turning a repository reference into a concrete download URL

pub mod fallback;
pub mod release;
pub mod tag_feed;

pub use fallback::FallbackResolver;
pub use release::LatestReleaseResolver;
pub use tag_feed::TagFeedResolver;

use crate::core::RmuResult;
use crate::extractor::RepositoryRef;
use crate::github::GitHubClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Finds where the newest build of `file_name` can be downloaded
#[async_trait]
pub trait ReleaseResolver: Send + Sync {
    async fn resolve(
        &self,
        repo: &RepositoryRef,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> RmuResult<String>;

    /// Short label used in log lines
    fn name(&self) -> &'static str;
}

/// Which resolver a run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    /// Latest-release API, matching the asset by exact file name
    #[default]
    Release,
    /// Newest tag from the Atom feed plus the conventional download path
    TagFeed,
    /// Release API first, tag feed if it fails
    Fallback,
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolveStrategy::Release => "release",
            ResolveStrategy::TagFeed => "tag_feed",
            ResolveStrategy::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

impl FromStr for ResolveStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "release" => Ok(ResolveStrategy::Release),
            "tag_feed" | "tags" => Ok(ResolveStrategy::TagFeed),
            "fallback" => Ok(ResolveStrategy::Fallback),
            other => Err(format!(
                "unknown strategy '{}' (expected release, tag-feed or fallback)",
                other
            )),
        }
    }
}

/// Build the resolver for `strategy` on top of a shared client
pub fn build_resolver(
    strategy: ResolveStrategy,
    client: Arc<GitHubClient>,
) -> Arc<dyn ReleaseResolver> {
    match strategy {
        ResolveStrategy::Release => Arc::new(LatestReleaseResolver::new(client)),
        ResolveStrategy::TagFeed => Arc::new(TagFeedResolver::new(client)),
        ResolveStrategy::Fallback => Arc::new(FallbackResolver::new(
            Arc::new(LatestReleaseResolver::new(client.clone())),
            Arc::new(TagFeedResolver::new(client)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("release".parse(), Ok(ResolveStrategy::Release));
        assert_eq!("tag-feed".parse(), Ok(ResolveStrategy::TagFeed));
        assert_eq!("TAG_FEED".parse(), Ok(ResolveStrategy::TagFeed));
        assert_eq!("fallback".parse(), Ok(ResolveStrategy::Fallback));
        assert!("latest".parse::<ResolveStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_matches_serde() {
        for strategy in [
            ResolveStrategy::Release,
            ResolveStrategy::TagFeed,
            ResolveStrategy::Fallback,
        ] {
            let yaml = serde_yaml::to_string(&strategy).unwrap();
            assert_eq!(yaml.trim(), strategy.to_string());
        }
    }
}
