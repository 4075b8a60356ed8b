use super::ReleaseResolver;
use crate::core::RmuResult;
use crate::extractor::RepositoryRef;
use crate::github::{feed, GitHubClient};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolves through the repository's tag feed
///
/// No API call is made; the URL is synthesized from the newest tag, so a
/// release without a matching asset only shows up when the download fails.
pub struct TagFeedResolver {
    client: Arc<GitHubClient>,
}

impl TagFeedResolver {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseResolver for TagFeedResolver {
    fn name(&self) -> &'static str {
        "tag_feed"
    }

    async fn resolve(
        &self,
        repo: &RepositoryRef,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> RmuResult<String> {
        let xml = self.client.get_tag_feed(repo, cancel).await?;
        let tag = feed::latest_tag(&xml)?;
        debug!("{} newest tag is {}", repo, tag);
        Ok(self.client.release_download_url(repo, &tag, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::RmuError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> TagFeedResolver {
        let config = Config {
            api_url: server.uri(),
            web_url: server.uri(),
            ..Config::default()
        };
        TagFeedResolver::new(Arc::new(GitHubClient::new(&config).unwrap()))
    }

    #[tokio::test]
    async fn test_synthesizes_url_from_newest_tag() {
        let server = MockServer::start().await;
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <link rel="alternate" type="text/html" href="https://github.com/owner/repo/releases/tag/v1.2.3"/>
    <title>v1.2.3</title>
  </entry>
</feed>"#;
        Mock::given(method("GET"))
            .and(path("/owner/repo/tags.atom"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed))
            .mount(&server)
            .await;

        let url = resolver(&server)
            .resolve(
                &RepositoryRef::new("owner", "repo").unwrap(),
                "Mine.dll",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/owner/repo/releases/download/v1.2.3/Mine.dll", server.uri())
        );
    }

    #[tokio::test]
    async fn test_empty_feed_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/owner/repo/tags.atom"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#),
            )
            .mount(&server)
            .await;

        let result = resolver(&server)
            .resolve(
                &RepositoryRef::new("owner", "repo").unwrap(),
                "Mine.dll",
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(RmuError::Feed(_))));
    }
}
