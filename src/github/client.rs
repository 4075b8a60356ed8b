//! GitHub API client implementation

use crate::config::Config;
use crate::core::{RmuError, RmuResult};
use crate::di::traits::ArtifactDownloader;
use crate::extractor::RepositoryRef;
use crate::github::rate_limit::{RateLimitGate, RetryPolicy};
use crate::github::types::GitHubRelease;
use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const API_ACCEPT: &str = "application/vnd.github+json";
const DOWNLOAD_ACCEPT: &str = "application/octet-stream";

/// GitHub API client
///
/// One client (and so one connection pool and one [`RateLimitGate`]) is
/// shared by every worker of a run.
pub struct GitHubClient {
    http_client: HttpClient,
    api_url: String,
    web_url: String,
    authorization: Option<header::HeaderValue>,
    gate: Arc<RateLimitGate>,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: &Config) -> RmuResult<Self> {
        Self::with_gate(
            config,
            Arc::new(RateLimitGate::new(RetryPolicy::from(&config.rate_limit))),
        )
    }

    /// Create a client that backs off through an existing gate
    pub fn with_gate(config: &Config, gate: Arc<RateLimitGate>) -> RmuResult<Self> {
        let authorization = match config.get_token() {
            Some(token) => Some(
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| RmuError::Config(format!("Invalid GitHub token: {}", e)))?,
            ),
            None => None,
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .map_err(|e| RmuError::Config(format!("Invalid user agent: {}", e)))?,
        );

        let http_client = HttpClient::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            authorization,
            gate,
        })
    }

    /// Get the latest release for a repository
    pub async fn get_latest_release(
        &self,
        repo: &RepositoryRef,
        cancel: &CancellationToken,
    ) -> RmuResult<GitHubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, repo.owner, repo.name
        );
        let response = self.api_request(&url, cancel).await?;
        let body = cancellable(cancel, response.text()).await??;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the raw Atom feed of a repository's tags
    pub async fn get_tag_feed(
        &self,
        repo: &RepositoryRef,
        cancel: &CancellationToken,
    ) -> RmuResult<String> {
        let url = format!("{}/{}/{}/tags.atom", self.web_url, repo.owner, repo.name);
        debug!("Fetching tag feed {}", url);

        let response = cancellable(cancel, self.http_client.get(&url).send())
            .await?
            .map_err(|e| RmuError::Feed(format!("Failed to fetch {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(RmuError::Feed(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        cancellable(cancel, response.text())
            .await?
            .map_err(|e| RmuError::Feed(format!("Failed to read {}: {}", url, e)))
    }

    /// Conventional download URL of a tagged release asset
    pub fn release_download_url(&self, repo: &RepositoryRef, tag: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.web_url, repo.owner, repo.name, tag, file_name
        )
    }

    /// GET an API URL, backing off through the shared gate on 403/429
    async fn api_request(&self, url: &str, cancel: &CancellationToken) -> RmuResult<Response> {
        let policy = self.gate.policy();
        let mut retries = 0u32;

        loop {
            self.gate.wait_open(cancel).await?;

            let mut request = self
                .http_client
                .get(url)
                .header(header::ACCEPT, API_ACCEPT);
            if let Some(ref authorization) = self.authorization {
                request = request.header(header::AUTHORIZATION, authorization.clone());
            }

            let response = cancellable(cancel, request.send())
                .await?
                .map_err(|e| RmuError::Network(format!("GitHub API request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                if !policy.allows_retry(retries) {
                    return Err(RmuError::RateLimited(url.to_string(), retries));
                }
                retries += 1;
                self.gate.trip().await;
                warn!(
                    "GitHub API returned {} for {}, backing off {:?} (retry {})",
                    status, url, policy.cooldown, retries
                );
                continue;
            }

            if !status.is_success() {
                return Err(RmuError::Network(format!(
                    "GitHub API error for {}: HTTP {}",
                    url, status
                )));
            }

            return Ok(response);
        }
    }
}

#[async_trait]
impl ArtifactDownloader for GitHubClient {
    async fn download(&self, url: &str, cancel: &CancellationToken) -> RmuResult<Vec<u8>> {
        debug!("Downloading {}", url);
        let response = cancellable(
            cancel,
            self.http_client
                .get(url)
                .header(header::ACCEPT, DOWNLOAD_ACCEPT)
                .send(),
        )
        .await?
        .map_err(|e| RmuError::Network(format!("Failed to download {}: {}", url, e)))?;

        let response = response
            .error_for_status()
            .map_err(|e| RmuError::Network(format!("Failed to download {}: {}", url, e)))?;

        let bytes = cancellable(cancel, response.bytes())
            .await?
            .map_err(|e| RmuError::Network(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Race `future` against cancellation
async fn cancellable<F: std::future::Future>(
    cancel: &CancellationToken,
    future: F,
) -> RmuResult<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => Err(RmuError::Cancelled),
        output = future => Ok(output),
    }
}
