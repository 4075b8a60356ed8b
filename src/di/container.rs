//! Service container for dependency injection

use super::traits::{ArtifactDownloader, ConfigProvider, MetadataLoader, ReleaseResolver};
use crate::config::Config;
use crate::core::RmuResult;
use crate::github::GitHubClient;
use crate::metadata::ClrLoader;
use crate::resolver::build_resolver;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds the four collaborators of an update run as trait objects so tests
/// can swap any of them for the in-memory versions in [`super::mocks`].
///
/// # Example (Production)
///
/// ```no_run
/// use rmu::di::ServiceContainer;
///
/// # fn example() -> rmu::core::RmuResult<()> {
/// let container = ServiceContainer::new()?;
/// println!("Workers: {}", container.config().max_concurrent());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub config: Arc<dyn ConfigProvider>,
    pub loader: Arc<dyn MetadataLoader>,
    pub resolver: Arc<dyn ReleaseResolver>,
    pub downloader: Arc<dyn ArtifactDownloader>,
}

impl ServiceContainer {
    /// Create a new service container with production implementations
    ///
    /// Loads (or creates) the config file, then wires it as [`from_config`](Self::from_config) does.
    pub fn new() -> RmuResult<Self> {
        Self::from_config(Config::load()?)
    }

    /// Wire production implementations around an already loaded config
    ///
    /// The resolver and the downloader share one [`GitHubClient`], so they
    /// share its connection pool and its rate-limit gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or user agent is not a valid header
    /// value, or the HTTP client cannot be built.
    pub fn from_config(config: Config) -> RmuResult<Self> {
        let client = Arc::new(GitHubClient::new(&config)?);
        let resolver = build_resolver(config.strategy, client.clone());

        Ok(Self {
            config: Arc::new(config),
            loader: Arc::new(ClrLoader),
            resolver,
            downloader: client,
        })
    }

    /// Create a service container with custom provider implementations
    pub fn with_providers(
        config: Arc<dyn ConfigProvider>,
        loader: Arc<dyn MetadataLoader>,
        resolver: Arc<dyn ReleaseResolver>,
        downloader: Arc<dyn ArtifactDownloader>,
    ) -> Self {
        Self {
            config,
            loader,
            resolver,
            downloader,
        }
    }

    /// Get the configuration provider
    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::{
        MockArtifactDownloader, MockConfigProvider, MockMetadataLoader, MockReleaseResolver,
    };

    #[test]
    fn test_from_config_wires_production_services() {
        let config = Config {
            max_concurrent: 7,
            ..Config::default()
        };
        let container = ServiceContainer::from_config(config).unwrap();
        assert_eq!(container.config().max_concurrent(), 7);
    }

    #[test]
    fn test_with_providers() {
        let mut config = MockConfigProvider::default();
        config.skip_prefix = "~".to_string();

        let container = ServiceContainer::with_providers(
            Arc::new(config),
            Arc::new(MockMetadataLoader::new()),
            Arc::new(MockReleaseResolver::new()),
            Arc::new(MockArtifactDownloader::new()),
        );
        assert_eq!(container.config().skip_prefix(), "~");
    }
}
