use super::ReleaseResolver;
use crate::core::RmuResult;
use crate::extractor::RepositoryRef;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tries `primary`, then `secondary` when the first fails for any reason
/// other than cancellation
pub struct FallbackResolver {
    primary: Arc<dyn ReleaseResolver>,
    secondary: Arc<dyn ReleaseResolver>,
}

impl FallbackResolver {
    pub fn new(primary: Arc<dyn ReleaseResolver>, secondary: Arc<dyn ReleaseResolver>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ReleaseResolver for FallbackResolver {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn resolve(
        &self,
        repo: &RepositoryRef,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> RmuResult<String> {
        match self.primary.resolve(repo, file_name, cancel).await {
            Ok(url) => Ok(url),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                info!(
                    "{}: {} resolver failed ({}), trying {}",
                    repo,
                    self.primary.name(),
                    e,
                    self.secondary.name()
                );
                self.secondary.resolve(repo, file_name, cancel).await
            }
        }
    }
}
