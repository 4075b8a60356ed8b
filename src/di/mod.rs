//! Dependency injection infrastructure for RMU
//!
//! The update pipeline only sees its collaborators through traits, so the
//! network, the metadata reader and the configuration can all be replaced by
//! the in-memory versions in [`mocks`].
//!
//! # Example (Production)
//! ```no_run
//! use rmu::di::ServiceContainer;
//!
//! # fn example() -> rmu::core::RmuResult<()> {
//! let container = ServiceContainer::new()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example (Testing)
//! ```
//! use rmu::di::{ServiceContainer, mocks::*};
//! use std::sync::Arc;
//!
//! let config = Arc::new(MockConfigProvider::default());
//! let loader = Arc::new(MockMetadataLoader::new());
//! let resolver = Arc::new(MockReleaseResolver::new());
//! let downloader = Arc::new(MockArtifactDownloader::new());
//!
//! let container = ServiceContainer::with_providers(config, loader, resolver, downloader);
//! ```

pub mod container;
pub mod mocks;
pub mod traits;

// Re-export key types
pub use container::ServiceContainer;
pub use traits::{ArtifactDownloader, ConfigProvider, MetadataLoader, ReleaseResolver};
