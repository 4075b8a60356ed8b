//! Finding the repository reference a plugin binary carries
//!
//! A mod declares where it comes from by deriving its entry class from the
//! marker type and returning a URL literal from the link property. The
//! extractor walks the binary's metadata for that pattern without loading
//! or running any of its code.

pub mod reference;

pub use reference::{validate_reference, RepositoryRef};

use crate::core::RmuResult;
use crate::di::ConfigProvider;
use crate::metadata::{MetadataLoader, MetadataReader, PropertyInfo};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ReferenceExtractor {
    loader: Arc<dyn MetadataLoader>,
    marker_type: String,
    link_property: String,
    hosting_domain: String,
}

impl ReferenceExtractor {
    pub fn new(
        loader: Arc<dyn MetadataLoader>,
        marker_type: &str,
        link_property: &str,
        hosting_domain: &str,
    ) -> Self {
        Self {
            loader,
            marker_type: marker_type.to_string(),
            link_property: link_property.to_string(),
            hosting_domain: hosting_domain.to_string(),
        }
    }

    pub fn from_config(loader: Arc<dyn MetadataLoader>, config: &dyn ConfigProvider) -> Self {
        Self::new(
            loader,
            config.marker_type(),
            config.link_property(),
            config.hosting_domain(),
        )
    }

    /// Extract the reference URL from the binary at `path`
    ///
    /// `Ok(None)` means the binary was readable but carries no valid reference.
    /// Unreadable or foreign files are an error.
    pub fn extract(&self, path: &Path) -> RmuResult<Option<String>> {
        let reader = self.loader.load(path)?;
        self.extract_from(reader.as_ref())
    }

    /// Extract from an already opened binary
    pub fn extract_from(&self, reader: &dyn MetadataReader) -> RmuResult<Option<String>> {
        let Some(getter) = self.find_link_property(reader)?.and_then(|p| p.getter) else {
            return Ok(None);
        };
        let Some(strings) = reader.string_constants(getter)? else {
            return Ok(None);
        };

        for candidate in strings {
            match validate_reference(&candidate, &self.hosting_domain) {
                Ok(url) => return Ok(Some(url)),
                Err(e) => debug!("Skipping literal: {}", e),
            }
        }
        Ok(None)
    }

    /// First link property on a type deriving from the marker
    fn find_link_property(&self, reader: &dyn MetadataReader) -> RmuResult<Option<PropertyInfo>> {
        for ty in reader.types()? {
            if ty.base_type.as_deref() != Some(self.marker_type.as_str()) {
                continue;
            }
            if let Some(property) = reader
                .properties(ty.handle)?
                .into_iter()
                .find(|p| p.name == self.link_property)
            {
                debug!("Found {}.{}", ty.name, property.name);
                return Ok(Some(property));
            }
        }
        Ok(None)
    }
}
