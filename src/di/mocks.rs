//! Mock implementations of service traits for testing

use super::traits::{ArtifactDownloader, ConfigProvider, MetadataLoader, ReleaseResolver};
use crate::core::{RmuError, RmuResult};
use crate::extractor::RepositoryRef;
use crate::metadata::{MetadataReader, MethodHandle, PropertyInfo, TypeHandle, TypeInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mock configuration provider for testing
///
/// # Example
///
/// ```
/// use rmu::di::mocks::MockConfigProvider;
/// use rmu::di::ConfigProvider;
///
/// let mut config = MockConfigProvider::default();
/// config.max_concurrent = 1;
///
/// assert_eq!(config.max_concurrent(), 1);
/// assert_eq!(config.marker_type(), "ResoniteMod");
/// ```
#[derive(Clone)]
pub struct MockConfigProvider {
    pub max_concurrent: usize,
    pub marker_type: String,
    pub link_property: String,
    pub hosting_domain: String,
    pub skip_prefix: String,
    pub extension: String,
    pub deadline: Option<Duration>,
}

impl Default for MockConfigProvider {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            marker_type: "ResoniteMod".to_string(),
            link_property: "Link".to_string(),
            hosting_domain: "github.com".to_string(),
            skip_prefix: "_".to_string(),
            extension: "dll".to_string(),
            deadline: None,
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn marker_type(&self) -> &str {
        &self.marker_type
    }

    fn link_property(&self) -> &str {
        &self.link_property
    }

    fn hosting_domain(&self) -> &str {
        &self.hosting_domain
    }

    fn skip_prefix(&self) -> &str {
        &self.skip_prefix
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

#[derive(Debug, Clone)]
enum MockGetter {
    Strings(Vec<String>),
    Abstract,
}

/// A property on a [`MockType`]
#[derive(Debug, Clone)]
pub struct MockProperty {
    name: String,
    getter: MockGetter,
}

impl MockProperty {
    /// Property whose getter loads `strings` in order
    pub fn with_strings(name: &str, strings: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            getter: MockGetter::Strings(strings.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Property whose getter has no body
    pub fn abstract_getter(name: &str) -> Self {
        Self {
            name: name.to_string(),
            getter: MockGetter::Abstract,
        }
    }
}

/// A type declared by a mock binary
#[derive(Debug, Clone)]
pub struct MockType {
    name: String,
    base_type: Option<String>,
    properties: Vec<MockProperty>,
}

impl MockType {
    pub fn new(name: &str, base_type: Option<&str>, properties: Vec<MockProperty>) -> Self {
        Self {
            name: name.to_string(),
            base_type: base_type.map(str::to_string),
            properties,
        }
    }
}

#[derive(Debug, Clone)]
enum MockBinary {
    Types(Vec<MockType>),
    Unreadable,
}

/// Mock metadata loader for testing
///
/// Binaries are registered by file name, so the same mock serves any
/// directory the test scans.
///
/// # Example
///
/// ```
/// use rmu::di::mocks::MockMetadataLoader;
/// use rmu::di::MetadataLoader;
/// use std::path::Path;
///
/// let loader = MockMetadataLoader::new();
/// loader.add_mod("Mine.dll", "https://github.com/owner/repo/releases");
///
/// assert!(loader.load(Path::new("/mods/Mine.dll")).is_ok());
/// assert!(loader.load(Path::new("/mods/Other.dll")).is_err());
/// ```
#[derive(Clone, Default)]
pub struct MockMetadataLoader {
    binaries: Arc<Mutex<HashMap<String, MockBinary>>>,
}

impl MockMetadataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binary declaring `types`
    pub fn add_binary(&self, file_name: &str, types: Vec<MockType>) {
        self.binaries
            .lock()
            .unwrap()
            .insert(file_name.to_string(), MockBinary::Types(types));
    }

    /// Register a typical mod whose link getter returns `url`
    pub fn add_mod(&self, file_name: &str, url: &str) {
        let entry = file_name.trim_end_matches(".dll");
        self.add_binary(
            file_name,
            vec![MockType::new(
                entry,
                Some("ResoniteMod"),
                vec![
                    MockProperty::with_strings("Name", &[entry]),
                    MockProperty::with_strings("Link", &[url]),
                ],
            )],
        );
    }

    /// Register a binary that cannot be parsed
    pub fn add_unreadable(&self, file_name: &str) {
        self.binaries
            .lock()
            .unwrap()
            .insert(file_name.to_string(), MockBinary::Unreadable);
    }
}

impl MetadataLoader for MockMetadataLoader {
    fn load(&self, path: &Path) -> RmuResult<Box<dyn MetadataReader>> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match self.binaries.lock().unwrap().get(file_name) {
            Some(MockBinary::Types(types)) => Ok(Box::new(MockReader {
                types: types.clone(),
            })),
            Some(MockBinary::Unreadable) => Err(RmuError::Parse(format!(
                "{} is not a managed assembly",
                file_name
            ))),
            None => Err(RmuError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not registered", file_name),
            ))),
        }
    }
}

/// Handles are 1-based type indices; getters pack (type, property) into one u32.
struct MockReader {
    types: Vec<MockType>,
}

impl MockReader {
    fn property(&self, method: MethodHandle) -> RmuResult<&MockProperty> {
        let type_index = (method.0 >> 16) as usize;
        let property_index = (method.0 & 0xFFFF) as usize;
        self.types
            .get(type_index)
            .and_then(|t| t.properties.get(property_index))
            .ok_or_else(|| RmuError::Parse(format!("unknown method {:#x}", method.0)))
    }
}

impl MetadataReader for MockReader {
    fn types(&self) -> RmuResult<Vec<TypeInfo>> {
        Ok(self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| TypeInfo {
                handle: TypeHandle(i as u32 + 1),
                name: t.name.clone(),
                namespace: String::new(),
                base_type: t.base_type.clone(),
            })
            .collect())
    }

    fn properties(&self, ty: TypeHandle) -> RmuResult<Vec<PropertyInfo>> {
        let type_index = (ty.0 as usize)
            .checked_sub(1)
            .ok_or_else(|| RmuError::Parse("null type handle".to_string()))?;
        let mock = self
            .types
            .get(type_index)
            .ok_or_else(|| RmuError::Parse(format!("unknown type {}", ty.0)))?;
        Ok(mock
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| PropertyInfo {
                name: p.name.clone(),
                getter: Some(MethodHandle(((type_index as u32) << 16) | i as u32)),
            })
            .collect())
    }

    fn string_constants(&self, method: MethodHandle) -> RmuResult<Option<Vec<String>>> {
        Ok(match &self.property(method)?.getter {
            MockGetter::Strings(strings) => Some(strings.clone()),
            MockGetter::Abstract => None,
        })
    }
}

/// Mock release resolver for testing
///
/// # Example
///
/// ```
/// use rmu::di::mocks::MockReleaseResolver;
///
/// let resolver = MockReleaseResolver::new();
/// resolver.add_url("owner/repo", "https://example.com/Mine.dll");
/// resolver.add_error("owner/gone", "no releases");
/// ```
#[derive(Clone, Default)]
pub struct MockReleaseResolver {
    responses: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockReleaseResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `repo` ("owner/name") to `url`
    pub fn add_url(&self, repo: &str, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(repo.to_string(), Ok(url.to_string()));
    }

    /// Fail resolution of `repo` with a network error carrying `message`
    pub fn add_error(&self, repo: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(repo.to_string(), Err(message.to_string()));
    }

    /// Repositories resolved so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReleaseResolver for MockReleaseResolver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn resolve(
        &self,
        repo: &RepositoryRef,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> RmuResult<String> {
        if cancel.is_cancelled() {
            return Err(RmuError::Cancelled);
        }
        let key = repo.to_string();
        self.calls.lock().unwrap().push(key.clone());

        match self.responses.lock().unwrap().get(&key) {
            Some(Ok(url)) => Ok(url.clone()),
            Some(Err(message)) => Err(RmuError::Network(message.clone())),
            None => Err(RmuError::AssetNotFound {
                asset: file_name.to_string(),
                repo: key,
            }),
        }
    }
}

/// Mock artifact downloader for testing
///
/// Serves registered bytes by URL and answers anything else like a 404.
/// An optional delay keeps downloads in flight long enough to observe
/// concurrency and cancellation.
///
/// # Example
///
/// ```
/// use rmu::di::mocks::MockArtifactDownloader;
///
/// let downloader = MockArtifactDownloader::new();
/// downloader.add_artifact("https://example.com/Mine.dll", b"new build".to_vec());
/// ```
#[derive(Clone, Default)]
pub struct MockArtifactDownloader {
    artifacts: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockArtifactDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every download for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_artifact(&self, url: &str, content: Vec<u8>) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(url.to_string(), content);
    }

    /// URLs requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of downloads that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactDownloader for MockArtifactDownloader {
    async fn download(&self, url: &str, cancel: &CancellationToken) -> RmuResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(RmuError::Cancelled);
        }
        self.calls.lock().unwrap().push(url.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let waited = match self.delay {
            Some(delay) => tokio::select! {
                _ = cancel.cancelled() => Err(RmuError::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => Ok(()),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited?;

        self.artifacts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RmuError::Network(format!("Failed to download {}: HTTP 404", url)))
    }
}
