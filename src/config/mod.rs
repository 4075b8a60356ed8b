use crate::core::path::{config_file, default_mods_dir, ensure_dir};
use crate::core::{RmuError, RmuResult};
use crate::di::ConfigProvider;
use crate::resolver::ResolveStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the mod DLLs (defaults to the Steam install's rml_mods)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mods_dir: Option<String>,

    /// GitHub token sent as a bearer credential to the releases API
    ///
    /// The `GITHUB_TOKEN` environment variable takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Token given on the command line for this run only; beats everything
    #[serde(skip)]
    pub token_override: Option<String>,

    /// Compute and report decisions without writing any file
    #[serde(default)]
    pub dry_run: bool,

    /// Number of mods processed concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// How a repository reference is turned into a download URL
    /// - "release": latest-release API (default)
    /// - "tag_feed": newest entry of the tags.atom feed
    /// - "fallback": release API, then the tag feed if that fails
    #[serde(default)]
    pub strategy: ResolveStrategy,

    /// Releases API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Web base URL (tag feeds and conventional download URLs)
    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Domain an embedded reference must be hosted on
    #[serde(default = "default_hosting_domain")]
    pub hosting_domain: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base type name identifying the mod entry class
    #[serde(default = "default_marker_type")]
    pub marker_type: String,

    /// Property on the mod entry class that returns the repository URL
    #[serde(default = "default_link_property")]
    pub link_property: String,

    /// Files starting with this prefix are never touched
    #[serde(default = "default_skip_prefix")]
    pub skip_prefix: String,

    /// File extension of mod binaries
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Overall deadline for a run; unfinished mods are reported as cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

/// Back-off behaviour when the hosting service answers 403/429
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds every worker waits after a rate-limit response
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Give up after this many back-offs; unset retries forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_retries: None,
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_web_url() -> String {
    "https://github.com".to_string()
}

fn default_hosting_domain() -> String {
    "github.com".to_string()
}

fn default_user_agent() -> String {
    "resonite-mod-updater".to_string()
}

fn default_marker_type() -> String {
    "ResoniteMod".to_string()
}

fn default_link_property() -> String {
    "Link".to_string()
}

fn default_skip_prefix() -> String {
    "_".to_string()
}

fn default_extension() -> String {
    "dll".to_string()
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mods_dir: None,
            token: None,
            token_override: None,
            dry_run: false,
            max_concurrent: default_max_concurrent(),
            strategy: ResolveStrategy::default(),
            api_url: default_api_url(),
            web_url: default_web_url(),
            hosting_domain: default_hosting_domain(),
            user_agent: default_user_agent(),
            marker_type: default_marker_type(),
            link_property: default_link_property(),
            skip_prefix: default_skip_prefix(),
            extension: default_extension(),
            rate_limit: RateLimitConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            deadline_secs: None,
        }
    }
}

impl Config {
    /// Load config from platform-specific config directory, creating default if it doesn't exist
    ///
    /// Config locations:
    /// - Windows: %APPDATA%\rmu\config.yaml
    /// - Linux: ~/.config/rmu/config.yaml
    /// - macOS: ~/Library/Application Support/rmu/config.yaml
    pub fn load() -> RmuResult<Self> {
        let config_path = config_file()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> RmuResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to platform-specific config directory
    pub fn save(&self) -> RmuResult<()> {
        self.save_to(&config_file()?)
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> RmuResult<()> {
        let config_dir = path
            .parent()
            .ok_or_else(|| RmuError::Path("Invalid config path".to_string()))?;

        ensure_dir(config_dir)?;

        let content = serde_yaml::to_string(self)?;

        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> RmuResult<()> {
        if self.max_concurrent == 0 {
            return Err(RmuError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.hosting_domain.is_empty() {
            return Err(RmuError::Config("hosting_domain must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get the mods directory, falling back to the platform default
    pub fn get_mods_dir(&self) -> RmuResult<PathBuf> {
        if let Some(ref dir) = self.mods_dir {
            Ok(PathBuf::from(dir))
        } else {
            default_mods_dir()
        }
    }

    /// Resolve the token: command line, then `GITHUB_TOKEN`, then the config file
    pub fn get_token(&self) -> Option<String> {
        self.token_override
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
            .or_else(|| self.token.clone())
    }
}

impl ConfigProvider for Config {
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
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.web_url, "https://github.com");
        assert_eq!(config.marker_type, "ResoniteMod");
        assert_eq!(config.link_property, "Link");
        assert_eq!(config.skip_prefix, "_");
        assert_eq!(config.rate_limit.cooldown_secs, 60);
        assert!(config.rate_limit.max_retries.is_none());
        assert_eq!(config.strategy, ResolveStrategy::Release);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let config = Config {
            mods_dir: Some("/games/mods".to_string()),
            dry_run: true,
            strategy: ResolveStrategy::Fallback,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.mods_dir.as_deref(), Some("/games/mods"));
        assert!(loaded.dry_run);
        assert_eq!(loaded.strategy, ResolveStrategy::Fallback);
    }

    #[test]
    fn test_config_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "strategy: tag_feed\nrate_limit:\n  max_retries: 3\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.strategy, ResolveStrategy::TagFeed);
        assert_eq!(config.rate_limit.max_retries, Some(3));
        assert_eq!(config.rate_limit.cooldown_secs, 60);
        assert_eq!(config.max_concurrent, 4);
    }

    #[test]
    fn test_config_rejects_zero_concurrency() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "max_concurrent: 0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(RmuError::Config(_))));
    }

    #[test]
    fn test_config_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "strategy: [unclosed").unwrap();

        assert!(matches!(Config::load_from(&path), Err(RmuError::Yaml(_))));
    }

    #[test]
    fn test_get_mods_dir_explicit() {
        let config = Config {
            mods_dir: Some("/somewhere".to_string()),
            ..Config::default()
        };
        assert_eq!(config.get_mods_dir().unwrap(), PathBuf::from("/somewhere"));
    }

    #[test]
    #[serial]
    fn test_get_token_env_overrides_config() {
        let config = Config {
            token: Some("from-config".to_string()),
            ..Config::default()
        };

        std::env::set_var("GITHUB_TOKEN", "from-env");
        assert_eq!(config.get_token().as_deref(), Some("from-env"));

        std::env::remove_var("GITHUB_TOKEN");
        assert_eq!(config.get_token().as_deref(), Some("from-config"));
    }

    #[test]
    #[serial]
    fn test_get_token_override_beats_env() {
        let config = Config {
            token: Some("from-config".to_string()),
            token_override: Some("from-cli".to_string()),
            ..Config::default()
        };

        std::env::set_var("GITHUB_TOKEN", "from-env");
        assert_eq!(config.get_token().as_deref(), Some("from-cli"));
        std::env::remove_var("GITHUB_TOKEN");

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("from-cli"));
    }

    #[test]
    fn test_deadline_conversion() {
        let config = Config {
            deadline_secs: Some(5),
            ..Config::default()
        };
        assert_eq!(config.deadline(), Some(Duration::from_secs(5)));
    }
}
