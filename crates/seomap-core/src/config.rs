//! Configuration management for seomap.
//!
//! Configuration is stored in TOML format. The default file lives in the
//! platform config directory and can be redirected with the `SEOMAP_CONFIG`
//! environment variable.
//!
//! ## Examples
//!
//! ```rust
//! use seomap_core::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.base_url, "http://localhost");
//! assert!(!config.sitemap.enable_images_sitemap);
//! assert_eq!(config.scan.timeout_secs, 30);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "SEOMAP_CONFIG";

const CONFIG_FILE_NAME: &str = "seomap.toml";

/// Global configuration for sitemap generation.
///
/// ## File Location
///
/// - Linux: `~/.config/seomap/seomap.toml`
/// - macOS: `~/Library/Application Support/dev.outfitter.seomap/seomap.toml`
/// - Windows: `%APPDATA%\outfitter\seomap\config\seomap.toml`
///
/// ## Example Configuration File
///
/// ```toml
/// base_url = "https://example.com"
///
/// [sitemap]
/// enable_images_sitemap = true
/// enable_videos_sitemap = false
/// enable_index_sitemap = true
///
/// [scan]
/// timeout_secs = 30
/// concurrency = 4
///
/// [paths]
/// root = "/var/lib/seomap"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Deployment base URL prepended to every generated location.
    pub base_url: String,
    /// Which sitemap variants are enabled
    pub sitemap: SitemapConfig,
    /// Media scan behavior
    pub scan: ScanConfig,
    /// File system paths configuration
    pub paths: PathsConfig,
}

/// Sitemap variant toggles.
///
/// Media scans are only requested when at least one of the image or video
/// sitemaps is enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SitemapConfig {
    /// Serve `sitemap_images.xml` and collect `<img>` assets during scans.
    pub enable_images_sitemap: bool,
    /// Serve `sitemap_videos.xml` and collect `VideoObject` microdata during scans.
    pub enable_videos_sitemap: bool,
    /// Serve `sitemap_index.xml` linking the enabled variants.
    pub enable_index_sitemap: bool,
}

impl SitemapConfig {
    /// Whether any media sitemap is enabled.
    pub const fn media_enabled(&self) -> bool {
        self.enable_images_sitemap || self.enable_videos_sitemap
    }
}

/// Media scan execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds after which a scan is abandoned and treated as a failed render.
    pub timeout_secs: u64,
    /// Maximum number of scans executing at once.
    pub concurrency: usize,
}

impl ScanConfig {
    /// Execution timeout as a `Duration`.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            concurrency: 4,
        }
    }
}

/// File system paths configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory holding the item store and the key-value cache.
    ///
    /// Layout: `root/items.json` and `root/cache/<key>.json`.
    pub root: PathBuf,
}

impl PathsConfig {
    /// Location of the persisted sitemap item store.
    pub fn store_file(&self) -> PathBuf {
        self.root.join("items.json")
    }

    /// Directory used by the file-backed key-value cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: directories::ProjectDirs::from("dev", "outfitter", "seomap").map_or_else(
                || {
                    directories::BaseDirs::new().map_or_else(
                        || PathBuf::from(".seomap"),
                        |base| base.home_dir().join(".seomap"),
                    )
                },
                |dirs| dirs.data_dir().to_path_buf(),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            sitemap: SitemapConfig::default(),
            scan: ScanConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or fall back to defaults.
    ///
    /// A missing file is not an error. A file that exists but cannot be read
    /// or parsed is reported as [`Error::Config`].
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save the configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {e}"))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Resolve the config file path, honoring `SEOMAP_CONFIG`.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let project_dirs = directories::ProjectDirs::from("dev", "outfitter", "seomap")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;

        Ok(project_dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config() -> Config {
        Config {
            base_url: "https://example.com".to_string(),
            sitemap: SitemapConfig {
                enable_images_sitemap: true,
                enable_videos_sitemap: false,
                enable_index_sitemap: true,
            },
            scan: ScanConfig {
                timeout_secs: 5,
                concurrency: 2,
            },
            paths: PathsConfig {
                root: PathBuf::from("/tmp/seomap-test"),
            },
        }
    }

    #[test]
    fn test_default_config_values() {
        // Given: Default configuration is requested
        let config = Config::default();

        // Then: Should have sensible defaults
        assert_eq!(config.base_url, "http://localhost");
        assert!(!config.sitemap.enable_images_sitemap);
        assert!(!config.sitemap.enable_videos_sitemap);
        assert!(!config.sitemap.enable_index_sitemap);
        assert!(!config.sitemap.media_enabled());
        assert_eq!(config.scan.timeout(), Duration::from_secs(30));
        assert_eq!(config.scan.concurrency, 4);
        assert!(!config.paths.root.as_os_str().is_empty());
    }

    #[test]
    fn test_config_save_and_load_roundtrip() -> Result<()> {
        // Given: A temporary directory and test configuration
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("seomap.toml");
        let original = create_test_config();

        // When: Saving and then loading the configuration
        original.save_to(&config_path)?;
        let loaded = Config::load_from(&config_path)?;

        // Then: Configurations should be identical
        assert_eq!(loaded, original);
        assert!(loaded.sitemap.media_enabled());
        Ok(())
    }

    #[test]
    fn test_partial_config_uses_defaults() -> Result<()> {
        // Given: A config file that only sets one section
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("seomap.toml");
        fs::write(&path, "[sitemap]\nenable_videos_sitemap = true\n")?;

        // When: Loading it
        let config = Config::load_from(&path)?;

        // Then: Missing fields take their defaults
        assert!(config.sitemap.enable_videos_sitemap);
        assert!(config.sitemap.media_enabled());
        assert_eq!(config.base_url, "http://localhost");
        assert_eq!(config.scan.timeout_secs, 30);
        Ok(())
    }

    #[test]
    fn test_config_load_missing_file() {
        // Given: A non-existent config file path
        let non_existent = PathBuf::from("/definitely/does/not/exist/seomap.toml");

        // When: Attempting to load config
        let result = Config::load_from(&non_existent);

        // Then: Should return a config error
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to read config")),
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_malformed_toml() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("seomap.toml");
        fs::write(&path, "base_url = [unterminated")?;

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Failed to parse")));
        Ok(())
    }

    #[test]
    fn test_paths_layout() {
        let paths = PathsConfig {
            root: PathBuf::from("/data"),
        };
        assert_eq!(paths.store_file(), PathBuf::from("/data/items.json"));
        assert_eq!(paths.cache_dir(), PathBuf::from("/data/cache"));
    }
}
