// Runtime configuration.
// Loaded from a JSON file in the platform config directory; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Maximum number of post records held in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;
/// Schema token written into every persisted entry.
pub const DEFAULT_CACHE_VERSION: &str = "v4";
/// Persisted entries older than this are treated as absent.
pub const DEFAULT_FRESHNESS_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);
/// Key prefix for persisted entries.
pub const DEFAULT_STORAGE_PREFIX: &str = "tiktok_cache_";
/// Substring identifying tracking-pixel anchors.
pub const DEFAULT_TRACKING_DOMAIN: &str = "blogger.googleusercontent.com/tracker";
/// Substring identifying an embedded comment iframe.
pub const DEFAULT_COMMENT_SERVICE: &str = "blogger.com/comment";
/// Base URL used when composing a comment iframe URL from blog/post ids.
pub const DEFAULT_COMMENT_IFRAME_BASE: &str = "https://www.blogger.com/comment-iframe.g";

/// Crate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// In-memory capacity of the post cache.
    pub cache_capacity: usize,
    /// Schema version token for persisted entries.
    pub cache_version: String,
    /// Freshness horizon for persisted entries, in seconds.
    pub freshness_horizon_secs: u64,
    /// Prefix of persistent-store keys.
    pub storage_prefix: String,
    /// Override for the persistent-store directory.
    pub storage_dir: Option<PathBuf>,
    /// Optional byte quota for the persistent store (None = unlimited).
    pub storage_quota_bytes: Option<u64>,

    /// Number of neighbors warmed in each direction around the active item.
    pub preload_range: usize,
    /// Number of leading feed items fetched by the initial warm-up.
    pub initial_preload_count: usize,
    /// Pixel margin around the viewport that triggers prefetch.
    pub viewport_margin_px: f64,
    /// Distance from the document bottom that triggers pagination.
    pub scroll_trigger_px: f64,
    /// Pagination fires when the active item is this close to the end of the feed.
    pub load_more_threshold: usize,
    /// Whether image navigation wraps around when a post has more than one image.
    pub image_wraparound: bool,

    pub tracking_domain: String,
    pub comment_service: String,
    pub comment_iframe_base: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            freshness_horizon_secs: DEFAULT_FRESHNESS_HORIZON.as_secs(),
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            storage_dir: None,
            storage_quota_bytes: None,
            preload_range: 3,
            initial_preload_count: 10,
            viewport_margin_px: 300.0,
            scroll_trigger_px: 500.0,
            load_more_threshold: 2,
            image_wraparound: true,
            tracking_domain: DEFAULT_TRACKING_DOMAIN.to_string(),
            comment_service: DEFAULT_COMMENT_SERVICE.to_string(),
            comment_iframe_base: DEFAULT_COMMENT_IFRAME_BASE.to_string(),
            user_agent: format!("feedreel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn freshness_horizon(&self) -> Duration {
        Duration::from_secs(self.freshness_horizon_secs)
    }

    /// Directory holding persisted post records.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(crate::cache::cache_dir)
    }
}

/// Path of the configuration file (~/.config/feedreel/config.json on Linux).
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "feedreel").map(|dirs| dirs.config_dir().join("config.json"))
}
