//! Runtime configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```toml
//! [cache]
//! max_mb = 100
//! max_entries = 500
//! pin_builtin = false
//!
//! [render]
//! dpi = 300.0
//! character_diameter_in = 1.75
//! reminder_diameter_in = 1.0
//! meta_diameter_in = 1.75
//!
//! [assets]
//! static_root = "assets"
//! proxy_base = "https://proxy.example.com/fetch"
//! synced_store_dir = "/var/cache/grimoire/synced"
//! fetch_timeout_secs = 15
//!
//! [preload]
//! capacity = 256
//! tick_budget_ms = 16
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use grimoire_tokens_net::ProxyEndpoint;
use grimoire_tokens_render::{DEFAULT_DPI, DEFAULT_PRELOAD_CAPACITY, ImageCacheConfig, Measurement};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::logging::targets;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub cache: CacheSettings,
    pub render: RenderSettings,
    pub assets: AssetSettings,
    pub preload: PreloadSettings,
}

/// `[cache]`: bounds of the decoded image cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_mb: usize,
    pub max_entries: usize,
    /// Keep built-in art resident regardless of recency.
    pub pin_builtin: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_mb: 100,
            max_entries: 500,
            pin_builtin: false,
        }
    }
}

impl CacheSettings {
    /// The equivalent cache configuration.
    pub fn to_cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig::default()
            .with_max_size_mb(self.max_mb)
            .with_max_entries(self.max_entries)
            .with_pin_builtin(self.pin_builtin)
    }
}

/// `[render]`: output resolution and physical token sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub dpi: f64,
    pub character_diameter_in: f64,
    pub reminder_diameter_in: f64,
    pub meta_diameter_in: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            character_diameter_in: 1.75,
            reminder_diameter_in: 1.0,
            meta_diameter_in: 1.75,
        }
    }
}

impl RenderSettings {
    pub fn character_diameter(&self) -> Measurement {
        Measurement::inches(self.character_diameter_in)
    }

    pub fn reminder_diameter(&self) -> Measurement {
        Measurement::inches(self.reminder_diameter_in)
    }

    pub fn meta_diameter(&self) -> Measurement {
        Measurement::inches(self.meta_diameter_in)
    }
}

/// `[assets]`: where art comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Directory holding the bundled built-in art.
    pub static_root: PathBuf,
    /// Base URL of the CORS mirroring proxy. No proxy fallback when unset.
    pub proxy_base: Option<String>,
    /// Directory of the persistent synced character art store.
    pub synced_store_dir: Option<PathBuf>,
    pub fetch_timeout_secs: u64,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            static_root: PathBuf::from("assets"),
            proxy_base: None,
            synced_store_dir: None,
            fetch_timeout_secs: 15,
        }
    }
}

impl AssetSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// `[preload]`: background cache warming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadSettings {
    pub capacity: usize,
    /// Time a single preload tick may spend.
    pub tick_budget_ms: u64,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PRELOAD_CAPACITY,
            tick_budget_ms: 16,
        }
    }
}

impl PreloadSettings {
    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }
}

impl TokenConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: targets::CONFIG, path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges that the types alone cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.max_mb == 0 {
            return Err(ConfigError::invalid("cache.max_mb", "must be at least 1"));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries", "must be at least 1"));
        }

        let render = &self.render;
        positive("render.dpi", render.dpi)?;
        positive("render.character_diameter_in", render.character_diameter_in)?;
        positive("render.reminder_diameter_in", render.reminder_diameter_in)?;
        positive("render.meta_diameter_in", render.meta_diameter_in)?;

        if let Some(base) = &self.assets.proxy_base {
            ProxyEndpoint::new(base.as_str())
                .map_err(|e| ConfigError::invalid("assets.proxy_base", e.to_string()))?;
        }
        if self.assets.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("assets.fetch_timeout_secs", "must be at least 1"));
        }

        if self.preload.capacity == 0 {
            return Err(ConfigError::invalid("preload.capacity", "must be at least 1"));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be a positive number, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_gives_defaults() {
        let config = TokenConfig::from_toml_str("").unwrap();
        assert_eq!(config, TokenConfig::default());
        assert_eq!(config.cache.max_mb, 100);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.render.dpi, 300.0);
        assert_eq!(config.render.character_diameter_in, 1.75);
        assert_eq!(config.render.reminder_diameter_in, 1.0);
        assert!(config.assets.proxy_base.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = TokenConfig::from_toml_str(
            r#"
            [cache]
            max_mb = 8
            pin_builtin = true

            [assets]
            proxy_base = "https://proxy.example.com/fetch"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.max_mb, 8);
        assert_eq!(config.cache.max_entries, 500);
        assert!(config.cache.pin_builtin);
        assert_eq!(
            config.assets.proxy_base.as_deref(),
            Some("https://proxy.example.com/fetch")
        );

        let cache = config.cache.to_cache_config();
        assert_eq!(cache.max_size_bytes, 8 * 1024 * 1024);
        assert!(cache.pin_builtin);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = TokenConfig::from_toml_str("[render]\ndpi = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "render.dpi", .. }));

        let err = TokenConfig::from_toml_str("[cache]\nmax_entries = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "cache.max_entries", .. }));

        let err = TokenConfig::from_toml_str("[assets]\nproxy_base = \"not a url\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "assets.proxy_base", .. }));
    }

    #[test]
    fn test_type_errors_are_parse_errors() {
        let err = TokenConfig::from_toml_str("[cache]\nmax_mb = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = TokenConfig::default();
        config.assets.synced_store_dir = Some(PathBuf::from("/tmp/synced"));
        config.preload.tick_budget_ms = 40;

        let text = config.to_toml_string().unwrap();
        assert_eq!(TokenConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = TokenConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
