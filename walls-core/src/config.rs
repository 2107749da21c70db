use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WallsError};
use crate::models::{BackendType, Purity, PurityCycle};
use crate::paths::WallsPaths;

/// Environment variable carrying the catalog API key.
pub const API_KEY_ENV: &str = "WALLHAVEN_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://wallhaven.cc/api/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub search: SearchConfig,
    pub transition: TransitionConfig,
}

impl Config {
    pub fn load(paths: &WallsPaths) -> Result<Self> {
        let path = paths.config_file();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| WallsError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &WallsPaths) -> Self {
        match Self::load(paths) {
            Ok(config) => config,
            Err(WallsError::Toml(e)) => {
                tracing::warn!("ignoring malformed config: {e}");
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }

    /// Let the process environment override the key from the config file.
    pub fn apply_env(&mut self) {
        self.apply_api_key(std::env::var(API_KEY_ENV).ok());
    }

    fn apply_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.search.api_key = Some(key.trim().to_string());
        }
    }

    /// Resolve the on-disk layout, honouring a configured cache root.
    pub fn resolve_paths(&self, paths: WallsPaths) -> WallsPaths {
        match &self.general.cache_dir {
            Some(dir) => paths.with_cache_dir(dir.clone()),
            None => paths,
        }
    }

    pub fn purity_cycle(&self) -> PurityCycle {
        PurityCycle::from_order(&self.search.purity_cycle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Linux wallpaper backend; ignored on macOS.
    pub backend: BackendType,
    pub cache_dir: Option<PathBuf>,
    pub cache_max_mb: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Swww,
            cache_dir: None,
            cache_max_mb: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub default_purity: Purity,
    pub purity_cycle: Vec<Purity>,
    pub search_timeout_secs: u64,
    pub thumbnail_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl SearchConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn thumbnail_timeout(&self) -> Duration {
        Duration::from_secs(self.thumbnail_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            default_purity: Purity::SFW,
            purity_cycle: vec![Purity::SFW, Purity::SFW_SKETCHY, Purity::ALL],
            search_timeout_secs: 15,
            thumbnail_timeout_secs: 20,
            download_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub r#type: String,
    pub duration: f64,
    pub fps: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            r#type: "fade".into(),
            duration: 2.0,
            fps: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.backend, BackendType::Swww);
        assert_eq!(config.search.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.search.default_purity, Purity::SFW);
        assert_eq!(config.search.search_timeout(), Duration::from_secs(15));
        assert!(config.search.download_timeout() > config.search.search_timeout());
        assert_eq!(config.purity_cycle(), PurityCycle::default());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[general]
backend = "hyprpaper"

[search]
default_purity = 110
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.backend, BackendType::Hyprpaper);
        assert_eq!(config.search.default_purity, Purity::SFW_SKETCHY);
        // defaults still applied
        assert_eq!(config.general.cache_max_mb, 500);
        assert_eq!(config.search.thumbnail_timeout_secs, 20);
        assert_eq!(config.transition.r#type, "fade");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
backend = "swww"
cache_dir = "/tmp/walls-cache"
cache_max_mb = 1000

[search]
base_url = "http://127.0.0.1:9000/api/v1"
api_key = "file_key"
default_purity = 100
purity_cycle = [100, 10]
search_timeout_secs = 5
download_timeout_secs = 120

[transition]
type = "wipe"
duration = 1.5
fps = 30
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.cache_dir, Some(PathBuf::from("/tmp/walls-cache")));
        assert_eq!(config.search.api_key.as_deref(), Some("file_key"));
        let cycle = config.purity_cycle();
        assert_eq!(cycle.next(Purity::SFW).code(), 10);
        assert_eq!(config.search.download_timeout(), Duration::from_secs(120));
        assert_eq!(config.transition.fps, 30);
    }

    #[test]
    fn test_invalid_purity_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[search]\ndefault_purity = 123\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_key_overrides_file() {
        let mut config = Config::default();
        config.search.api_key = Some("file_key".into());
        config.apply_api_key(Some("  ".into()));
        assert_eq!(config.search.api_key.as_deref(), Some("file_key"));
        config.apply_api_key(Some("env_key".into()));
        assert_eq!(config.search.api_key.as_deref(), Some("env_key"));
        config.apply_api_key(None);
        assert_eq!(config.search.api_key.as_deref(), Some("env_key"));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = WallsPaths {
            config_dir: tmp.path().join("config"),
            cache_dir: tmp.path().join("cache"),
        };
        assert!(Config::load(&paths).is_err());
        let config = Config::load_or_default(&paths);
        assert_eq!(config.general.cache_max_mb, 500);

        let mut config = Config::default();
        config.general.cache_dir = Some(tmp.path().join("custom"));
        let resolved = config.resolve_paths(paths);
        assert_eq!(resolved.full_dir(), tmp.path().join("custom/full"));
    }
}
