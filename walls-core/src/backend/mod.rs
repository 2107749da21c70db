pub mod hyprpaper;
pub mod macos;
pub mod swww;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Result, WallsError};
use crate::models::BackendType;

/// Sets a local image file as the desktop background.
#[async_trait]
pub trait WallpaperApplier: Send + Sync {
    async fn apply(&self, path: &Path) -> Result<()>;
    fn name(&self) -> &str;
}

/// Stand-in for platforms without an integration; every call fails fast.
pub struct Unsupported {
    platform: String,
}

impl Unsupported {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }
}

#[async_trait]
impl WallpaperApplier for Unsupported {
    async fn apply(&self, _path: &Path) -> Result<()> {
        Err(WallsError::UnsupportedPlatform(self.platform.clone()))
    }

    fn name(&self) -> &str {
        "unsupported"
    }
}

/// Pick the integration for the running OS once at startup.
pub fn create_applier(config: &Config) -> Arc<dyn WallpaperApplier> {
    applier_for(std::env::consts::OS, config)
}

fn applier_for(os: &str, config: &Config) -> Arc<dyn WallpaperApplier> {
    match os {
        "macos" => Arc::new(macos::OsaScriptApplier::new()),
        "linux" => match config.general.backend {
            BackendType::Hyprpaper => Arc::new(hyprpaper::HyprpaperApplier::new()),
            BackendType::Swww => Arc::new(swww::SwwwApplier::new(config.transition.clone())),
        },
        other => Arc::new(Unsupported::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_applier_selection() {
        let mut config = Config::default();
        assert_eq!(applier_for("macos", &config).name(), "osascript");
        assert_eq!(applier_for("linux", &config).name(), "swww");
        config.general.backend = BackendType::Hyprpaper;
        assert_eq!(applier_for("linux", &config).name(), "hyprpaper");
        assert_eq!(applier_for("windows", &config).name(), "unsupported");
    }

    #[tokio::test]
    async fn test_unsupported_fails_fast() {
        let applier = applier_for("freebsd", &Config::default());
        let err = applier
            .apply(&PathBuf::from("/tmp/walls/full/abc.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, WallsError::UnsupportedPlatform(ref os) if os == "freebsd"));
    }
}
