use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, WallsError};

use super::WallpaperApplier;

pub struct HyprpaperApplier;

impl HyprpaperApplier {
    pub fn new() -> Self {
        Self
    }

    /// `preload`, `wallpaper` (every monitor), then `unload all` to free memory.
    fn steps(path: &Path) -> [Vec<String>; 3] {
        let path_str = path.to_string_lossy().to_string();
        [
            vec!["hyprpaper".into(), "preload".into(), path_str.clone()],
            vec!["hyprpaper".into(), "wallpaper".into(), format!(",{path_str}")],
            vec!["hyprpaper".into(), "unload".into(), "all".into()],
        ]
    }

    async fn hyprctl(args: &[String]) -> Result<()> {
        let output = Command::new("hyprctl")
            .args(args)
            .output()
            .await
            .map_err(|e| WallsError::Apply(format!("failed to run hyprctl: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WallsError::Apply(format!("hyprctl failed: {}", stderr.trim())));
        }
        Ok(())
    }
}

impl Default for HyprpaperApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WallpaperApplier for HyprpaperApplier {
    async fn apply(&self, path: &Path) -> Result<()> {
        for step in Self::steps(path) {
            Self::hyprctl(&step).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "hyprpaper"
    }
}
