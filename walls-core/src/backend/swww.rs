use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::TransitionConfig;
use crate::error::{Result, WallsError};

use super::WallpaperApplier;

pub struct SwwwApplier {
    transition: TransitionConfig,
}

impl SwwwApplier {
    pub fn new(transition: TransitionConfig) -> Self {
        Self { transition }
    }

    fn build_command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("swww");
        cmd.arg("img").arg(path);
        cmd.arg("--transition-type").arg(&self.transition.r#type);
        cmd.arg("--transition-duration")
            .arg(self.transition.duration.to_string());
        cmd.arg("--transition-fps")
            .arg(self.transition.fps.to_string());
        cmd
    }
}

#[async_trait]
impl WallpaperApplier for SwwwApplier {
    async fn apply(&self, path: &Path) -> Result<()> {
        let output = self
            .build_command(path)
            .output()
            .await
            .map_err(|e| WallsError::Apply(format!("failed to run swww: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WallsError::Apply(format!("swww failed: {}", stderr.trim())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "swww"
    }
}
