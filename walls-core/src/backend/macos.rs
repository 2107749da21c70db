use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, WallsError};

use super::WallpaperApplier;

// The path arrives as the script's only argument, so it never needs quoting.
const SET_DESKTOP_SCRIPT: &str = r#"on run argv
tell application "System Events"
repeat with desktop_item in desktops
set picture of desktop_item to POSIX file (item 1 of argv)
end repeat
end tell
end run"#;

/// Sets the picture of every desktop through System Events.
pub struct OsaScriptApplier;

impl OsaScriptApplier {
    pub fn new() -> Self {
        Self
    }

    fn build_command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(SET_DESKTOP_SCRIPT).arg(path);
        cmd
    }
}

impl Default for OsaScriptApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WallpaperApplier for OsaScriptApplier {
    async fn apply(&self, path: &Path) -> Result<()> {
        let output = self
            .build_command(path)
            .output()
            .await
            .map_err(|e| WallsError::Apply(format!("failed to run osascript: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WallsError::Apply(format!("osascript failed: {}", stderr.trim())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "osascript"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_osascript_command_args() {
        let path = PathBuf::from("/Users/me/Library/Caches/walls/full/say \"hi\".jpg");
        let cmd = OsaScriptApplier::new().build_command(&path);
        let prog = cmd.as_std().get_program().to_string_lossy().to_string();
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(prog, "osascript");
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], "-e");
        assert!(args[1].contains("repeat with desktop_item in desktops"));
        assert!(!args[1].contains("say"));
        assert_eq!(args[2], path.to_string_lossy());
    }
}
