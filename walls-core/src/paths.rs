use std::path::PathBuf;

use crate::error::{Result, WallsError};

#[derive(Debug, Clone)]
pub struct WallsPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl WallsPaths {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WallsError::Config("cannot resolve XDG config dir".into()))?
            .join("walls");

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| WallsError::Config("cannot resolve XDG cache dir".into()))?
            .join("walls");

        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    /// Point the cache root somewhere else (config `general.cache_dir`).
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.cache_dir.join("thumbs")
    }

    pub fn full_dir(&self) -> PathBuf {
        self.cache_dir.join("full")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.cache_dir,
            &self.thumbnails_dir(),
            &self.full_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
