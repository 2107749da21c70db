use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use walls_core::config::SearchConfig;
use walls_core::error::{Result, WallsError};
use walls_core::models::{Origin, PageMeta, Purity, SearchPage, Wallpaper};
use walls_core::sources::CatalogSource;

const API_KEY_HEADER: &str = "X-API-Key";

pub struct WallhavenClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl WallhavenClient {
    pub fn new(config: &SearchConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.search_timeout(),
        }
    }
}

#[async_trait]
impl CatalogSource for WallhavenClient {
    fn name(&self) -> &str {
        "Wallhaven"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, purity: Purity, page: u32) -> Result<SearchPage> {
        let mut req = self
            .client
            .get(format!("{}/search", self.base_url))
            .timeout(self.timeout)
            .query(&[
                ("q", query),
                ("page", &page.to_string()),
                ("purity", &purity.as_query()),
            ]);

        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WallsError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WallsError::from_status(status));
        }

        let body: WallhavenResponse = resp
            .json()
            .await
            .map_err(|e| WallsError::Network(format!("invalid response body: {e}")))?;
        let result = body.into_page(page);
        debug!(
            query,
            page = result.meta.current_page,
            last_page = result.meta.last_page,
            count = result.wallpapers.len(),
            "search completed"
        );
        Ok(result)
    }
}

// -- API response types --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WallhavenResponse {
    data: Vec<WallhavenWallpaper>,
    meta: Option<WallhavenMeta>,
}

impl WallhavenResponse {
    fn into_page(self, requested: u32) -> SearchPage {
        let meta = self.meta.unwrap_or_default();
        SearchPage {
            wallpapers: self.data.into_iter().map(WallhavenWallpaper::into_wallpaper).collect(),
            meta: PageMeta::from_reported(requested, meta.current_page, meta.last_page, meta.total),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WallhavenWallpaper {
    id: Option<String>,
    path: Option<String>,
    resolution: Option<String>,
    category: Option<String>,
    purity: Option<String>,
    file_type: Option<String>,
    thumbs: Option<WallhavenThumbs>,
}

impl WallhavenWallpaper {
    fn into_wallpaper(self) -> Wallpaper {
        // small, then large, then nothing
        let thumb_url = self
            .thumbs
            .and_then(|t| non_empty(t.small).or_else(|| non_empty(t.large)))
            .unwrap_or_default();
        Wallpaper {
            id: self.id.unwrap_or_default(),
            thumb_url,
            full_url: self.path.unwrap_or_default(),
            resolution: self.resolution.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            purity: self.purity.unwrap_or_default(),
            file_type: self.file_type.unwrap_or_default(),
            origin: Origin::Remote,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WallhavenThumbs {
    small: Option<String>,
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WallhavenMeta {
    current_page: Option<u32>,
    last_page: Option<u32>,
    total: Option<u64>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}
