use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Purity, SearchPage};

/// A remote wallpaper catalog that can be searched page by page.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Display name (e.g. "Wallhaven")
    fn name(&self) -> &str;
    /// Whether requests carry an API credential. Without one the catalog only
    /// serves safe content.
    fn has_api_key(&self) -> bool;
    async fn search(&self, query: &str, purity: Purity, page: u32) -> Result<SearchPage>;
}
