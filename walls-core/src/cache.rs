use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{Result, WallsError};
use crate::models::{CacheKind, Wallpaper};
use crate::paths::WallsPaths;

const DEFAULT_EXTENSION: &str = ".jpg";
const PARTIAL_MARKER: &str = ".part-";

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct CacheStats {
    pub thumbnails_size: u64,
    pub full_size: u64,
    pub total_size: u64,
    pub thumbnail_count: usize,
    pub full_count: usize,
}

/// Local image cache: `<root>/thumbs` and `<root>/full`, files named `<id><ext>`.
pub struct CacheStore {
    thumbnails_dir: PathBuf,
    full_dir: PathBuf,
    client: reqwest::Client,
    thumbnail_timeout: Duration,
    download_timeout: Duration,
}

impl CacheStore {
    /// Create the directory roots and return a store downloading with `client`.
    pub fn open(paths: &WallsPaths, client: reqwest::Client) -> Result<Self> {
        let defaults = SearchConfig::default();
        let store = Self {
            thumbnails_dir: paths.thumbnails_dir(),
            full_dir: paths.full_dir(),
            client,
            thumbnail_timeout: defaults.thumbnail_timeout(),
            download_timeout: defaults.download_timeout(),
        };
        std::fs::create_dir_all(&store.thumbnails_dir)?;
        std::fs::create_dir_all(&store.full_dir)?;
        Ok(store)
    }

    pub fn with_timeouts(mut self, search: &SearchConfig) -> Self {
        self.thumbnail_timeout = search.thumbnail_timeout();
        self.download_timeout = search.download_timeout();
        self
    }

    pub fn full_dir(&self) -> &Path {
        &self.full_dir
    }

    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails_dir
    }

    /// Where `wallpaper` lives in the cache for `kind`. Pure; touches no disk.
    pub fn path_for(&self, wallpaper: &Wallpaper, kind: CacheKind) -> PathBuf {
        let (dir, url) = match kind {
            CacheKind::Thumbnail => (&self.thumbnails_dir, &wallpaper.thumb_url),
            CacheKind::Full => (&self.full_dir, &wallpaper.full_url),
        };
        dir.join(format!("{}{}", wallpaper.id, extension_for(url)))
    }

    /// Resolve `wallpaper` for `kind`, downloading it on first use.
    pub async fn fetch(&self, wallpaper: &Wallpaper, kind: CacheKind) -> Result<PathBuf> {
        let url = match kind {
            CacheKind::Thumbnail => &wallpaper.thumb_url,
            CacheKind::Full => &wallpaper.full_url,
        };
        self.ensure_downloaded(url, &self.path_for(wallpaper, kind))
            .await
    }

    /// Download `url` to `destination` unless a non-empty copy is already there.
    ///
    /// The body is streamed into a private temporary sibling and renamed into
    /// place once complete, so `destination` is either absent or whole.
    pub async fn ensure_downloaded(&self, url: &str, destination: &Path) -> Result<PathBuf> {
        if is_populated(destination).await {
            debug!(path = %destination.display(), "cache hit");
            return Ok(destination.to_path_buf());
        }
        if url.is_empty() {
            return Err(WallsError::Download("no source URL".into()));
        }

        let partial = partial_path(destination);
        let timeout = self.timeout_for(destination);
        let outcome = match self.transfer(url, &partial, timeout).await {
            Ok(bytes) => tokio::fs::rename(&partial, destination)
                .await
                .map(|()| bytes)
                .map_err(|e| WallsError::Download(e.to_string())),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(bytes) => {
                info!(url, path = %destination.display(), bytes, "downloaded");
                Ok(destination.to_path_buf())
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %partial.display(), "failed to remove partial download: {rm}");
                    }
                }
                warn!(url, "download failed: {e}");
                Err(e)
            }
        }
    }

    async fn transfer(&self, url: &str, partial: &Path, timeout: Duration) -> Result<u64> {
        let mut resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| WallsError::Download(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WallsError::Download(format!("HTTP {status} for {url}")));
        }

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| WallsError::Download(e.to_string()))?;
        let mut written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| WallsError::Download(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| WallsError::Download(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| WallsError::Download(e.to_string()))?;

        if written == 0 {
            return Err(WallsError::Download(format!("empty response body from {url}")));
        }
        Ok(written)
    }

    fn timeout_for(&self, destination: &Path) -> Duration {
        if destination.starts_with(&self.thumbnails_dir) {
            self.thumbnail_timeout
        } else {
            self.download_timeout
        }
    }

    /// Cached full-size images, most recently written first.
    pub fn list_cached(&self) -> Result<Vec<Wallpaper>> {
        let mut entries = match cached_files(&self.full_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));

        Ok(entries
            .iter()
            .map(|entry| Wallpaper::from_cached_file(&entry.path))
            .collect())
    }

    pub fn stats(&self) -> CacheStats {
        let (thumbnails_size, thumbnail_count) = dir_stats(&self.thumbnails_dir);
        let (full_size, full_count) = dir_stats(&self.full_dir);
        CacheStats {
            thumbnails_size,
            full_size,
            total_size: thumbnails_size + full_size,
            thumbnail_count,
            full_count,
        }
    }

    /// Prune the cache to stay under `max_bytes`. Deletes the oldest
    /// thumbnails first, then the oldest full images.
    pub fn prune(&self, max_bytes: u64) -> Result<u64> {
        let stats = self.stats();
        if stats.total_size <= max_bytes {
            return Ok(0);
        }

        let target = stats.total_size - max_bytes;
        let mut freed = prune_dir(&self.thumbnails_dir, target)?;
        if freed < target {
            freed += prune_dir(&self.full_dir, target - freed)?;
        }

        info!(freed_bytes = freed, "cache pruned");
        Ok(freed)
    }
}

/// File extension of the URL path including the dot, `.jpg` when absent.
pub fn extension_for(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

async fn is_populated(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn partial_path(destination: &Path) -> PathBuf {
    let n = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!("{name}{PARTIAL_MARKER}{}-{n}", std::process::id()))
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(PARTIAL_MARKER))
        .unwrap_or(false)
}

struct CachedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Complete files in `dir`. In-flight `.part-` downloads are not part of the
/// cache until they are renamed into place.
fn cached_files(dir: &Path) -> std::io::Result<Vec<CachedFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if is_partial(&path) {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() {
                files.push(CachedFile {
                    path,
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(UNIX_EPOCH),
                });
            }
        }
    }
    Ok(files)
}

fn prune_dir(dir: &Path, target: u64) -> Result<u64> {
    let mut files = match cached_files(dir) {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    files.sort_by_key(|f| f.modified);

    let mut freed = 0u64;
    for file in files {
        if freed >= target {
            break;
        }
        match std::fs::remove_file(&file.path) {
            Ok(()) => freed += file.size,
            Err(e) => debug!(path = %file.path.display(), "prune skipped file: {e}"),
        }
    }
    Ok(freed)
}

fn dir_stats(dir: &Path) -> (u64, usize) {
    let files = cached_files(dir).unwrap_or_default();
    (files.iter().map(|f| f.size).sum(), files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;
    use crate::testing::{http_response, serve, serve_with_delay, truncated_response};

    fn store_in(tmp: &tempfile::TempDir) -> CacheStore {
        let paths = WallsPaths {
            config_dir: tmp.path().join("config"),
            cache_dir: tmp.path().join("cache"),
        };
        CacheStore::open(&paths, reqwest::Client::new()).unwrap()
    }

    fn wallpaper(id: &str, thumb: &str, full: &str) -> Wallpaper {
        Wallpaper {
            id: id.into(),
            thumb_url: thumb.into(),
            full_url: full.into(),
            resolution: "1920x1080".into(),
            category: "general".into(),
            purity: "sfw".into(),
            file_type: "image/png".into(),
            origin: Origin::Remote,
        }
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://w.wallhaven.cc/full/ab/wallhaven-ab.png"), ".png");
        assert_eq!(extension_for("https://th.wallhaven.cc/small/ab/ab.jpg?x=1.gif"), ".jpg");
        assert_eq!(extension_for("https://example.com/image"), ".jpg");
        assert_eq!(extension_for(""), ".jpg");
        assert_eq!(extension_for("relative/pic.webp#frag"), ".webp");
    }

    #[test]
    fn test_path_for_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let wp = wallpaper(
            "abc123",
            "https://th.wallhaven.cc/small/ab/abc123.jpg",
            "https://w.wallhaven.cc/full/ab/wallhaven-abc123.png",
        );

        let full = store.path_for(&wp, CacheKind::Full);
        let thumb = store.path_for(&wp, CacheKind::Thumbnail);
        assert_eq!(full, store.full_dir().join("abc123.png"));
        assert_eq!(thumb, store.thumbnails_dir().join("abc123.jpg"));

        // order and unrelated calls do not matter
        let other = wallpaper("zzz", "", "https://example.com/x");
        let _ = store.path_for(&other, CacheKind::Full);
        assert_eq!(store.path_for(&wp, CacheKind::Thumbnail), thumb);
        assert_eq!(store.path_for(&wp, CacheKind::Full), full);
        assert_eq!(store.path_for(&other, CacheKind::Thumbnail), store.thumbnails_dir().join("zzz.jpg"));
    }

    #[tokio::test]
    async fn test_ensure_downloaded_transfers_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let server = serve(|_| http_response("200 OK", "image/jpeg", b"jpegbytes")).await;
        let url = server.url("/full/abc.jpg");
        let dest = store.full_dir().join("abc.jpg");

        let first = store.ensure_downloaded(&url, &dest).await.unwrap();
        let second = store.ensure_downloaded(&url, &dest).await.unwrap();

        assert_eq!(first, dest);
        assert_eq!(second, dest);
        assert_eq!(server.hits(), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpegbytes");
        assert_eq!(dir_names(store.full_dir()), vec!["abc.jpg"]);
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let dest = store.full_dir().join("seeded.jpg");
        std::fs::write(&dest, b"already here").unwrap();

        // unroutable URL: any network access would fail the call
        let path = store
            .ensure_downloaded("http://127.0.0.1:9/never", &dest)
            .await
            .unwrap();
        assert_eq!(path, dest);
    }

    #[tokio::test]
    async fn test_empty_file_is_redownloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let server = serve(|_| http_response("200 OK", "image/jpeg", b"fresh")).await;
        let dest = store.full_dir().join("empty.jpg");
        std::fs::write(&dest, b"").unwrap();

        store.ensure_downloaded(&server.url("/e.jpg"), &dest).await.unwrap();
        assert_eq!(server.hits(), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_interrupted_transfer_leaves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let server = serve(|_| truncated_response(1000, b"only-a-few-bytes")).await;
        let dest = store.full_dir().join("broken.jpg");

        let err = store
            .ensure_downloaded(&server.url("/broken.jpg"), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, WallsError::Download(_)));
        assert!(!dest.exists());
        assert!(dir_names(store.full_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_download_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let server = serve(|_| http_response("404 Not Found", "text/plain", b"nope")).await;
        let dest = store.thumbnails_dir().join("missing.jpg");

        let err = store
            .ensure_downloaded(&server.url("/missing.jpg"), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, WallsError::Download(ref m) if m.contains("404")));
        assert!(dir_names(store.thumbnails_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let wp = wallpaper("nothumb", "", "https://example.com/x.jpg");
        let err = store.fetch(&wp, CacheKind::Thumbnail).await.unwrap_err();
        assert!(matches!(err, WallsError::Download(_)));
    }

    #[test]
    fn test_list_cached_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let base = SystemTime::now() - Duration::from_secs(3600);

        for (name, offset) in [("t1.jpg", 0), ("t3.png", 20), ("t2.jpg", 10)] {
            let path = store.full_dir().join(name);
            std::fs::write(&path, b"img").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(offset)).unwrap();
        }
        std::fs::write(store.full_dir().join("t4.jpg.part-1-0"), b"partial").unwrap();

        let listed = store.list_cached().unwrap();
        let ids: Vec<&str> = listed.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
        assert_eq!(listed[0].file_type, ".png");
        assert!(listed.iter().all(|w| w.is_cached_entry()));
    }

    #[test]
    fn test_list_cached_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        std::fs::remove_dir_all(store.full_dir()).unwrap();
        assert!(store.list_cached().unwrap().is_empty());
    }

    #[test]
    fn test_cache_stats_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let stats = store.stats();
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.thumbnail_count, 0);
        assert_eq!(stats.full_count, 0);
    }

    #[test]
    fn test_prune_removes_thumbnails_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);

        for i in 0..3 {
            std::fs::write(store.thumbnails_dir().join(format!("t{i}.jpg")), vec![0u8; 1000]).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }
        for i in 0..2 {
            std::fs::write(store.full_dir().join(format!("f{i}.jpg")), vec![0u8; 1000]).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }

        let stats = store.stats();
        assert_eq!(stats.total_size, 5000);

        // need to free 2500 bytes: all three thumbnails go before any full image
        let freed = store.prune(2500).unwrap();
        assert_eq!(freed, 3000);
        let stats = store.stats();
        assert_eq!(stats.thumbnail_count, 0);
        assert_eq!(stats.full_count, 2);

        assert_eq!(store.prune(10_000).unwrap(), 0);
    }

    #[test]
    fn test_partial_downloads_are_not_cache_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.full_dir().join("a.jpg"), b"abc").unwrap();
        let partial = store.full_dir().join("b.jpg.part-1-0");
        std::fs::write(&partial, vec![0u8; 5000]).unwrap();
        std::fs::create_dir(store.full_dir().join("nested")).unwrap();

        assert_eq!(store.list_cached().unwrap().len(), 1);
        let stats = store.stats();
        assert_eq!(stats.full_count, 1);
        assert_eq!(stats.full_size, 3);
        assert_eq!(stats.total_size, 3);

        // pruning everything still leaves the in-flight download alone
        assert_eq!(store.prune(0).unwrap(), 3);
        assert!(partial.exists());
        assert_eq!(store.stats().full_count, 0);
    }

    #[tokio::test]
    async fn test_slow_full_download_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(&tmp);
        store.download_timeout = Duration::from_millis(200);
        store.thumbnail_timeout = Duration::from_secs(5);
        let server = serve_with_delay(
            |_| Duration::from_millis(600),
            |_| http_response("200 OK", "image/jpeg", b"late"),
        )
        .await;
        let wp = wallpaper("slow", &server.url("/slow-thumb.jpg"), &server.url("/slow.jpg"));

        let err = store.fetch(&wp, CacheKind::Full).await.unwrap_err();
        assert!(matches!(err, WallsError::Download(_)));
        assert!(dir_names(store.full_dir()).is_empty());

        // thumbnails use their own budget
        let thumb = store.fetch(&wp, CacheKind::Thumbnail).await.unwrap();
        assert_eq!(std::fs::read(thumb).unwrap(), b"late");
    }
}
