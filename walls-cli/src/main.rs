mod browse;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use walls_core::backend::create_applier;
use walls_core::cache::CacheStore;
use walls_core::config::{Config, API_KEY_ENV};
use walls_core::controller::Services;
use walls_core::models::Purity;
use walls_core::paths::WallsPaths;
use walls_core::sources::CatalogSource;
use walls_source_wallhaven::WallhavenClient;

#[derive(Parser)]
#[command(name = "walls", about = "Search, cache and set wallpapers from Wallhaven")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse search results and cached wallpapers interactively (default)
    Browse,
    /// Search the catalog and print one page of results as JSON
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Purity code, e.g. 100 (sfw), 110 (sfw+sketchy), 111 (all)
        #[arg(long)]
        purity: Option<Purity>,
    },
    /// Set a local image file as the wallpaper
    Apply {
        file: PathBuf,
    },
    /// Manage cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache size stats
    Stats,
    /// Prune cache to configured max size
    Prune,
    /// List cached full-size wallpapers, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // a missing .env is normal
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walls=info".into()),
        )
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let paths = WallsPaths::new()?;
    let mut config = Config::load_or_default(&paths);
    config.apply_env();
    let paths = config.resolve_paths(paths);

    match cli.command.unwrap_or(Commands::Browse) {
        Commands::Browse => {
            let http = http_client()?;
            let source = wallhaven(&config, http.clone());
            if !source.has_api_key() {
                warn!("{API_KEY_ENV} not set; only SFW results are available");
            }
            let store = CacheStore::open(&paths, http)?.with_timeouts(&config.search);
            info!(cache = %paths.cache_dir.display(), backend = %config.general.backend, "starting browser");
            let services = Services {
                source,
                store: Arc::new(store),
                applier: create_applier(&config),
            };
            browse::run(&config, services).await;
        }
        Commands::Search {
            query,
            page,
            purity,
        } => {
            let source = wallhaven(&config, http_client()?);
            let purity = purity.unwrap_or(config.search.default_purity);
            let results = source.search(&query, purity, page.max(1)).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Apply { file } => {
            if !file.is_file() {
                bail!("no such file: {}", file.display());
            }
            let applier = create_applier(&config);
            applier.apply(&file).await?;
            println!("wallpaper set via {}", applier.name());
        }
        Commands::Cache { action } => {
            let store = CacheStore::open(&paths, http_client()?)?;
            match action {
                CacheAction::Stats => {
                    let stats = store.stats();
                    println!(
                        "thumbnails: {} ({} files)",
                        format_bytes(stats.thumbnails_size),
                        stats.thumbnail_count
                    );
                    println!(
                        "full:       {} ({} files)",
                        format_bytes(stats.full_size),
                        stats.full_count
                    );
                    println!("total:      {}", format_bytes(stats.total_size));
                }
                CacheAction::Prune => {
                    let max_bytes = config.general.cache_max_mb * 1024 * 1024;
                    let freed = store.prune(max_bytes)?;
                    if freed > 0 {
                        println!("freed {}", format_bytes(freed));
                    } else {
                        println!("cache within limit");
                    }
                }
                CacheAction::List => {
                    let cached = store.list_cached()?;
                    if cached.is_empty() {
                        println!("no cached wallpapers");
                    }
                    for wallpaper in cached {
                        let modified = std::fs::metadata(&wallpaper.full_url)
                            .and_then(|m| m.modified())
                            .map(|t| {
                                chrono::DateTime::<chrono::Local>::from(t)
                                    .format("%Y-%m-%d %H:%M")
                                    .to_string()
                            })
                            .unwrap_or_else(|_| "-".into());
                        println!("{modified}  {:<12} {}", wallpaper.id, wallpaper.full_url);
                    }
                }
            }
        }
    }

    Ok(())
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("walls/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn wallhaven(config: &Config, http: reqwest::Client) -> Arc<dyn CatalogSource> {
    Arc::new(WallhavenClient::new(&config.search, http))
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
