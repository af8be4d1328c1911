//! # Photo Search CLI (`photos`)
//!
//! Terminal front end for the photo-search core: runs searches with paging,
//! fills the image cache, and inspects the disk tier.
//!
//! ## Usage
//!
//! ```bash
//! photos --config ./config/photos.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `photos search "<query>"` | Search and list results, optionally several pages |
//! | `photos fetch <url>` | Fetch one resource through the cache |
//! | `photos cache path` | Show the disk-cache directory |
//! | `photos cache list` | List disk-cache entries |
//! | `photos cache key <url>` | Print the cache key of a locator |
//!
//! The API key is read from the environment variable named by
//! `[api].credential_env` (default `CLIENT_ID`) when a search runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

use photo_search::config::{self, Config};
use photo_search::disk_store::DiskStore;
use photo_search::fetch_cache::FetchCache;
use photo_search::key_codec;
use photo_search::models::{ResourceLocator, Variant};
use photo_search::session::{SearchSession, SearchView};
use photo_search::transport::{Transport, UnsplashTransport};

/// Photo Search CLI: search an image API and cache the results locally.
#[derive(Parser)]
#[command(
    name = "photos",
    about = "Photo Search: paged image search with a deduplicating two-tier cache",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/photos.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/photos.toml")]
    config: PathBuf,

    /// Log cache and network activity.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for photos.
    ///
    /// Loads the first page, then advances page by page up to `--pages`.
    Search {
        /// The search query.
        query: String,

        /// Number of pages to load.
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Download the images of every loaded result into the cache.
        #[arg(long)]
        download: bool,

        /// Image variant to download: `thumb` or `regular`.
        #[arg(long, default_value = "thumb")]
        variant: Variant,
    },

    /// Fetch one resource through the cache.
    Fetch {
        /// Resource URL.
        url: String,

        /// Variant the URL belongs to: `thumb` or `regular`.
        #[arg(long, default_value = "thumb")]
        variant: Variant,

        /// Write the bytes to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Inspect the disk cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the disk-cache directory.
    Path,
    /// List entries stored in the disk cache.
    List,
    /// Print the cache key derived from a URL.
    Key {
        url: String,
        #[arg(long, default_value = "thumb")]
        variant: Variant,
    },
}

/// Prints session notifications to the terminal.
struct ConsoleView;

impl SearchView for ConsoleView {
    fn on_loading_started(&self) {
        println!("Searching...");
    }

    fn on_results_ready(&self, count: usize) {
        println!("{} results", count);
    }

    fn on_no_results(&self) {
        println!("No results.");
    }

    fn on_partial_reload(&self, range: Range<usize>) {
        println!("+ results {}..={}", range.start, range.end - 1);
    }

    fn on_error(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search {
            query,
            pages,
            download,
            variant,
        } => {
            run_search(&cfg, &query, pages, download, variant).await?;
        }
        Commands::Fetch { url, variant, out } => {
            run_fetch(&cfg, &url, variant, out).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Path => {
                println!("{}", cfg.cache.resolved_dir().display());
                if !cfg.cache.disk {
                    println!("(disk tier disabled in config)");
                }
            }
            CacheAction::List => {
                run_cache_list(&cfg).await?;
            }
            CacheAction::Key { url, variant } => {
                let key = key_codec::encode(&ResourceLocator::new(url), variant)?;
                println!("{}", key);
            }
        },
    }

    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    pages: u32,
    download: bool,
    variant: Variant,
) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(UnsplashTransport::new(&cfg.api)?);
    let cache = FetchCache::from_config(&cfg.cache, transport.clone());
    let session = SearchSession::new(transport, cache, Arc::new(ConsoleView), cfg.api.page_size);

    // Failures are already reported by the view.
    if session.start_search(query).await.is_err() {
        std::process::exit(1);
    }

    for _ in 1..pages {
        match session.advance_page().await {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => std::process::exit(1),
        }
    }

    let results = session.results().snapshot();
    for (i, d) in results.iter().enumerate() {
        println!("{:>4}  {:<12} {}", i, d.id, d.caption().unwrap_or(""));
    }

    if download && !results.is_empty() {
        let images = session.images_for(0..results.len(), variant).await;
        let bytes: usize = images.iter().map(|b| b.len()).sum();
        println!(
            "downloaded {}/{} images ({} bytes)",
            images.len(),
            results.len(),
            bytes
        );
        print_stats(session.cache());
    }

    Ok(())
}

async fn run_fetch(cfg: &Config, url: &str, variant: Variant, out: Option<PathBuf>) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(UnsplashTransport::new(&cfg.api)?);
    let cache = FetchCache::from_config(&cfg.cache, transport);
    let locator = ResourceLocator::new(url);

    let bytes = cache.get(&locator, variant).await?;
    println!("key:   {}", key_codec::encode(&locator, variant)?);
    println!("bytes: {}", bytes.len());
    print_stats(&cache);

    if let Some(path) = out {
        tokio::fs::write(&path, &bytes[..])
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    Ok(())
}

async fn run_cache_list(cfg: &Config) -> Result<()> {
    let store = DiskStore::open(&cfg.cache.resolved_dir());
    if !store.is_persistent() {
        println!("(using transient cache at {})", store.root().display());
    }

    let ids = store.list().await?;
    if ids.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    println!("{:<8} LOCATOR", "VARIANT");
    for id in &ids {
        match key_codec::decode(id) {
            Some((locator, variant)) => println!("{:<8} {}", variant, locator),
            None => println!("{:<8} {}", "?", id),
        }
    }
    println!("{} entries", ids.len());

    Ok(())
}

fn print_stats(cache: &FetchCache) {
    let s = cache.stats();
    println!(
        "cache: {} memory hits, {} disk hits, {} network fetches, {} joined, {} failed",
        s.memory_hits, s.disk_hits, s.network_fetches, s.joined, s.failures
    );
}
