use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use url::Url;

use histcache::config::{Config, Pagination};
use histcache::history::{CacheEntry, FetchOrchestrator, FetchStatus, HistoryStore};
use histcache::provider::{CursorPageFetcher, HttpListingProvider, OffsetPageFetcher, PageFetcher};
use histcache::scope::{Scope, ScopeWatcher};

#[derive(Parser, Debug)]
#[command(name = "histcache")]
#[command(about = "Page through account history and print what has been cached")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/histcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Listing provider endpoint, overrides the config file
  #[arg(short, long)]
  endpoint: Option<Url>,

  /// Records per page, overrides the config file
  #[arg(long)]
  page_size: Option<usize>,

  /// Write logs to a daily rolling file in this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,

  /// Number of pages to fetch per key
  #[arg(short, long, default_value_t = 1)]
  pages: usize,

  /// Start over from the most recent page
  #[arg(short, long)]
  refresh: bool,

  /// Print entries as JSON
  #[arg(long)]
  json: bool,

  /// Account keys to fetch history for
  #[arg(required = true)]
  keys: Vec<String>,
}

fn init_logging(log_dir: Option<&Path>) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_env("HISTCACHE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  let (writer, guard) = match log_dir {
    Some(dir) => {
      tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "histcache.log"))
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(log_dir.is_none())
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

/// Fetch up to `pages` pages for `key`, stopping early at the oldest record or on failure.
async fn page_through(orchestrator: &FetchOrchestrator, key: &str, pages: usize, refresh: bool) -> Result<()> {
  for page in 0..pages {
    let Some(outcome) = orchestrator.fetch(key, refresh && page == 0).await? else {
      info!(key, "history complete");
      break;
    };
    if outcome.status == FetchStatus::FetchFailed {
      break;
    }
  }
  Ok(())
}

fn print_entries(entries: &BTreeMap<String, CacheEntry>) {
  for (key, entry) in entries {
    let status = match entry.status {
      FetchStatus::Fetching => "fetching",
      FetchStatus::Fetched => "fetched",
      FetchStatus::FetchFailed => "failed",
    };
    let oldest = if entry.found_oldest() { ", oldest reached" } else { "" };
    println!("{} [{}] {} records{}", key, status, entry.records().len(), oldest);

    if let Some(error) = &entry.last_error {
      println!("  error: {}", error);
    }
    for record in entry.records() {
      match &record.err {
        Some(err) => println!("  {:>12}  {}  (failed: {})", record.slot, record.signature, err),
        None => println!("  {:>12}  {}", record.slot, record.signature),
      }
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging(args.log_dir.as_deref())?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref(), args.endpoint)?;
  if let Some(page_size) = args.page_size {
    config.page_size = page_size;
    config.validate()?;
  }

  let store = Arc::new(HistoryStore::new(config.sequencing));
  let scope = Scope::new(config.endpoint.clone());
  let (_scope_tx, scope_rx) = watch::channel(scope.clone());
  let _watcher = ScopeWatcher::spawn(Arc::clone(&store), scope_rx);

  let provider = HttpListingProvider::new(&config)?;
  let fetcher: Arc<dyn PageFetcher> = match config.pagination {
    Pagination::Cursor => Arc::new(CursorPageFetcher::new(provider, config.dataset_id.clone())),
    Pagination::Offset => Arc::new(OffsetPageFetcher::new(provider, config.dataset_id.clone())),
  };
  let orchestrator = FetchOrchestrator::new(Arc::clone(&store), fetcher, config.page_size);

  info!(
    scope = scope.key(),
    cluster = %scope.cluster,
    page_size = orchestrator.page_size(),
    keys = args.keys.len(),
    "fetching history"
  );

  let results = join_all(
    args
      .keys
      .iter()
      .map(|key| page_through(&orchestrator, key, args.pages, args.refresh)),
  )
  .await;
  for result in results {
    result?;
  }

  let entries = store.list_entries(scope.key())?;
  if args.json {
    println!("{}", serde_json::to_string_pretty(&entries)?);
  } else {
    print_entries(&entries);
  }

  Ok(())
}
