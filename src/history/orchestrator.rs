//! Drives page fetches for a key: decides which page to ask for, marks the
//! entry as fetching, then reconciles the result into the store.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(HistoryStore::default());
//! store.init("https://api.mainnet-beta.solana.com/")?;
//! let orchestrator = FetchOrchestrator::new(store.clone(), Arc::new(fetcher), 5);
//!
//! // Status is `Fetching` as soon as this returns
//! let handle = orchestrator.trigger("Vote111111111111111111111111111111111111111", false)?;
//!
//! // Later, in the render path
//! let entry = store.get(scope, key)?;
//! ```

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::store::{Applied, HistoryStore, ScopeToken, StoreError};
use super::types::{CacheEntry, FetchStatus, History, PageUpdate};
use crate::provider::PageFetcher;
use crate::scope::Cluster;

/// Number of records requested per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Which page, if any, a trigger should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
  /// Start over from the most recent page
  FirstPage,
  /// Continue after the oldest known record
  NextPage { cursor: String },
  /// Everything up to the oldest record is cached
  Complete,
}

impl FetchPlan {
  fn cursor(&self) -> Option<&str> {
    match self {
      FetchPlan::NextPage { cursor } => Some(cursor.as_str()),
      _ => None,
    }
  }
}

/// Decide what to fetch for a key given its cached entry.
pub fn plan(entry: Option<&CacheEntry>, refresh: bool) -> FetchPlan {
  let history = match entry.and_then(|e| e.data.as_ref()) {
    Some(h) if !refresh && !h.fetched.is_empty() => h,
    _ => return FetchPlan::FirstPage,
  };

  if history.found_oldest {
    return FetchPlan::Complete;
  }

  match history.tail_cursor() {
    Some(cursor) => FetchPlan::NextPage {
      cursor: cursor.to_string(),
    },
    // Nothing to continue from
    None => FetchPlan::FirstPage,
  }
}

/// Result of one completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
  pub key: String,
  pub status: FetchStatus,
  /// Records returned by the provider (zero on failure)
  pub page_len: usize,
  pub applied: Applied,
}

/// A fetch that has been marked in the store but not yet sent.
pub struct PendingFetch {
  store: Arc<HistoryStore>,
  fetcher: Arc<dyn PageFetcher>,
  token: ScopeToken,
  key: String,
  cursor: Option<String>,
  seq: u64,
  limit: usize,
}

impl PendingFetch {
  pub fn key(&self) -> &str {
    &self.key
  }

  /// Cursor this fetch continues from, `None` for a first page.
  pub fn cursor(&self) -> Option<&str> {
    self.cursor.as_deref()
  }

  /// Perform the fetch and apply its completion to the store.
  pub async fn run(self) -> Result<FetchOutcome, StoreError> {
    let result = self
      .fetcher
      .fetch_page(&self.key, self.cursor.as_deref(), self.limit)
      .await;

    let (status, page_len, applied) = match result {
      Ok(records) => {
        let page_len = records.len();
        let found_oldest = page_len < self.limit;
        let update = PageUpdate::page(History::new(records, found_oldest), self.cursor.clone());
        let applied = self.store.complete(
          &self.token,
          &self.key,
          self.seq,
          FetchStatus::Fetched,
          update,
          None,
        )?;
        (FetchStatus::Fetched, page_len, applied)
      }
      Err(e) => {
        warn!(
          key = %self.key,
          cursor = ?self.cursor,
          cluster = %Cluster::classify(self.token.scope()),
          error = %e,
          "history fetch failed"
        );
        let applied = self.store.complete(
          &self.token,
          &self.key,
          self.seq,
          FetchStatus::FetchFailed,
          PageUpdate::status_only(self.cursor.clone()),
          Some(e.to_string()),
        )?;
        (FetchStatus::FetchFailed, 0, applied)
      }
    };

    Ok(FetchOutcome {
      key: self.key,
      status,
      page_len,
      applied,
    })
  }
}

/// Decides pagination for each trigger and drives fetch → reconcile → store.
///
/// Concurrent triggers for one key are not deduplicated; the store decides how
/// their completions are ordered.
#[derive(Clone)]
pub struct FetchOrchestrator {
  store: Arc<HistoryStore>,
  fetcher: Arc<dyn PageFetcher>,
  page_size: usize,
}

impl FetchOrchestrator {
  pub fn new(store: Arc<HistoryStore>, fetcher: Arc<dyn PageFetcher>, page_size: usize) -> Self {
    Self {
      store,
      fetcher,
      page_size: page_size.max(1),
    }
  }

  pub fn store(&self) -> &Arc<HistoryStore> {
    &self.store
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Decide the next fetch for `key` and mark its entry as fetching.
  ///
  /// Returns `None` when the history is complete and nothing was changed.
  pub fn begin(&self, key: &str, refresh: bool) -> Result<Option<PendingFetch>, StoreError> {
    let token = self.store.active_scope()?;
    let entry = self.store.get(token.scope(), key)?;

    let plan = plan(entry.as_ref(), refresh);
    debug!(key, refresh, ?plan, "planned history fetch");
    if plan == FetchPlan::Complete {
      return Ok(None);
    }

    let Some(seq) = self.store.mark_fetching(&token, key)? else {
      // Scope changed between reading and marking
      return Ok(None);
    };

    Ok(Some(PendingFetch {
      store: Arc::clone(&self.store),
      fetcher: Arc::clone(&self.fetcher),
      token,
      key: key.to_string(),
      cursor: plan.cursor().map(String::from),
      seq,
      limit: self.page_size,
    }))
  }

  /// Start fetching the next page for `key` in the background.
  ///
  /// The entry is `Fetching` by the time this returns.
  pub fn trigger(
    &self,
    key: &str,
    refresh: bool,
  ) -> Result<Option<JoinHandle<Result<FetchOutcome, StoreError>>>, StoreError> {
    Ok(self.begin(key, refresh)?.map(|pending| tokio::spawn(pending.run())))
  }

  /// Fetch the next page for `key` and wait for it to be applied.
  pub async fn fetch(&self, key: &str, refresh: bool) -> Result<Option<FetchOutcome>, StoreError> {
    match self.begin(key, refresh)? {
      Some(pending) => pending.run().await.map(Some),
      None => Ok(None),
    }
  }
}
