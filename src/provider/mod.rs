//! Paged listing providers and the page fetchers built on them.
//!
//! Two paging styles are supported:
//! - cursor paging, where every item carries an opaque continuation token
//! - offset paging (`startAt` / `maxResults`), where the fetcher assigns each
//!   record a surrogate cursor derived from its absolute position

pub mod api_types;
pub mod client;
pub mod fetcher;

use async_trait::async_trait;

pub use api_types::{OffsetPage, ProviderItem, RecordTags};
pub use client::HttpListingProvider;
pub use fetcher::{CursorPageFetcher, OffsetPageFetcher, PageFetcher};

/// Failure to retrieve or decode a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("provider returned {status}: {body}")]
  Status { status: u16, body: String },
  #[error("failed to decode page: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("invalid endpoint {0}")]
  Endpoint(String),
  #[error("cursor {0:?} is not a position")]
  InvalidCursor(String),
  #[error("record at page position {0} has neither a cursor nor a signature")]
  MissingCursor(usize),
}

/// Provider with native cursors: items come newest first, each with its own cursor.
#[async_trait]
pub trait ListingProvider: Send + Sync {
  /// Retrieve up to `limit` items for `owner`, older than `before` when given.
  async fn retrieve_page(
    &self,
    owner: &str,
    limit: usize,
    before: Option<&str>,
    dataset_id: &str,
  ) -> Result<Vec<ProviderItem>, FetchError>;
}

/// Provider paging by position, newest first, without per-item cursors.
#[async_trait]
pub trait OffsetListingProvider: Send + Sync {
  async fn retrieve_range(
    &self,
    owner: &str,
    start_at: u64,
    max_results: usize,
    dataset_id: &str,
  ) -> Result<OffsetPage, FetchError>;
}
