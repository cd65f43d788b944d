//! Page fetchers: one page of normalized records per call.

use async_trait::async_trait;

use super::api_types::record_from_tags;
use super::{FetchError, ListingProvider, OffsetListingProvider};
use crate::history::types::Record;

/// Fetches one page of history for a key.
#[async_trait]
pub trait PageFetcher: Send + Sync {
  /// Fetch up to `limit` records for `key`, starting right after `cursor`
  /// (the most recent page when `cursor` is `None`). Provider order is kept.
  async fn fetch_page(
    &self,
    key: &str,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<Vec<Record>, FetchError>;
}

/// Fetcher over a provider that reports a cursor for every item.
///
/// An item without a cursor is paged by its signature instead; an item with
/// neither fails the page, since nothing could continue after it.
pub struct CursorPageFetcher<P> {
  provider: P,
  dataset_id: String,
}

impl<P: ListingProvider> CursorPageFetcher<P> {
  pub fn new(provider: P, dataset_id: impl Into<String>) -> Self {
    Self {
      provider,
      dataset_id: dataset_id.into(),
    }
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }
}

#[async_trait]
impl<P: ListingProvider> PageFetcher for CursorPageFetcher<P> {
  async fn fetch_page(
    &self,
    key: &str,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<Vec<Record>, FetchError> {
    let items = self
      .provider
      .retrieve_page(key, limit, cursor, &self.dataset_id)
      .await?;

    items
      .into_iter()
      .take(limit)
      .enumerate()
      .map(|(position, item)| {
        let mut record = item.into_record();
        if record.cursor.is_none() {
          if record.signature.is_empty() {
            return Err(FetchError::MissingCursor(position));
          }
          record.cursor = Some(record.signature.clone());
        }
        Ok(record)
      })
      .collect()
  }
}

/// Fetcher over a position-paged provider.
///
/// Each record gets its absolute position as a surrogate cursor, so the page
/// after cursor `n` starts at position `n + 1`.
pub struct OffsetPageFetcher<P> {
  provider: P,
  dataset_id: String,
}

impl<P: OffsetListingProvider> OffsetPageFetcher<P> {
  pub fn new(provider: P, dataset_id: impl Into<String>) -> Self {
    Self {
      provider,
      dataset_id: dataset_id.into(),
    }
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }
}

fn start_after(cursor: Option<&str>) -> Result<u64, FetchError> {
  match cursor {
    None => Ok(0),
    Some(c) => c
      .parse::<u64>()
      .ok()
      .and_then(|position| position.checked_add(1))
      .ok_or_else(|| FetchError::InvalidCursor(c.to_string())),
  }
}

#[async_trait]
impl<P: OffsetListingProvider> PageFetcher for OffsetPageFetcher<P> {
  async fn fetch_page(
    &self,
    key: &str,
    cursor: Option<&str>,
    limit: usize,
  ) -> Result<Vec<Record>, FetchError> {
    let start_at = start_after(cursor)?;
    let page = self
      .provider
      .retrieve_range(key, start_at, limit, &self.dataset_id)
      .await?;

    Ok(
      page
        .items
        .iter()
        .take(limit)
        .zip(start_at..)
        .map(|(tags, position)| record_from_tags(tags, Some(position.to_string())))
        .collect(),
    )
  }
}
