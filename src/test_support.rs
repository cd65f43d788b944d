//! In-memory providers and fetchers for tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::history::types::Record;
use crate::provider::api_types::{TAG_SIGNATURE, TAG_SLOT};
use crate::provider::{
  FetchError, ListingProvider, OffsetListingProvider, OffsetPage, PageFetcher, ProviderItem,
  RecordTags,
};

fn tags(signature: &str, slot: usize) -> RecordTags {
  RecordTags::from([
    (TAG_SIGNATURE.to_string(), signature.to_string()),
    (TAG_SLOT.to_string(), slot.to_string()),
  ])
}

/// Cursor-paged provider over a fixed newest-first list. Cursors are signatures.
#[derive(Default)]
pub(crate) struct MemoryProvider {
  records: HashMap<String, Vec<String>>,
  failure: Mutex<Option<String>>,
  calls: Mutex<Vec<Option<String>>>,
  omit_cursors: bool,
}

impl MemoryProvider {
  pub fn with_records(owner: &str, signatures: &[&str]) -> Self {
    Self {
      records: HashMap::from([(
        owner.to_string(),
        signatures.iter().map(|s| s.to_string()).collect(),
      )]),
      ..Default::default()
    }
  }

  /// Report items with empty cursors, as some providers do.
  pub fn without_cursors(mut self) -> Self {
    self.omit_cursors = true;
    self
  }

  /// Make the next call fail with `message`.
  pub fn fail_next(&self, message: &str) {
    *self.failure.lock().unwrap() = Some(message.to_string());
  }

  /// Cursors requested so far, in call order.
  pub fn calls(&self) -> Vec<Option<String>> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl ListingProvider for MemoryProvider {
  async fn retrieve_page(
    &self,
    owner: &str,
    limit: usize,
    before: Option<&str>,
    _dataset_id: &str,
  ) -> Result<Vec<ProviderItem>, FetchError> {
    self.calls.lock().unwrap().push(before.map(String::from));
    if let Some(message) = self.failure.lock().unwrap().take() {
      return Err(FetchError::Status {
        status: 503,
        body: message,
      });
    }

    let all = self.records.get(owner).map(Vec::as_slice).unwrap_or(&[]);
    let start = match before {
      None => 0,
      Some(cursor) => match all.iter().position(|s| s == cursor) {
        Some(i) => i + 1,
        None => return Ok(Vec::new()),
      },
    };

    Ok(
      all
        .iter()
        .enumerate()
        .skip(start)
        .take(limit)
        .map(|(i, sig)| ProviderItem {
          record_tags: tags(sig, all.len() - i),
          cursor: if self.omit_cursors {
            String::new()
          } else {
            sig.clone()
          },
        })
        .collect(),
    )
  }
}

/// Position-paged provider over a fixed newest-first list.
#[derive(Default)]
pub(crate) struct MemoryOffsetProvider {
  records: HashMap<String, Vec<String>>,
}

impl MemoryOffsetProvider {
  pub fn with_records(owner: &str, signatures: &[&str]) -> Self {
    Self {
      records: HashMap::from([(
        owner.to_string(),
        signatures.iter().map(|s| s.to_string()).collect(),
      )]),
    }
  }
}

#[async_trait]
impl OffsetListingProvider for MemoryOffsetProvider {
  async fn retrieve_range(
    &self,
    owner: &str,
    start_at: u64,
    max_results: usize,
    _dataset_id: &str,
  ) -> Result<OffsetPage, FetchError> {
    let all = self.records.get(owner).map(Vec::as_slice).unwrap_or(&[]);
    let items = all
      .iter()
      .enumerate()
      .skip(start_at as usize)
      .take(max_results)
      .map(|(i, sig)| tags(sig, all.len() - i))
      .collect();

    Ok(OffsetPage {
      items,
      start_at,
      total: all.len() as u64,
    })
  }
}

/// Provider-side failure as the HTTP provider would report it.
pub(crate) fn unavailable(body: &str) -> FetchError {
  FetchError::Status {
    status: 503,
    body: body.to_string(),
  }
}

type Gate = oneshot::Receiver<Result<Vec<Record>, FetchError>>;

/// Fetcher whose calls resolve only when the test releases them.
///
/// Calls take gates in issue order; the test decides completion order by
/// choosing which sender to fire first.
#[derive(Default)]
pub(crate) struct GatedFetcher {
  gates: Mutex<VecDeque<Gate>>,
  calls: Mutex<Vec<Option<String>>>,
}

impl GatedFetcher {
  /// Register a gate for the next call and return its release handle.
  pub fn gate(&self) -> oneshot::Sender<Result<Vec<Record>, FetchError>> {
    let (tx, rx) = oneshot::channel();
    self.gates.lock().unwrap().push_back(rx);
    tx
  }

  pub fn calls(&self) -> Vec<Option<String>> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl PageFetcher for GatedFetcher {
  async fn fetch_page(
    &self,
    _key: &str,
    cursor: Option<&str>,
    _limit: usize,
  ) -> Result<Vec<Record>, FetchError> {
    self.calls.lock().unwrap().push(cursor.map(String::from));
    let gate = self.gates.lock().unwrap().pop_front();
    match gate {
      Some(rx) => rx
        .await
        .unwrap_or_else(|_| Err(unavailable("gate dropped"))),
      None => Err(unavailable("no gate registered")),
    }
  }
}

/// Records `prefix0..prefixN` with cursors equal to their signatures.
pub(crate) fn records(prefix: &str, count: usize) -> Vec<Record> {
  (0..count)
    .map(|i| {
      let sig = format!("{}{}", prefix, i);
      Record::new(sig.clone(), sig)
    })
    .collect()
}
