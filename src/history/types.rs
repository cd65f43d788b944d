//! Core types for cached account history.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Slot value used when the provider did not report one.
pub const UNKNOWN_SLOT: i64 = -1;

/// One historical entry for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
  /// Unique identifier of the entry (transaction signature)
  pub signature: String,
  /// Ordering hint, `UNKNOWN_SLOT` when absent
  pub slot: i64,
  /// Continuation token marking this record's position upstream
  pub cursor: Option<String>,
  pub err: Option<String>,
  pub memo: Option<String>,
  pub block_time: Option<i64>,
  pub confirmation_status: Option<String>,
}

impl Record {
  /// Create a record with only a signature and cursor set.
  pub fn new(signature: impl Into<String>, cursor: impl Into<String>) -> Self {
    Self {
      signature: signature.into(),
      slot: UNKNOWN_SLOT,
      cursor: Some(cursor.into()),
      err: None,
      memo: None,
      block_time: None,
      confirmation_status: None,
    }
  }
}

/// Accumulated history for one key.
///
/// `fetched` is kept in provider page order (newest first), with each older
/// page appended after the previously known tail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct History {
  pub fetched: Vec<Record>,
  /// No older records exist upstream. Once true it stays true.
  pub found_oldest: bool,
}

impl History {
  pub fn new(fetched: Vec<Record>, found_oldest: bool) -> Self {
    Self {
      fetched,
      found_oldest,
    }
  }

  /// Cursor of the oldest known record, if any.
  pub fn tail_cursor(&self) -> Option<&str> {
    self.fetched.last().and_then(|r| r.cursor.as_deref())
  }
}

/// A fetch completion (or a status-only change) to be reconciled into an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
  /// Newly fetched data. `None` for failures, which must not erase anything.
  pub history: Option<History>,
  /// The cursor the page was requested after.
  pub before: Option<String>,
}

impl PageUpdate {
  pub fn page(history: History, before: Option<String>) -> Self {
    Self {
      history: Some(history),
      before,
    }
  }

  pub fn status_only(before: Option<String>) -> Self {
    Self {
      history: None,
      before,
    }
  }
}

/// Lifecycle of the most recent fetch for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
  Fetching,
  Fetched,
  FetchFailed,
}

impl FetchStatus {
  pub fn is_fetching(&self) -> bool {
    matches!(self, FetchStatus::Fetching)
  }
}

/// A cached history plus the status of the fetch that last touched it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
  /// Scope this entry was fetched under
  pub scope: String,
  pub status: FetchStatus,
  pub data: Option<History>,
  /// Cursor requested by the last applied fetch
  pub before: Option<String>,
  /// Message of the last failure, cleared on success
  pub last_error: Option<String>,
  pub updated_at: DateTime<Utc>,
  /// Sequence number handed to the most recently issued fetch
  #[serde(skip)]
  pub issued_seq: u64,
  /// Sequence number of the most recently applied completion
  #[serde(skip)]
  pub applied_seq: u64,
}

impl CacheEntry {
  pub(crate) fn new(scope: &str) -> Self {
    Self {
      scope: scope.to_string(),
      status: FetchStatus::Fetching,
      data: None,
      before: None,
      last_error: None,
      updated_at: Utc::now(),
      issued_seq: 0,
      applied_seq: 0,
    }
  }

  /// Records fetched so far, empty if nothing has been fetched.
  pub fn records(&self) -> &[Record] {
    self
      .data
      .as_ref()
      .map(|h| h.fetched.as_slice())
      .unwrap_or(&[])
  }

  pub fn found_oldest(&self) -> bool {
    self.data.as_ref().is_some_and(|h| h.found_oldest)
  }
}
