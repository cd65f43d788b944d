//! In-memory store of per-key history, scoped to one backend endpoint at a time.

use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use super::reconcile::reconcile;
use super::types::{CacheEntry, FetchStatus, PageUpdate};

/// Misuse of the store lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("history store accessed before init()")]
  Uninitialized,
  #[error("history store lock poisoned: {0}")]
  Poisoned(String),
}

/// How completions for the same key are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePolicy {
  /// Apply every completion in the order it arrives, relying on the cursor
  /// continuity check to decide between append and replace.
  #[default]
  CompletionOrder,
  /// Discard a completion whose fetch was issued before the one already applied.
  DropSuperseded,
}

/// Snapshot of the active scope, taken when a fetch starts.
///
/// A completion carrying a token from before a `clear()` is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeToken {
  scope: String,
  epoch: u64,
}

impl ScopeToken {
  pub fn scope(&self) -> &str {
    &self.scope
  }
}

/// Outcome of applying an update to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  Applied,
  /// The store was cleared or switched scope since the token was taken
  StaleScope,
  /// A later fetch for the same key was already applied
  Superseded,
}

#[derive(Debug)]
struct Lifecycle {
  scope: String,
  epoch: u64,
  entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
struct State {
  lifecycle: Option<Lifecycle>,
  next_epoch: u64,
}

impl State {
  fn reset(&mut self, scope: &str) {
    self.next_epoch += 1;
    self.lifecycle = Some(Lifecycle {
      scope: scope.to_string(),
      epoch: self.next_epoch,
      entries: HashMap::new(),
    });
  }

  fn current(&self) -> Result<&Lifecycle, StoreError> {
    self.lifecycle.as_ref().ok_or(StoreError::Uninitialized)
  }

  /// Lifecycle matching `token`, or `None` if it has been replaced since.
  fn matching(&mut self, token: &ScopeToken) -> Result<Option<&mut Lifecycle>, StoreError> {
    let lifecycle = self.lifecycle.as_mut().ok_or(StoreError::Uninitialized)?;
    if lifecycle.epoch == token.epoch && lifecycle.scope == token.scope {
      Ok(Some(lifecycle))
    } else {
      Ok(None)
    }
  }
}

/// Per-key cache of history entries for the active scope.
///
/// All entries belong to a single scope. Switching scope drops every entry
/// under the same lock, so no reader sees a mix of old and new entries.
#[derive(Debug, Default)]
pub struct HistoryStore {
  state: RwLock<State>,
  policy: SequencePolicy,
}

impl HistoryStore {
  pub fn new(policy: SequencePolicy) -> Self {
    Self {
      state: RwLock::new(State::default()),
      policy,
    }
  }

  pub fn policy(&self) -> SequencePolicy {
    self.policy
  }

  fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
    self
      .state
      .read()
      .map_err(|e| StoreError::Poisoned(e.to_string()))
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
    self
      .state
      .write()
      .map_err(|e| StoreError::Poisoned(e.to_string()))
  }

  /// Start the store lifecycle for `scope`.
  ///
  /// Calling it again with the active scope keeps existing entries; any
  /// other scope resets the store as `clear` does.
  pub fn init(&self, scope: &str) -> Result<ScopeToken, StoreError> {
    let mut state = self.write()?;
    let active = matches!(&state.lifecycle, Some(lc) if lc.scope == scope);
    if !active {
      state.reset(scope);
      info!(scope, "history store initialised");
    }
    let lc = state.current()?;
    Ok(ScopeToken {
      scope: lc.scope.clone(),
      epoch: lc.epoch,
    })
  }

  /// Drop every entry and make `scope` the active scope.
  pub fn clear(&self, scope: &str) -> Result<ScopeToken, StoreError> {
    let mut state = self.write()?;
    let dropped = state
      .lifecycle
      .as_ref()
      .map(|lc| lc.entries.len())
      .unwrap_or(0);
    state.reset(scope);
    info!(scope, dropped, "history store cleared");
    let lc = state.current()?;
    Ok(ScopeToken {
      scope: lc.scope.clone(),
      epoch: lc.epoch,
    })
  }

  /// Token for the active scope.
  pub fn active_scope(&self) -> Result<ScopeToken, StoreError> {
    let state = self.read()?;
    let lc = state.current()?;
    Ok(ScopeToken {
      scope: lc.scope.clone(),
      epoch: lc.epoch,
    })
  }

  /// Look up the entry for `key`. Keys of an inactive scope are never present.
  pub fn get(&self, scope: &str, key: &str) -> Result<Option<CacheEntry>, StoreError> {
    let state = self.read()?;
    let lc = state.current()?;
    if lc.scope != scope {
      return Ok(None);
    }
    Ok(lc.entries.get(key).cloned())
  }

  /// All entries of `scope`, ordered by key.
  pub fn list_entries(&self, scope: &str) -> Result<BTreeMap<String, CacheEntry>, StoreError> {
    let state = self.read()?;
    let lc = state.current()?;
    if lc.scope != scope {
      return Ok(BTreeMap::new());
    }
    Ok(
      lc.entries
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  /// Set `status` for `key` and reconcile `update` into its history,
  /// creating the entry if needed.
  pub fn update(
    &self,
    token: &ScopeToken,
    key: &str,
    status: FetchStatus,
    update: Option<PageUpdate>,
  ) -> Result<Applied, StoreError> {
    self.apply(token, key, status, update, None, None)
  }

  /// Mark `key` as fetching and hand out the sequence number for the new fetch.
  ///
  /// Returns `None` if the token's scope is no longer active.
  pub(crate) fn mark_fetching(&self, token: &ScopeToken, key: &str) -> Result<Option<u64>, StoreError> {
    let mut state = self.write()?;
    let Some(lc) = state.matching(token)? else {
      return Ok(None);
    };
    let entry = lc
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::new(&token.scope));
    entry.issued_seq += 1;
    entry.status = FetchStatus::Fetching;
    entry.updated_at = Utc::now();
    Ok(Some(entry.issued_seq))
  }

  /// Apply the completion of fetch `seq` for `key`.
  pub(crate) fn complete(
    &self,
    token: &ScopeToken,
    key: &str,
    seq: u64,
    status: FetchStatus,
    update: PageUpdate,
    error: Option<String>,
  ) -> Result<Applied, StoreError> {
    self.apply(token, key, status, Some(update), Some(seq), error)
  }

  fn apply(
    &self,
    token: &ScopeToken,
    key: &str,
    status: FetchStatus,
    update: Option<PageUpdate>,
    seq: Option<u64>,
    error: Option<String>,
  ) -> Result<Applied, StoreError> {
    let mut state = self.write()?;
    let Some(lc) = state.matching(token)? else {
      debug!(key, scope = token.scope(), "dropping update for stale scope");
      return Ok(Applied::StaleScope);
    };

    let entry = lc
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::new(&token.scope));

    let mut status = status;
    if let Some(seq) = seq {
      if self.policy == SequencePolicy::DropSuperseded {
        if seq < entry.applied_seq {
          debug!(key, seq, applied = entry.applied_seq, "dropping superseded completion");
          return Ok(Applied::Superseded);
        }
        // A newer fetch is still in flight
        if seq < entry.issued_seq {
          status = FetchStatus::Fetching;
        }
      }
      entry.applied_seq = entry.applied_seq.max(seq);
    }

    if let Some(update) = &update {
      entry.before = update.before.clone();
    }
    entry.data = reconcile(entry.data.take(), update);
    entry.status = status;
    match status {
      FetchStatus::FetchFailed => entry.last_error = error,
      FetchStatus::Fetched => entry.last_error = None,
      FetchStatus::Fetching => {}
    }
    entry.updated_at = Utc::now();

    debug!(
      key,
      ?status,
      records = entry.records().len(),
      found_oldest = entry.found_oldest(),
      "history entry updated"
    );
    Ok(Applied::Applied)
  }
}
