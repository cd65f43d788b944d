//! Paginated history cache.
//!
//! This module keeps, per account key, the records fetched so far and
//! whether the oldest record has been reached:
//! - `reconcile` merges a fetched page into cached history (pure)
//! - `HistoryStore` holds entries for the active scope and their fetch status
//! - `FetchOrchestrator` picks the next page and drives fetch → reconcile → store

pub mod orchestrator;
mod reconcile;
mod store;
pub mod types;

pub use orchestrator::{plan, FetchOrchestrator, FetchOutcome, FetchPlan, PendingFetch, DEFAULT_PAGE_SIZE};
pub use reconcile::reconcile;
pub use store::{Applied, HistoryStore, ScopeToken, SequencePolicy, StoreError};
pub use types::{CacheEntry, FetchStatus, History, PageUpdate, Record};
