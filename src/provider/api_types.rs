//! Serde-deserializable types matching the listing provider's responses.
//!
//! These types are separate from the cached `Record` so the wire shape can
//! stay a loose tag mapping while the cache works with typed fields.

use serde::Deserialize;
use std::collections::HashMap;

use crate::history::types::{Record, UNKNOWN_SLOT};

/// Loosely typed record fields as reported by the provider.
pub type RecordTags = HashMap<String, String>;

// Tag names understood by `record_from_tags`
pub const TAG_SIGNATURE: &str = "signature";
pub const TAG_SLOT: &str = "slot";
pub const TAG_ERR: &str = "err";
pub const TAG_MEMO: &str = "memo";
pub const TAG_BLOCK_TIME: &str = "blockTime";
pub const TAG_CONFIRMATION_STATUS: &str = "confirmationStatus";

// ============================================================================
// Cursor-paged endpoint
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderItem {
  #[serde(rename = "recordTags", default)]
  pub record_tags: RecordTags,
  #[serde(default)]
  pub cursor: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPageResponse {
  #[serde(default)]
  pub items: Vec<ProviderItem>,
}

// ============================================================================
// Offset-paged endpoint
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OffsetPage {
  #[serde(default)]
  pub items: Vec<RecordTags>,
  #[serde(rename = "startAt", default)]
  pub start_at: u64,
  #[serde(default)]
  pub total: u64,
}

// ============================================================================
// Conversions to cached types
// ============================================================================

impl ProviderItem {
  pub fn into_record(self) -> Record {
    let cursor = (!self.cursor.is_empty()).then_some(self.cursor);
    record_from_tags(&self.record_tags, cursor)
  }
}

/// Build a record from provider tags.
///
/// Missing tags are defaulted rather than rejected: `signature` becomes empty,
/// `slot` becomes `UNKNOWN_SLOT`, everything else `None`.
pub fn record_from_tags(tags: &RecordTags, cursor: Option<String>) -> Record {
  let text = |name: &str| tags.get(name).filter(|v| !v.is_empty()).cloned();

  Record {
    signature: tags.get(TAG_SIGNATURE).cloned().unwrap_or_default(),
    slot: tags
      .get(TAG_SLOT)
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(UNKNOWN_SLOT),
    cursor,
    err: text(TAG_ERR),
    memo: text(TAG_MEMO),
    block_time: tags.get(TAG_BLOCK_TIME).and_then(|s| s.trim().parse().ok()),
    confirmation_status: text(TAG_CONFIRMATION_STATUS),
  }
}
