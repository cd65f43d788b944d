//! Pure merge of a fetched page into previously cached history.

use super::types::{History, PageUpdate, Record};

/// Merge `update` into `prior`.
///
/// An update without history (a failure or a status-only change) leaves
/// `prior` untouched. Otherwise the incoming page is appended after the
/// cached tail when it continues from it, and replaces the cached records
/// when it does not. `found_oldest` is sticky.
pub fn reconcile(prior: Option<History>, update: Option<PageUpdate>) -> Option<History> {
  let Some(PageUpdate {
    history: Some(incoming),
    before,
  }) = update
  else {
    return prior;
  };

  let found_oldest =
    incoming.found_oldest || prior.as_ref().is_some_and(|h| h.found_oldest);
  let fetched = combine(
    incoming.fetched,
    prior.map(|h| h.fetched),
    before.as_deref(),
  );

  Some(History {
    fetched,
    found_oldest,
  })
}

/// Append `incoming` after `existing` if `before` matches the cursor of the
/// last existing record, otherwise the incoming page wins.
fn combine(incoming: Vec<Record>, existing: Option<Vec<Record>>, before: Option<&str>) -> Vec<Record> {
  let Some(mut existing) = existing else {
    return incoming;
  };

  let continues = match (existing.last(), before) {
    (Some(tail), Some(before)) => tail.cursor.as_deref() == Some(before),
    _ => false,
  };

  if continues {
    existing.extend(incoming);
    existing
  } else {
    incoming
  }
}
