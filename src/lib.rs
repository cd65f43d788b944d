//! Per-account paginated history cache with page reconciliation.

pub mod config;
pub mod history;
pub mod provider;
pub mod scope;

#[cfg(test)]
pub(crate) mod test_support;
