//! The active backend endpoint and the watcher that resets the store when it changes.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use url::Url;

use crate::history::HistoryStore;

/// Cluster classification of an endpoint, used to tag failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cluster {
  MainnetBeta,
  Testnet,
  Devnet,
  /// Anything else: local validators, private RPC providers
  Custom,
}

impl Cluster {
  /// Classify by host name: `*mainnet-beta*`, `*testnet*`, `*devnet*`, else custom.
  pub fn classify(endpoint: &str) -> Self {
    let host = Url::parse(endpoint)
      .ok()
      .and_then(|u| u.host_str().map(str::to_lowercase))
      .unwrap_or_default();

    if host.contains("mainnet-beta") {
      Cluster::MainnetBeta
    } else if host.contains("testnet") {
      Cluster::Testnet
    } else if host.contains("devnet") {
      Cluster::Devnet
    } else {
      Cluster::Custom
    }
  }
}

impl fmt::Display for Cluster {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Cluster::MainnetBeta => "mainnet-beta",
      Cluster::Testnet => "testnet",
      Cluster::Devnet => "devnet",
      Cluster::Custom => "custom",
    };
    f.write_str(name)
  }
}

/// Backend context that cached entries belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
  pub endpoint: Url,
  pub cluster: Cluster,
}

impl Scope {
  pub fn new(endpoint: Url) -> Self {
    let cluster = Cluster::classify(endpoint.as_str());
    Self { endpoint, cluster }
  }

  /// Store key for this scope.
  pub fn key(&self) -> &str {
    self.endpoint.as_str()
  }
}

/// Clears the history store every time the published scope changes.
pub struct ScopeWatcher {
  handle: JoinHandle<()>,
}

impl ScopeWatcher {
  /// Initialise `store` with the current scope, then follow changes on `rx`.
  ///
  /// The initial `init` happens before this returns.
  pub fn spawn(store: Arc<HistoryStore>, mut rx: watch::Receiver<Scope>) -> Self {
    let initial = rx.borrow_and_update().clone();
    if let Err(e) = store.init(initial.key()) {
      error!(error = %e, "failed to initialise history store");
    }

    let handle = tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        let scope = rx.borrow_and_update().clone();
        info!(scope = scope.key(), cluster = %scope.cluster, "scope changed");
        if let Err(e) = store.clear(scope.key()) {
          error!(error = %e, "failed to clear history store");
          break;
        }
      }
    });

    Self { handle }
  }

  /// Stop following scope changes.
  pub fn abort(&self) {
    self.handle.abort();
  }
}

impl Drop for ScopeWatcher {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
