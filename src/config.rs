use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::history::{SequencePolicy, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Listing provider endpoint; also the cache scope
  pub endpoint: Url,
  #[serde(default = "default_dataset_id")]
  pub dataset_id: String,
  /// Records requested per page
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  #[serde(default)]
  pub pagination: Pagination,
  /// Ordering of concurrent completions for the same key
  #[serde(default)]
  pub sequencing: SequencePolicy,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Pagination {
  /// Provider returns a cursor per record
  #[default]
  Cursor,
  /// Provider pages by `startAt` / `maxResults`
  Offset,
}

fn default_dataset_id() -> String {
  "signatures".to_string()
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Configuration with defaults for everything but the endpoint.
  pub fn new(endpoint: Url) -> Self {
    Self {
      endpoint,
      dataset_id: default_dataset_id(),
      page_size: default_page_size(),
      pagination: Pagination::default(),
      sequencing: SequencePolicy::default(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./histcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/histcache/config.yaml
  ///
  /// Without a file, `endpoint` alone is enough to build a default config.
  pub fn load(explicit_path: Option<&Path>, endpoint: Option<Url>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match (path, endpoint.clone()) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(endpoint)) => Self::new(endpoint),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found and no --endpoint given. Create one at \
           ~/.config/histcache/config.yaml"
        ))
      }
    };

    if let Some(endpoint) = endpoint {
      config.endpoint = endpoint;
    }
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("histcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("histcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  pub fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }
    if self.dataset_id.trim().is_empty() {
      return Err(eyre!("dataset_id must not be empty"));
    }
    Ok(())
  }

  /// Get the provider API token from the environment, if set.
  ///
  /// Checks HISTCACHE_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("HISTCACHE_API_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("endpoint: https://api.devnet.solana.com\n").unwrap();
    assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(config.dataset_id, "signatures");
    assert_eq!(config.pagination, Pagination::Cursor);
    assert_eq!(config.sequencing, SequencePolicy::CompletionOrder);
    assert_eq!(config.request_timeout_secs, 30);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
endpoint: http://localhost:8899
dataset_id: transfers
page_size: 25
pagination: offset
sequencing: drop_superseded
request_timeout_secs: 5
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.endpoint.as_str(), "http://localhost:8899/");
    assert_eq!(config.dataset_id, "transfers");
    assert_eq!(config.page_size, 25);
    assert_eq!(config.pagination, Pagination::Offset);
    assert_eq!(config.sequencing, SequencePolicy::DropSuperseded);
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    let config = Config::from_yaml("endpoint: http://localhost:8899\npage_size: 0\n").unwrap();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let missing = Path::new("/nonexistent/histcache.yaml");
    assert!(Config::load(Some(missing), None).is_err());
  }
}
