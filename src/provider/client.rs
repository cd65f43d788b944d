use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;
use url::Url;

use super::api_types::{ApiPageResponse, OffsetPage, ProviderItem};
use super::{FetchError, ListingProvider, OffsetListingProvider};
use crate::config::Config;

/// HTTP listing provider
#[derive(Clone)]
pub struct HttpListingProvider {
  client: reqwest::Client,
  endpoint: Url,
}

impl HttpListingProvider {
  pub fn new(config: &Config) -> Result<Self> {
    let mut headers = HeaderMap::new();
    if let Some(token) = Config::get_api_token() {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| eyre!("Invalid API token: {}", e))?;
      headers.insert(AUTHORIZATION, value);
    }

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      endpoint: config.endpoint.clone(),
    })
  }

  /// `{endpoint}/v1/datasets/{dataset}/owners/{owner}/records`
  fn records_url(&self, dataset_id: &str, owner: &str) -> Result<Url, FetchError> {
    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::Endpoint(self.endpoint.to_string()))?
      .pop_if_empty()
      .extend(["v1", "datasets", dataset_id, "owners", owner, "records"]);
    Ok(url)
  }

  async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
    let response = self.client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(FetchError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response.bytes().await?.to_vec())
  }
}

#[async_trait]
impl ListingProvider for HttpListingProvider {
  async fn retrieve_page(
    &self,
    owner: &str,
    limit: usize,
    before: Option<&str>,
    dataset_id: &str,
  ) -> Result<Vec<ProviderItem>, FetchError> {
    let mut url = self.records_url(dataset_id, owner)?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("limit", &limit.to_string());
      if let Some(before) = before {
        query.append_pair("before", before);
      }
    }

    let body = self.get_bytes(url).await?;
    let response: ApiPageResponse = serde_json::from_slice(&body)?;
    Ok(response.items)
  }
}

#[async_trait]
impl OffsetListingProvider for HttpListingProvider {
  async fn retrieve_range(
    &self,
    owner: &str,
    start_at: u64,
    max_results: usize,
    dataset_id: &str,
  ) -> Result<OffsetPage, FetchError> {
    let mut url = self.records_url(dataset_id, owner)?;
    url
      .query_pairs_mut()
      .append_pair("startAt", &start_at.to_string())
      .append_pair("maxResults", &max_results.to_string());

    let body = self.get_bytes(url).await?;
    Ok(serde_json::from_slice(&body)?)
  }
}
