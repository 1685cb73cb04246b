//! Google Programmable Search as a component search backend.

use async_trait::async_trait;
use forgebom_config::SearchConfig;
use forgebom_core::{AdapterError, ComponentSearch, PriceTag, RawCandidate};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The API caps `num` at 10 per request.
const MAX_RESULTS_PER_REQUEST: usize = 10;

pub struct GoogleSearchClient {
    endpoint: String,
    api_key: String,
    engine_id: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GoogleSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("engine_id", &self.engine_id)
            .finish()
    }
}

impl GoogleSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            client,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, AdapterError> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let api_key = non_empty(&config.api_key)
            .ok_or_else(|| AdapterError::NotConfigured("search api_key is not set".into()))?;
        let engine_id = non_empty(&config.engine_id)
            .ok_or_else(|| AdapterError::NotConfigured("search engine_id is not set".into()))?;
        Self::new(
            &config.endpoint,
            api_key,
            engine_id,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl ComponentSearch for GoogleSearchClient {
    fn name(&self) -> &str {
        "google"
    }

    async fn find_components(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawCandidate>, AdapterError> {
        let num = limit.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        debug!(query, num = %num, "Searching for components");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(e.to_string())
                } else {
                    AdapterError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(AdapterError::RateLimited {
                service: "search".into(),
                retry_after_secs: 60,
            });
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Search API returned error");
            return Err(AdapterError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("Failed to parse search response: {e}")))?;

        let mut candidates = into_candidates(body);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

fn into_candidates(body: SearchResponse) -> Vec<RawCandidate> {
    body.items
        .into_iter()
        .map(|item| {
            let list_price = item
                .pagemap
                .as_ref()
                .and_then(PageMap::offer_price)
                .map(PriceTag::Amount);
            RawCandidate {
                link: item.link,
                title: item.title,
                list_price,
            }
        })
        .collect()
}

// --- Custom Search response types (internal) ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Absent entirely when the query has no results.
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: Option<String>,
    title: Option<String>,
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    #[serde(default)]
    offer: Vec<OfferMeta>,
}

#[derive(Debug, Deserialize)]
struct OfferMeta {
    price: Option<String>,
}

impl PageMap {
    fn offer_price(&self) -> Option<f64> {
        self.offer
            .iter()
            .filter_map(|o| o.price.as_deref())
            .find_map(|p| p.trim().trim_start_matches('$').replace(',', "").parse().ok())
    }
}
