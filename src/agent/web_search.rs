use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: u8) -> Result<Vec<SearchResult>, ServiceError>;
}

/// Brave Search API client
#[derive(Debug, Clone)]
pub struct BraveSearchClient {
    api_key: String,
    endpoint: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl BraveSearchClient {
    pub fn new(api_key: String, endpoint: String) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl WebSearch for BraveSearchClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, count: u8) -> Result<Vec<SearchResult>, ServiceError> {
        let count_param = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count_param.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Web search failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "Search provider returned {status}"
            )));
        }

        let body: BraveResponse = response.json().await?;
        Ok(body
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(usize::from(count))
            .collect())
    }
}
