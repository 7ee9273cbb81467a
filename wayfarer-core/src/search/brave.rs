//! Brave Search API client

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::cache::JsonCache;
use crate::config::{CacheConfig, SearchConfig};
use crate::error::{Result, WayfarerError};
use crate::model::SearchResult;

use super::SearchProvider;

/// Brave web and video search with a persistent response cache.
pub struct BraveSearch {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    count: usize,
    cache: JsonCache,
}

impl BraveSearch {
    pub fn new(config: &SearchConfig, cache: JsonCache) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("BRAVE_SEARCH_API_KEY is not set. Search functionality will fail.");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            count: config.result_count,
            cache,
        })
    }

    /// Build from config, caching to `search_cache.json` under the cache dir.
    pub fn from_config(search: &SearchConfig, cache: &CacheConfig) -> Result<Self> {
        Self::new(search, JsonCache::open(cache.file("search_cache.json")))
    }

    async fn fetch(&self, endpoint: &str, query: &str) -> Result<serde_json::Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            WayfarerError::Search("BRAVE_SEARCH_API_KEY is not set".to_string())
        })?;

        let count = self.count.to_string();
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(WayfarerError::Search(format!(
                "Brave Search API error: {} - {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }

    async fn cached_search(
        &self,
        prefix: &str,
        endpoint: &str,
        query: &str,
        extract: fn(serde_json::Value) -> Vec<SearchResult>,
    ) -> Result<Vec<SearchResult>> {
        let cache_key = format!("{}:{}", prefix, query);
        if let Some(hit) = self.cache.get(&cache_key).await {
            if let Ok(results) = serde_json::from_value::<Vec<SearchResult>>(hit) {
                tracing::info!(query, kind = prefix, "Returning cached search results");
                return Ok(results);
            }
        }

        let results = extract(self.fetch(endpoint, query).await?);
        self.cache
            .insert(cache_key, serde_json::to_value(&results)?)
            .await;
        Ok(results)
    }
}

#[derive(Deserialize, Default)]
struct ResultList {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Default)]
struct WebResponse {
    #[serde(default)]
    web: ResultList,
}

/// Results from a `/web` response (`web.results[]`)
pub fn parse_web_results(body: serde_json::Value) -> Vec<SearchResult> {
    serde_json::from_value::<WebResponse>(body)
        .map(|r| r.web.results)
        .unwrap_or_default()
}

/// Results from a `/videos` response (`results[]`)
pub fn parse_video_results(body: serde_json::Value) -> Vec<SearchResult> {
    serde_json::from_value::<ResultList>(body)
        .map(|r| r.results)
        .unwrap_or_default()
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search_videos(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.cached_search("video", "videos", query, parse_video_results)
            .await
    }

    async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.cached_search("web", "web", query, parse_web_results)
            .await
    }
}
