//! Tavily web search client

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

use super::{SEARCH, SearchClient};
use crate::config::SearchConfig;
use crate::error::{CallError, ProviderError};
use crate::llm::{build_http_client, send_json};

/// Tavily API base URL
const TAVILY_API_URL: &str = "https://api.tavily.com";

pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    search_depth: String,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(api_key: String, config: &SearchConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = build_http_client(timeout).map_err(|e| ProviderError::new("client_init", e))?;
        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| TAVILY_API_URL.to_string()),
            search_depth: config.search_depth.clone(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, query: &str, max_results: usize) -> Value {
        json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": self.search_depth,
        })
    }

    /// Result `content` fields in rank order; blank entries are dropped
    fn parse_snippets(body: &Value) -> Result<Vec<String>, CallError> {
        let results = body["results"]
            .as_array()
            .ok_or_else(|| CallError::InvalidResponse("search response has no results array".to_string()))?;

        Ok(results
            .iter()
            .filter_map(|r| r["content"].as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, ProviderError> {
        debug!("Tavily search: {:?} (max {})", query, max_results);
        let http = self
            .client
            .post(self.endpoint())
            .json(&self.build_request(query, max_results));
        let body = send_json(http, self.timeout)
            .await
            .map_err(|e| ProviderError::new(SEARCH, e))?;
        let mut snippets = Self::parse_snippets(&body).map_err(|e| ProviderError::new(SEARCH, e))?;
        snippets.truncate(max_results);
        Ok(snippets)
    }
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("base_url", &self.base_url)
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
