//! Web search clients
//!
//! Search is optional. Without a credential there is no client at all and
//! callers skip augmentation instead of failing.

mod tavily;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

pub use tavily::TavilyClient;

use crate::config::SearchConfig;
use crate::error::{CallError, ProviderError};

/// Operation name attached to search failures
pub const SEARCH: &str = "search";

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Ranked text snippets for `query`, at most `max_results`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, ProviderError>;
}

/// Build the search client if a key was resolved; `None` means search is unavailable
pub fn build_search_client(config: &SearchConfig, api_key: Option<&str>) -> Option<Arc<dyn SearchClient>> {
    let Some(key) = api_key else {
        log::warn!("No search API key found in config or {}; web search disabled", config.api_key_env);
        return None;
    };
    match TavilyClient::new(key.to_string(), config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            log::warn!("Failed to create search client, web search disabled: {}", e);
            None
        }
    }
}

/// Search client returning fixed snippets and recording queries
#[derive(Default)]
pub struct StaticSearch {
    snippets: Vec<String>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new<S: Into<String>>(snippets: impl IntoIterator<Item = S>) -> Self {
        Self {
            snippets: snippets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Every call fails with a network-style error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchClient for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, ProviderError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if self.fail {
            return Err(ProviderError::new(
                SEARCH,
                CallError::Api {
                    status: 503,
                    message: "search backend unavailable".to_string(),
                },
            ));
        }
        Ok(self.snippets.iter().take(max_results).cloned().collect())
    }
}
