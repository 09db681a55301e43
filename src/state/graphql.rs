//! GraphQL access to contract state.
//!
//! # Responsibilities
//! - Point lookup of one state key (`equalTo`)
//! - Paged prefix scan (`first`, `offset`, `startsWith`) until a short page
//! - Map transport, HTTP and GraphQL `errors` into [`StateError`]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::config::GraphQlConfig;
use crate::state::types::{StateEntry, StateError, StateResult};

const POINT_QUERY: &str = r#"query GetState($key: String!) {
  allStates(filter: { key: { equalTo: $key } }) {
    edges { node { key value } }
  }
}"#;

const SCAN_QUERY: &str = r#"query ScanStates($prefix: String!, $first: Int!, $offset: Int!) {
  allStates(first: $first, offset: $offset, filter: { key: { startsWith: $prefix } }) {
    edges { node { key value } }
  }
}"#;

/// Bulk and point reads of contract state.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Stored value of `key`, if any.
    async fn get_state(&self, key: &str) -> StateResult<Option<Value>>;

    /// Every entry whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StateResult<Vec<StateEntry>>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<AllStatesData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllStatesData {
    all_states: Option<Connection>,
}

#[derive(Debug, Deserialize)]
struct Connection {
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: StateEntry,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

/// HTTP client for the indexer's GraphQL endpoint.
#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    url: String,
    page_size: u32,
    timeout_duration: Duration,
}

impl GraphQlClient {
    pub fn new(config: &GraphQlConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.clone(),
            page_size: config.page_size.max(1),
            timeout_duration: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn all_states(&self, query: &str, variables: Value) -> StateResult<Vec<StateEntry>> {
        let body = json!({ "query": query, "variables": variables });

        let request = async {
            let response = self
                .http
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| StateError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(StateError::Transport(format!("GraphQL returned HTTP {}", status)));
            }

            response
                .json::<GraphQlResponse>()
                .await
                .map_err(|e| StateError::Decode(e.to_string()))
        };

        let response = match timeout(self.timeout_duration, request).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(url = %self.url, "GraphQL timeout");
                return Err(StateError::Timeout(self.timeout_duration.as_secs()));
            }
        };

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(StateError::GraphQl(messages.join("; ")));
        }

        let connection = response
            .data
            .and_then(|data| data.all_states)
            .ok_or_else(|| StateError::Decode("response without allStates".to_string()))?;

        Ok(connection.edges.into_iter().map(|edge| edge.node).collect())
    }
}

#[async_trait]
impl StateSource for GraphQlClient {
    async fn get_state(&self, key: &str) -> StateResult<Option<Value>> {
        let entries = self.all_states(POINT_QUERY, json!({ "key": key })).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value)
            .filter(|value| !value.is_null()))
    }

    async fn scan_prefix(&self, prefix: &str) -> StateResult<Vec<StateEntry>> {
        let mut entries = Vec::new();
        let mut offset = 0u64;
        let mut previous_first: Option<String> = None;

        loop {
            let page = self
                .all_states(
                    SCAN_QUERY,
                    json!({ "prefix": prefix, "first": self.page_size, "offset": offset }),
                )
                .await?;
            let first_key = page.first().map(|entry| entry.key.clone());
            if first_key.is_some() && first_key == previous_first {
                tracing::warn!(
                    prefix = %prefix,
                    offset = offset,
                    "Indexer repeated a page, stopping scan"
                );
                break;
            }
            previous_first = first_key;

            let last_page = page.len() < self.page_size as usize;
            offset += page.len() as u64;
            entries.extend(page);
            if last_page {
                break;
            }
        }

        tracing::debug!(prefix = %prefix, entries = entries.len(), "Prefix scan complete");
        Ok(entries)
    }
}

impl std::fmt::Debug for GraphQlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlClient")
            .field("url", &self.url)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
