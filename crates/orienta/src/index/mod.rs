//! Knowledge index gateway
//!
//! The vector index (embedding model, nearest-neighbor search, persistence)
//! is an external collaborator. This module defines the seam the engine
//! talks through and an HTTP client for the search sidecar that owns the
//! index.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::IndexConfig;
use crate::error::{OrientaError, Result};
use crate::retrieval::types::Chunk;

/// Seam to the external vector index
///
/// `search` must be idempotent and side-effect free; results come back
/// ranked by similarity descending.
#[async_trait]
pub trait IndexGateway: Send + Sync {
    /// Search the top-k chunks for a query string
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Gateway name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    chunks: Vec<Chunk>,
}

/// HTTP client for the search sidecar
#[derive(Debug)]
pub struct HttpIndexGateway {
    client: Client,
    search_url: String,
}

impl HttpIndexGateway {
    /// Build the gateway, validating the configured base URL up front.
    pub fn new(config: &IndexConfig, timeout: Duration) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| OrientaError::Config(format!("Invalid index base_url: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrientaError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            search_url: format!("{}/search", base.as_str().trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl IndexGateway for HttpIndexGateway {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        tracing::debug!(k, "Searching index: {}", query);

        let response = self
            .client
            .post(&self.search_url)
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| OrientaError::Retrieval(format!("Index request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OrientaError::Retrieval(format!(
                "Index returned {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| OrientaError::Retrieval(format!("Bad index payload: {e}")))?;

        tracing::debug!("Index returned {} chunks", parsed.chunks.len());
        Ok(parsed.chunks)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
