//! Core retrieval data types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A bounded span of source text plus provenance metadata, the unit indexed
/// and retrieved. Produced by the external ingestion pipeline; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }
}

/// One search round-trip: what was asked and what came back, ranked by
/// similarity descending. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub query_used: String,
    pub k_requested: usize,
}

/// The tunable knobs of the retrieval policy
///
/// Immutable once built; the evolutionary search proposes alternative values
/// and the runtime engine consumes exactly this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetrievalParameters {
    /// Chunks requested for general questions
    pub k_general: usize,
    /// Chunks requested for fee/price questions
    pub k_financial: usize,
    /// Hard character cap on the assembled context
    pub max_context_chars: usize,
}

impl RetrievalParameters {
    pub fn new(k_general: usize, k_financial: usize, max_context_chars: usize) -> Self {
        Self {
            k_general,
            k_financial,
            max_context_chars,
        }
    }
}

impl From<&crate::config::RetrievalConfig> for RetrievalParameters {
    fn from(config: &crate::config::RetrievalConfig) -> Self {
        Self {
            k_general: config.k_general,
            k_financial: config.k_financial,
            max_context_chars: config.max_context_chars,
        }
    }
}

impl std::fmt::Display for RetrievalParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "k_general={} k_financial={} max_context_chars={}",
            self.k_general, self.k_financial, self.max_context_chars
        )
    }
}
