//! Retrieval planning per query category
//!
//! Fee questions get deliberately wider recall: the answer-bearing fact (a
//! price) is sparse and easily missed by a narrow top-k search, and the
//! expansion terms bias the embedding match toward price-bearing passages.

use crate::classify::QueryCategory;
use crate::retrieval::types::RetrievalParameters;

/// A planned search: how many chunks to request and with which query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub k: usize,
    pub query: String,
}

/// Maps a classified query to its search breadth and expanded query
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    financial_expansion: String,
}

impl RetrievalPolicy {
    pub fn new(financial_expansion: impl Into<String>) -> Self {
        Self {
            financial_expansion: financial_expansion.into(),
        }
    }

    /// Plan the search for a retrievable category.
    ///
    /// Only `Financial` and `General` reach this point; the engine
    /// short-circuits blocked and greeting turns before planning.
    pub fn plan(
        &self,
        category: QueryCategory,
        text: &str,
        params: &RetrievalParameters,
    ) -> RetrievalPlan {
        match category {
            QueryCategory::Financial => RetrievalPlan {
                k: params.k_financial,
                query: format!("{} {}", text, self.financial_expansion),
            },
            _ => RetrievalPlan {
                k: params.k_general,
                query: text.to_string(),
            },
        }
    }
}
