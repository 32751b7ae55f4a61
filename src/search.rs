//! Tiered receipt search.
//!
//! ```text
//!   VectorTier ──(no hits / provider down)──▶ TextTier ──(no hits)──▶ SubstringTier
//!       │                                        │                        │
//!       ▼                                        ▼                        ▼
//!   results tagged "vector"               tagged "text"          tagged "substring"
//! ```
//!
//! Provider failures only move the search to the next tier. Store failures
//! end the search with an error.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::llm::EmbeddingAdapter;
use crate::models::{ScoredReceipt, SearchResult, SearchTier};
use crate::store::EmbeddingStore;

/// Default minimum cosine similarity for a vector-tier hit.
pub const DEFAULT_MIN_SCORE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    VectorTier,
    TextTier,
    SubstringTier,
}

/// Results plus the tier that produced them. `tier` is set even when
/// `results` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub tier: SearchTier,
    pub results: Vec<SearchResult>,
}

impl SearchOutcome {
    fn new(tier: SearchTier, hits: Vec<ScoredReceipt>) -> Self {
        let results = hits
            .into_iter()
            .map(|h| SearchResult {
                receipt_id: h.receipt_id,
                score: h.score,
                tier,
            })
            .collect();
        Self { tier, results }
    }
}

pub struct SearchEngine {
    store: Arc<dyn EmbeddingStore>,
    adapter: Arc<EmbeddingAdapter>,
    min_score: f32,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn EmbeddingStore>, adapter: Arc<EmbeddingAdapter>) -> Self {
        Self {
            store,
            adapter,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Resolve `query` for one user, stopping at the first tier with hits.
    pub async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidRequest("query is required".to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(Error::InvalidRequest("userId is required".to_string()));
        }
        if limit == 0 {
            return Err(Error::InvalidRequest("limit must be at least 1".to_string()));
        }

        let mut state = State::VectorTier;
        loop {
            state = match state {
                State::VectorTier => {
                    let hits = self.vector_hits(query, user_id, limit).await?;
                    if !hits.is_empty() {
                        return Ok(self.finish(SearchTier::Vector, hits));
                    }
                    State::TextTier
                }
                State::TextTier => {
                    let hits = self.store.text_search(query, user_id, limit)?;
                    if !hits.is_empty() {
                        return Ok(self.finish(SearchTier::Text, hits));
                    }
                    State::SubstringTier
                }
                State::SubstringTier => {
                    let hits = self.store.substring_search(query, user_id, limit)?;
                    return Ok(self.finish(SearchTier::Substring, hits));
                }
            };
        }
    }

    /// Empty when no provider is configured or the provider call fails.
    async fn vector_hits(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredReceipt>> {
        if !self.adapter.is_configured() {
            return Ok(Vec::new());
        }

        match self.adapter.embed(query).await {
            Ok(vector) => {
                self.store
                    .similarity_search(&vector, user_id, limit, self.min_score)
            }
            Err(e) if e.is_provider_failure() => {
                tracing::warn!("Vector tier skipped: {e}");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&self, tier: SearchTier, hits: Vec<ScoredReceipt>) -> SearchOutcome {
        tracing::debug!("Search answered by {tier:?} tier with {} results", hits.len());
        SearchOutcome::new(tier, hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReceiptStore;

    fn engine() -> SearchEngine {
        let store = Arc::new(ReceiptStore::in_memory());
        let adapter = Arc::new(EmbeddingAdapter::new(Vec::new(), 4));
        SearchEngine::new(store, adapter)
    }

    #[tokio::test]
    async fn test_rejects_blank_query() {
        let err = engine().search("   ", "u1", 5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejects_blank_user_and_zero_limit() {
        assert!(matches!(
            engine().search("kettle", "", 5).await,
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            engine().search("kettle", "u1", 0).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_no_matches_ends_in_substring_tier() {
        let outcome = engine().search("kettle", "u1", 5).await.unwrap();
        assert_eq!(outcome.tier, SearchTier::Substring);
        assert!(outcome.results.is_empty());
    }
}
