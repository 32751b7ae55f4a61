//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use receipt_search::error::Error;
use receipt_search::llm::{EmbeddingAdapter, EmbeddingProvider, Rejection};
use receipt_search::models::{
    CompletionStats, EmbeddingJob, Receipt, ReceiptFields, ScoredReceipt,
};
use receipt_search::store::{EmbeddingStore, ReceiptStore};

pub const DIM: usize = 4;

/// Words that get their own axis in [`KeywordProvider`] vectors.
const KEYWORDS: [&str; 3] = ["kettle", "toaster", "phone"];

/// Deterministic "semantic" embedder: one axis per keyword, plus a
/// catch-all axis for text mentioning none of them.
pub struct KeywordProvider;

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn name(&self) -> &str {
        "keyword"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut v = vec![0.0; dimension];
        for (i, kw) in KEYWORDS.iter().enumerate() {
            if lower.contains(kw) {
                v[i] = 1.0;
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[dimension - 1] = 1.0;
        }
        Ok(v)
    }
}

/// Provider whose endpoint is unreachable.
pub struct DownProvider {
    pub calls: AtomicUsize,
}

impl DownProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, _text: &str, _dimension: usize) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("connection refused")
    }
}

/// Always returns the same vector.
pub struct FixedProvider(pub Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, _text: &str, _dimension: usize) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Rejects any text containing `needle`, embeds everything else.
pub struct RejectingProvider {
    pub needle: &'static str,
}

#[async_trait]
impl EmbeddingProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>> {
        if text.contains(self.needle) {
            return Err(Rejection("400 Bad Request: content rejected".to_string()).into());
        }
        Ok(vec![0.5; dimension])
    }
}

pub fn adapter(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Arc<EmbeddingAdapter> {
    Arc::new(EmbeddingAdapter::new(providers, DIM))
}

pub fn keyword_adapter() -> Arc<EmbeddingAdapter> {
    adapter(vec![Arc::new(KeywordProvider)])
}

pub fn product(user: &str, description: &str) -> Receipt {
    Receipt::new(
        user,
        ReceiptFields {
            product_description: Some(description.to_string()),
            ..Default::default()
        },
    )
}

pub fn insert(store: &ReceiptStore, receipt: Receipt) -> Uuid {
    store.insert_receipt(receipt).unwrap().id
}

/// A store whose backing database is unreachable.
pub struct UnreachableStore;

fn down<T>() -> Result<T, Error> {
    Err(Error::Persistence("connection reset".to_string()))
}

impl EmbeddingStore for UnreachableStore {
    fn write_embedding(&self, _receipt_id: Uuid, _vector: Vec<f32>) -> Result<bool, Error> {
        down()
    }

    fn record_failure(&self, _receipt_id: Uuid, _reason: &str) -> Result<bool, Error> {
        down()
    }

    fn find_missing_embeddings(
        &self,
        _user_id: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<EmbeddingJob>, Error> {
        down()
    }

    fn completion_stats(&self, _user_id: Option<&str>) -> Result<CompletionStats, Error> {
        down()
    }

    fn similarity_search(
        &self,
        _query: &[f32],
        _user_id: &str,
        _top_k: usize,
        _min_score: f32,
    ) -> Result<Vec<ScoredReceipt>, Error> {
        down()
    }

    fn text_search(
        &self,
        _query: &str,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<ScoredReceipt>, Error> {
        down()
    }

    fn substring_search(
        &self,
        _query: &str,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<ScoredReceipt>, Error> {
        down()
    }
}
