//! Receipt persistence and the read paths used by backfill and search.

pub mod text;
pub mod vector;

use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::compose::compose;
use crate::error::{Error, Result};
use crate::models::{CompletionStats, EmbeddingJob, Receipt, ReceiptPatch, ScoredReceipt};

/// Storage operations the backfill orchestrator and search engine rely on.
pub trait EmbeddingStore: Send + Sync {
    /// Replace the receipt's embedding. Returns false if the receipt does not exist.
    fn write_embedding(&self, receipt_id: Uuid, vector: Vec<f32>) -> Result<bool>;

    /// Count a failed embedding attempt. Returns false if the receipt does not exist.
    fn record_failure(&self, receipt_id: Uuid, reason: &str) -> Result<bool>;

    /// Up to `limit` receipts without an embedding, newest first.
    fn find_missing_embeddings(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EmbeddingJob>>;

    fn completion_stats(&self, user_id: Option<&str>) -> Result<CompletionStats>;

    /// Receipts whose cosine similarity to `query` is at least `min_score`.
    fn similarity_search(
        &self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredReceipt>>;

    /// Whole-phrase, field-weighted substring match.
    fn text_search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<ScoredReceipt>>;

    /// Per-word substring match, used once the phrase match found nothing.
    fn substring_search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredReceipt>>;
}

/// Number of per-receipt write locks; receipts hash onto them by id.
const WRITE_STRIPES: usize = 64;

/// In-memory receipt store with optional JSON persistence, one file per
/// receipt under `receipts/`.
///
/// A mutation computes the new state of a single receipt from a copy, writes
/// that receipt's file, and only then swaps it into memory. Readers never see
/// a change whose write failed, and the map-wide lock is held only for the
/// swap. Writers to the same receipt are serialized by a striped lock.
pub struct ReceiptStore {
    receipts: RwLock<HashMap<Uuid, Receipt>>,
    writers: Vec<Mutex<()>>,
    persist_dir: Option<PathBuf>,
    max_attempts: u32,
}

impl ReceiptStore {
    pub fn in_memory() -> Self {
        Self::with_receipts(HashMap::new(), None)
    }

    pub fn open_or_create(data_dir: &Path) -> anyhow::Result<Self> {
        let dir = data_dir.join("receipts");
        std::fs::create_dir_all(&dir)?;

        let mut receipts = HashMap::new();
        for entry in std::fs::read_dir(&dir).context("Failed to list receipt store")? {
            let path = entry?.path();
            // Leftover `.json.tmp` files from an interrupted write are ignored.
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let receipt: Receipt = serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            receipts.insert(receipt.id, receipt);
        }
        tracing::debug!("Loaded {} receipts from {}", receipts.len(), dir.display());

        Ok(Self::with_receipts(receipts, Some(dir)))
    }

    fn with_receipts(receipts: HashMap<Uuid, Receipt>, persist_dir: Option<PathBuf>) -> Self {
        Self {
            receipts: RwLock::new(receipts),
            writers: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
            persist_dir,
            max_attempts: 0,
        }
    }

    /// Stop selecting a receipt for backfill after this many failed attempts.
    /// Zero disables the limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn len(&self) -> usize {
        self.receipts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.read().is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<Receipt> {
        self.receipts.read().get(&id).cloned()
    }

    pub fn insert_receipt(&self, receipt: Receipt) -> Result<Receipt> {
        self.mutate(receipt.id, |slot| {
            *slot = Some(receipt.clone());
            (receipt, true)
        })
    }

    /// Apply a field patch. The embedding is dropped when the composite
    /// content changes so the next backfill batch picks the receipt up again.
    pub fn update_receipt(&self, id: Uuid, patch: ReceiptPatch) -> Result<Option<Receipt>> {
        self.mutate(id, |slot| {
            let Some(receipt) = slot.as_mut() else {
                return (None, false);
            };
            let before = compose(receipt);
            receipt.apply(patch);
            if compose(receipt) != before {
                receipt.embedding = None;
                receipt.embedding_attempts = 0;
                receipt.last_embedding_error = None;
            }
            (Some(receipt.clone()), true)
        })
    }

    pub fn delete_receipt(&self, id: Uuid) -> Result<bool> {
        self.mutate(id, |slot| {
            let removed = slot.take().is_some();
            (removed, removed)
        })
    }

    fn is_quarantined(&self, receipt: &Receipt) -> bool {
        self.max_attempts > 0 && receipt.embedding_attempts >= self.max_attempts
    }

    /// Run `f` on a copy of receipt `id` (`None` if absent). When it reports
    /// a change the copy is persisted and then published; a failed write
    /// leaves the store untouched.
    fn mutate<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Option<Receipt>) -> (T, bool),
    ) -> Result<T> {
        let _writer = self.writers[id.as_u128() as usize % self.writers.len()].lock();

        let mut slot = self.receipts.read().get(&id).cloned();
        let (out, changed) = f(&mut slot);
        if !changed {
            return Ok(out);
        }

        if let Some(dir) = &self.persist_dir {
            persist(dir, id, slot.as_ref()).map_err(Error::persistence)?;
        }

        let mut receipts = self.receipts.write();
        match slot {
            Some(receipt) => {
                receipts.insert(id, receipt);
            }
            None => {
                receipts.remove(&id);
            }
        }
        Ok(out)
    }

    fn scoped<'a>(
        receipts: &'a HashMap<Uuid, Receipt>,
        user_id: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Receipt> + 'a {
        receipts
            .values()
            .filter(move |r| user_id.map_or(true, |u| r.user_id == u))
    }

    fn lexical_search(
        &self,
        user_id: &str,
        limit: usize,
        score: impl Fn(&Receipt) -> f32,
    ) -> Vec<ScoredReceipt> {
        let receipts = self.receipts.read();
        let scored = Self::scoped(&receipts, Some(user_id))
            .map(|r| (score(r), r))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        rank(scored, limit)
    }
}

/// Write one receipt's file via temp file + rename, or remove it.
fn persist(dir: &Path, id: Uuid, receipt: Option<&Receipt>) -> anyhow::Result<()> {
    let path = dir.join(format!("{id}.json"));
    let Some(receipt) = receipt else {
        return match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).context("Failed to remove receipt file")
            }
            _ => Ok(()),
        };
    };

    let data = serde_json::to_string(receipt).context("Failed to serialize receipt")?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data).context("Failed to write receipt file")?;
    std::fs::rename(&tmp_path, &path).context("Failed to replace receipt file")?;
    Ok(())
}

/// Order by score descending, then newest first, then id; keep `limit`.
fn rank(mut scored: Vec<(f32, &Receipt)>, limit: usize) -> Vec<ScoredReceipt> {
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
            .then_with(|| a.1.id.cmp(&b.1.id))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, r)| ScoredReceipt {
            receipt_id: r.id,
            score,
        })
        .collect()
}

impl EmbeddingStore for ReceiptStore {
    fn write_embedding(&self, receipt_id: Uuid, vector: Vec<f32>) -> Result<bool> {
        self.mutate(receipt_id, |slot| {
            let Some(receipt) = slot.as_mut() else {
                return (false, false);
            };
            receipt.embedding = Some(vector);
            receipt.embedding_attempts = 0;
            receipt.last_embedding_error = None;
            (true, true)
        })
    }

    fn record_failure(&self, receipt_id: Uuid, reason: &str) -> Result<bool> {
        self.mutate(receipt_id, |slot| {
            let Some(receipt) = slot.as_mut() else {
                return (false, false);
            };
            receipt.embedding_attempts = receipt.embedding_attempts.saturating_add(1);
            receipt.last_embedding_error = Some(reason.to_string());
            (true, true)
        })
    }

    fn find_missing_embeddings(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EmbeddingJob>> {
        let receipts = self.receipts.read();
        let mut missing: Vec<&Receipt> = Self::scoped(&receipts, user_id)
            .filter(|r| r.embedding.is_none() && !self.is_quarantined(r))
            .collect();

        missing.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        missing.truncate(limit);

        Ok(missing
            .into_iter()
            .map(|r| EmbeddingJob {
                receipt_id: r.id,
                composite_content: compose(r),
            })
            .collect())
    }

    fn completion_stats(&self, user_id: Option<&str>) -> Result<CompletionStats> {
        let receipts = self.receipts.read();
        let mut total = 0;
        let mut with_embedding = 0;
        let mut quarantined = 0;
        for r in Self::scoped(&receipts, user_id) {
            total += 1;
            if r.embedding.is_some() {
                with_embedding += 1;
            } else if self.is_quarantined(r) {
                quarantined += 1;
            }
        }
        Ok(CompletionStats::new(total, with_embedding, quarantined))
    }

    fn similarity_search(
        &self,
        query: &[f32],
        user_id: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredReceipt>> {
        let receipts = self.receipts.read();
        let scored = Self::scoped(&receipts, Some(user_id))
            .filter_map(|r| {
                let embedding = r.embedding.as_deref()?;
                Some((vector::cosine_similarity(query, embedding), r))
            })
            .filter(|(score, _)| *score >= min_score)
            .collect();
        Ok(rank(scored, top_k))
    }

    fn text_search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<ScoredReceipt>> {
        Ok(self.lexical_search(user_id, limit, |r| text::phrase_score(r, query)))
    }

    fn substring_search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredReceipt>> {
        Ok(self.lexical_search(user_id, limit, |r| text::term_score(r, query)))
    }
}
