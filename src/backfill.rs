//! Batch generation of embeddings for receipts that lack one.
//!
//! Each call handles one bounded batch and keeps no cursor; the store always
//! surfaces whatever is still missing, so calling `run_batch` until
//! `remaining == 0` converges.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::llm::EmbeddingAdapter;
use crate::models::{BackfillReport, EmbeddingJob, ItemOutcome, ItemStatus};
use crate::store::EmbeddingStore;

/// Upper bound on concurrent provider calls within one batch.
pub const MAX_CONCURRENCY: usize = 5;

pub struct BackfillOrchestrator {
    store: Arc<dyn EmbeddingStore>,
    adapter: Arc<EmbeddingAdapter>,
    concurrency: usize,
}

impl BackfillOrchestrator {
    pub fn new(store: Arc<dyn EmbeddingStore>, adapter: Arc<EmbeddingAdapter>) -> Self {
        Self {
            store,
            adapter,
            concurrency: 1,
        }
    }

    /// Embed up to `concurrency` items at once (clamped to 1..=5).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Process one batch of receipts missing an embedding.
    ///
    /// Per-item failures are recorded in the report and never abort the
    /// batch. Only a store read failure fails the whole call.
    pub async fn run_batch(
        &self,
        batch_size: usize,
        user_id: Option<&str>,
    ) -> Result<BackfillReport> {
        let jobs = self.store.find_missing_embeddings(user_id, batch_size)?;
        if jobs.is_empty() {
            return Ok(BackfillReport {
                processed: 0,
                successful: 0,
                errors: 0,
                remaining: 0,
                results: Vec::new(),
            });
        }
        if !self.adapter.is_configured() {
            tracing::warn!(
                "Backfill running without an available embedding provider; {} receipts will stay pending",
                jobs.len()
            );
        }

        let processed = jobs.len();
        let results = if self.concurrency > 1 {
            self.process_concurrent(jobs).await
        } else {
            let mut results = Vec::with_capacity(processed);
            for job in jobs {
                results.push(process_job(&self.store, &self.adapter, job).await);
            }
            results
        };

        let successful = results
            .iter()
            .filter(|r| r.status == ItemStatus::Success)
            .count();
        let errors = processed - successful;

        let stats = self.store.completion_stats(user_id)?;
        tracing::info!(
            "Backfill batch: {processed} processed, {successful} embedded, {errors} failed, {} remaining ({}% complete)",
            stats.pending(),
            stats.percent_complete
        );

        Ok(BackfillReport {
            processed,
            successful,
            errors,
            remaining: stats.pending(),
            results,
        })
    }

    /// Results come back in job order regardless of completion order.
    async fn process_concurrent(&self, jobs: Vec<EmbeddingJob>) -> Vec<ItemOutcome> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let receipt_id = job.receipt_id;
            let store = self.store.clone();
            let adapter = self.adapter.clone();
            let sem = semaphore.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await;
                process_job(&store, &adapter, job).await
            });
            handles.push((receipt_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (receipt_id, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                tracing::error!("Backfill task for {receipt_id} failed: {e}");
                ItemOutcome {
                    receipt_id,
                    status: ItemStatus::Error,
                    error: Some(format!("task failed: {e}")),
                }
            });
            results.push(outcome);
        }
        results
    }
}

async fn process_job(
    store: &Arc<dyn EmbeddingStore>,
    adapter: &EmbeddingAdapter,
    job: EmbeddingJob,
) -> ItemOutcome {
    let receipt_id = job.receipt_id;
    match embed_and_store(store, adapter, job).await {
        Ok(()) => ItemOutcome {
            receipt_id,
            status: ItemStatus::Success,
            error: None,
        },
        Err(e) => {
            let message = e.to_string();
            tracing::warn!("Backfill failed for receipt {receipt_id}: {message}");
            // Outages and store faults leave the receipt eligible for the next batch.
            if e.is_item_specific() {
                let reason = message.clone();
                let recorded =
                    on_blocking(store, move |s| s.record_failure(receipt_id, &reason)).await;
                if let Err(record_err) = recorded {
                    tracing::warn!("Could not record failed attempt for {receipt_id}: {record_err}");
                }
            }
            ItemOutcome {
                receipt_id,
                status: ItemStatus::Error,
                error: Some(message),
            }
        }
    }
}

async fn embed_and_store(
    store: &Arc<dyn EmbeddingStore>,
    adapter: &EmbeddingAdapter,
    job: EmbeddingJob,
) -> Result<()> {
    if job.composite_content.is_empty() {
        return Err(Error::InvalidContent);
    }
    let vector = adapter.embed(&job.composite_content).await?;
    let receipt_id = job.receipt_id;
    if !on_blocking(store, move |s| s.write_embedding(receipt_id, vector)).await? {
        return Err(Error::NotFound(format!("receipt {receipt_id}")));
    }
    Ok(())
}

/// Run a store write on the blocking pool; it may touch the filesystem.
async fn on_blocking<T, F>(store: &Arc<dyn EmbeddingStore>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EmbeddingStore) -> Result<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| Error::Persistence(format!("store task failed: {e}")))?
}
