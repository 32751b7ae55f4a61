use std::sync::Arc;

use crate::backfill::BackfillOrchestrator;
use crate::config::Config;
use crate::llm::EmbeddingAdapter;
use crate::search::SearchEngine;
use crate::store::ReceiptStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<ReceiptStore>,
    pub adapter: Arc<EmbeddingAdapter>,
    pub backfill: Arc<BackfillOrchestrator>,
    pub search: Arc<SearchEngine>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = ReceiptStore::open_or_create(&config.data_dir)?
            .with_max_attempts(config.backfill.max_attempts);

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()?;
        let adapter = EmbeddingAdapter::from_config(&http_client, &config.embedding);

        Ok(Self::with_components(config, Arc::new(store), Arc::new(adapter)))
    }

    /// Wire state around an already-built store and adapter.
    pub fn with_components(
        config: Config,
        store: Arc<ReceiptStore>,
        adapter: Arc<EmbeddingAdapter>,
    ) -> Self {
        let backfill = BackfillOrchestrator::new(store.clone(), adapter.clone())
            .with_concurrency(config.backfill.concurrency);
        let search = SearchEngine::new(store.clone(), adapter.clone())
            .with_min_score(config.search.min_score);

        Self {
            config,
            store,
            adapter,
            backfill: Arc::new(backfill),
            search: Arc::new(search),
        }
    }
}
