use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the receipt store is persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Backfill batch settings
    pub backfill: BackfillConfig,
    /// Search tier settings
    pub search: SearchConfig,
}

/// Which HTTP backend a provider entry talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    HuggingFace,
    Ollama,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "huggingface" | "hf" => Some(Self::HuggingFace),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
        }
    }
}

/// One embedding backend. A provider with missing credentials stays in the
/// list but is skipped at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL for the API. Required for Ollama, defaulted for the others.
    pub base_url: Option<String>,
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn is_available(&self) -> bool {
        match self.kind {
            ProviderKind::OpenAi | ProviderKind::HuggingFace => self
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty()),
            ProviderKind::Ollama => self
                .base_url
                .as_deref()
                .is_some_and(|u| !u.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// System-wide embedding dimension
    pub dimension: usize,
    /// Per-call timeout in seconds (capped at 30)
    pub timeout_secs: u64,
    /// Providers in failover order
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    pub default_batch_size: usize,
    pub max_batch_size: usize,
    /// Concurrent provider calls within one batch (1 = sequential, capped at 5)
    pub concurrency: usize,
    /// Failed attempts before a receipt stops being selected (0 = never)
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum cosine similarity for a vector-tier hit
    pub min_score: f32,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            embedding: EmbeddingConfig::default(),
            backfill: BackfillConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            timeout_secs: 5,
            providers: vec![
                ProviderConfig {
                    kind: ProviderKind::OpenAi,
                    base_url: Some("https://api.openai.com".to_string()),
                    model: "text-embedding-3-small".to_string(),
                    api_key: None,
                },
                ProviderConfig {
                    kind: ProviderKind::HuggingFace,
                    base_url: Some("https://api-inference.huggingface.co".to_string()),
                    model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                    api_key: None,
                },
                ProviderConfig {
                    kind: ProviderKind::Ollama,
                    base_url: None,
                    model: "all-minilm".to_string(),
                    api_key: None,
                },
            ],
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 5,
            max_batch_size: 100,
            concurrency: 1,
            max_attempts: 5,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            default_limit: 5,
            max_limit: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RECEIPT_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("RECEIPT_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Embedding config
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dimension = d;
            }
        }
        if let Ok(val) = std::env::var("EMBEDDING_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.embedding.timeout_secs = v.min(30);
            }
        }
        for provider in config.embedding.providers.iter_mut() {
            let prefix = match provider.kind {
                ProviderKind::OpenAi => "OPENAI",
                ProviderKind::HuggingFace => "HUGGINGFACE",
                ProviderKind::Ollama => "OLLAMA",
            };
            if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
                provider.api_key = Some(key);
            }
            if let Ok(url) = std::env::var(format!("{prefix}_BASE_URL")) {
                provider.base_url = Some(url);
            }
            if let Ok(model) = std::env::var(format!("{prefix}_EMBEDDING_MODEL")) {
                provider.model = model;
            }
        }
        if let Ok(order) = std::env::var("EMBEDDING_PROVIDERS") {
            config.embedding.providers = reorder_providers(&config.embedding.providers, &order);
        }

        // Backfill config
        if let Ok(val) = std::env::var("BACKFILL_DEFAULT_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.backfill.default_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("BACKFILL_MAX_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                config.backfill.max_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("BACKFILL_CONCURRENCY") {
            if let Ok(v) = val.parse::<usize>() {
                config.backfill.concurrency = v.clamp(1, 5);
            }
        }
        if let Ok(val) = std::env::var("BACKFILL_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.backfill.max_attempts = v;
            }
        }

        // Search config
        if let Ok(val) = std::env::var("SEARCH_MIN_SCORE") {
            if let Ok(v) = val.parse() {
                config.search.min_score = v;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_DEFAULT_LIMIT") {
            if let Ok(v) = val.parse() {
                config.search.default_limit = v;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_MAX_LIMIT") {
            if let Ok(v) = val.parse() {
                config.search.max_limit = v;
            }
        }

        config.sanitized()
    }

    /// Keep sizes and limits usable: at least 1, and defaults within their max.
    fn sanitized(mut self) -> Self {
        self.embedding.dimension = self.embedding.dimension.max(1);

        let backfill = &mut self.backfill;
        backfill.max_batch_size = backfill.max_batch_size.max(1);
        backfill.default_batch_size = backfill.default_batch_size.clamp(1, backfill.max_batch_size);

        let search = &mut self.search;
        search.max_limit = search.max_limit.max(1);
        search.default_limit = search.default_limit.clamp(1, search.max_limit);
        self
    }

    /// Directory holding one JSON file per receipt.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("receipts")
    }
}

/// Rebuild the provider list in the order named by a comma-separated list.
/// Providers not named are dropped; unknown names are ignored.
fn reorder_providers(providers: &[ProviderConfig], order: &str) -> Vec<ProviderConfig> {
    let mut ordered = Vec::new();
    for name in order.split(',').filter(|s| !s.trim().is_empty()) {
        let Some(kind) = ProviderKind::parse(name) else {
            tracing::warn!("Ignoring unknown embedding provider '{}'", name.trim());
            continue;
        };
        if ordered.iter().any(|p: &ProviderConfig| p.kind == kind) {
            continue;
        }
        if let Some(p) = providers.iter().find(|p| p.kind == kind) {
            ordered.push(p.clone());
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimension_and_threshold() {
        let config = Config::default();
        assert_eq!(config.embedding.dimension, 384);
        assert!((config.search.min_score - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.backfill.default_batch_size, 5);
        assert_eq!(config.search.default_limit, 5);
    }

    #[test]
    fn test_zero_limits_are_raised_to_one() {
        let mut config = Config::default();
        config.search.default_limit = 0;
        config.search.max_limit = 0;
        config.backfill.default_batch_size = 0;
        config.backfill.max_batch_size = 0;

        let config = config.sanitized();
        assert_eq!(config.search.default_limit, 1);
        assert_eq!(config.search.max_limit, 1);
        assert_eq!(config.backfill.default_batch_size, 1);
        assert_eq!(config.backfill.max_batch_size, 1);
    }

    #[test]
    fn test_default_limit_never_exceeds_max() {
        let mut config = Config::default();
        config.search.default_limit = 80;
        config.search.max_limit = 20;
        let config = config.sanitized();
        assert_eq!(config.search.default_limit, 20);
        assert_eq!(config.search.max_limit, 20);
    }

    #[test]
    fn test_providers_without_credentials_are_unavailable() {
        let config = EmbeddingConfig::default();
        assert!(config.providers.iter().all(|p| !p.is_available()));
    }

    #[test]
    fn test_ollama_available_with_base_url() {
        let p = ProviderConfig {
            kind: ProviderKind::Ollama,
            base_url: Some("http://localhost:11434".to_string()),
            model: "all-minilm".to_string(),
            api_key: None,
        };
        assert!(p.is_available());
    }

    #[test]
    fn test_blank_api_key_is_unavailable() {
        let p = ProviderConfig {
            kind: ProviderKind::OpenAi,
            base_url: None,
            model: "m".to_string(),
            api_key: Some("   ".to_string()),
        };
        assert!(!p.is_available());
    }

    #[test]
    fn test_reorder_providers() {
        let providers = EmbeddingConfig::default().providers;
        let ordered = reorder_providers(&providers, "ollama, openai, bogus, ollama");
        let kinds: Vec<_> = ordered.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Ollama, ProviderKind::OpenAi]);
    }
}
