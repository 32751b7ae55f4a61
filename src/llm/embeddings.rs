use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, ProviderConfig, ProviderKind};
use crate::error::Error;

/// Maximum characters to send per text to an embedding API.
/// Receipt OCR dumps can be long; small sentence models only look at the
/// first few hundred tokens anyway.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    // Find the last char boundary at or before the limit
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// A provider refusing one specific input, as opposed to being down or
/// misconfigured. Providers return it inside their `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Rejection(pub String);

/// A single embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the provider has the credentials/endpoint it needs.
    fn is_available(&self) -> bool;

    /// Embed `text`, asking the backend for `dimension` values.
    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>>;
}

/// Tries providers in order and returns the first vector of the right size.
///
/// Holds no mutable state, so one adapter is shared across all requests.
pub struct EmbeddingAdapter {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    dimension: usize,
}

impl EmbeddingAdapter {
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>, dimension: usize) -> Self {
        Self {
            providers,
            dimension,
        }
    }

    /// Build HTTP providers for every configured backend, in config order.
    pub fn from_config(client: &reqwest::Client, config: &EmbeddingConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.clamp(1, 30));
        let providers = config
            .providers
            .iter()
            .map(|p| {
                Arc::new(HttpProvider::new(client.clone(), p.clone(), timeout))
                    as Arc<dyn EmbeddingProvider>
            })
            .collect();
        Self::new(providers, config.dimension)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// True when at least one provider could be called.
    pub fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    /// Names of providers that will be attempted, in order.
    pub fn available_providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Embed `text` with the first provider that succeeds.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        if text.trim().is_empty() {
            return Err(Error::InvalidContent);
        }
        let text = truncate_for_embedding(text);

        let mut last_failure: Option<(String, String)> = None;
        let mut rejected: Option<(String, String)> = None;
        for provider in self.providers.iter().filter(|p| p.is_available()) {
            match provider.embed(text, self.dimension).await {
                Ok(vector) if vector.len() == self.dimension => return Ok(vector),
                Ok(vector) => {
                    let message = format!(
                        "expected {} dimensions, got {}",
                        self.dimension,
                        vector.len()
                    );
                    tracing::warn!("Embedding provider {} rejected: {message}", provider.name());
                    last_failure = Some((provider.name().to_string(), message));
                }
                Err(e) => {
                    tracing::warn!("Embedding provider {} failed: {e:#}", provider.name());
                    let failure = (provider.name().to_string(), format!("{e:#}"));
                    if e.downcast_ref::<Rejection>().is_some() {
                        rejected = Some(failure.clone());
                    }
                    last_failure = Some(failure);
                }
            }
        }

        if let Some((provider, message)) = rejected {
            return Err(Error::ContentRejected { provider, message });
        }
        match last_failure {
            Some((provider, message)) => Err(Error::ProviderRequestFailed { provider, message }),
            None => Err(Error::ProviderUnavailable),
        }
    }
}

/// HTTP-backed provider for one configured backend.
pub struct HttpProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig, timeout: Duration) -> Self {
        Self {
            client,
            config,
            timeout,
        }
    }

    fn base_url(&self) -> Result<&str> {
        self.config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .context("Provider base_url not configured")
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    fn name(&self) -> &str {
        self.config.kind.as_str()
    }

    fn is_available(&self) -> bool {
        self.config.is_available()
    }

    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>> {
        match self.config.kind {
            ProviderKind::OpenAi => embed_openai(self, text, dimension).await,
            ProviderKind::HuggingFace => embed_huggingface(self, text).await,
            ProviderKind::Ollama => embed_ollama(self, text, dimension).await,
        }
    }
}

async fn post_json<T: Serialize + ?Sized>(
    provider: &HttpProvider,
    url: &str,
    body: &T,
) -> Result<reqwest::Response> {
    let mut req = provider.client.post(url).timeout(provider.timeout).json(body);
    if let Some(key) = provider.config.api_key.as_deref() {
        req = req.header("Authorization", format!("Bearer {}", key.trim()));
    }

    let resp = req
        .send()
        .await
        .with_context(|| format!("Failed to call {} embed API", provider.name()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = format!("{} embed API returned {status}: {body}", provider.name());
        // The input itself was refused, so the same text will fail again.
        if matches!(status.as_u16(), 400 | 413 | 422) {
            return Err(Rejection(message).into());
        }
        anyhow::bail!(message);
    }
    Ok(resp)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(provider: &HttpProvider, text: &str, dimension: usize) -> Result<Vec<f32>> {
    let url = format!("{}/v1/embeddings", provider.base_url()?);
    let req = OpenAiEmbedRequest {
        model: &provider.config.model,
        input: text,
        dimensions: dimension,
    };

    let body: OpenAiEmbedResponse = post_json(provider, &url, &req)
        .await?
        .json()
        .await
        .context("Failed to parse OpenAI embed response")?;

    body.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .context("OpenAI returned no embedding")
}

// ─── Hugging Face inference ──────────────────────────────

#[derive(Serialize)]
struct HfEmbedRequest<'a> {
    inputs: &'a str,
}

/// Feature-extraction returns a flat vector for one sentence, but some
/// deployments wrap it in an outer batch array.
#[derive(Deserialize)]
#[serde(untagged)]
enum HfEmbedResponse {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

async fn embed_huggingface(provider: &HttpProvider, text: &str) -> Result<Vec<f32>> {
    let url = format!(
        "{}/pipeline/feature-extraction/{}",
        provider.base_url()?,
        provider.config.model
    );
    let req = HfEmbedRequest { inputs: text };

    let body: HfEmbedResponse = post_json(provider, &url, &req)
        .await?
        .json()
        .await
        .context("Failed to parse Hugging Face embed response")?;

    match body {
        HfEmbedResponse::Flat(v) => Ok(v),
        HfEmbedResponse::Nested(vs) => vs
            .into_iter()
            .next()
            .context("Hugging Face returned no embedding"),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    /// Ask Ollama to silently truncate inputs that exceed the model's context
    /// length instead of returning a 400 error.
    truncate: bool,
    dimensions: usize,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(provider: &HttpProvider, text: &str, dimension: usize) -> Result<Vec<f32>> {
    let url = format!("{}/api/embed", provider.base_url()?);
    let req = OllamaEmbedRequest {
        model: &provider.config.model,
        input: text,
        truncate: true,
        dimensions: dimension,
    };

    let body: OllamaEmbedResponse = post_json(provider, &url, &req)
        .await?
        .json()
        .await
        .context("Failed to parse Ollama embed response")?;

    body.embeddings
        .into_iter()
        .next()
        .context("Ollama returned no embedding")
}
