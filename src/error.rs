use thiserror::Error;

/// Failures surfaced by the embedding and search pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The composite text for a receipt is empty.
    #[error("receipt has no searchable content")]
    InvalidContent,

    /// No embedding provider is configured.
    #[error("no embedding provider is available")]
    ProviderUnavailable,

    /// Every available provider was tried and failed. `provider` names the
    /// last one attempted.
    #[error("embedding request to {provider} failed: {message}")]
    ProviderRequestFailed { provider: String, message: String },

    /// Every available provider failed and at least one of them refused
    /// this particular input.
    #[error("embedding provider {provider} rejected the content: {message}")]
    ContentRejected { provider: String, message: String },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn persistence(err: anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }

    /// Provider failures are recoverable: the caller moves on to the next
    /// item or the next search tier.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable
                | Self::ProviderRequestFailed { .. }
                | Self::ContentRejected { .. }
        )
    }

    /// Failures caused by the receipt itself rather than by provider or
    /// store health. Only these count toward backfill quarantine.
    pub fn is_item_specific(&self) -> bool {
        matches!(self, Self::InvalidContent | Self::ContentRejected { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
