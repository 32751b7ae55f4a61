pub mod embeddings;

pub use embeddings::{EmbeddingAdapter, EmbeddingProvider, HttpProvider, Rejection};
