//! # receipt-search
//!
//! Semantic search over purchase receipts. Receipts are turned into
//! embeddings by a resumable backfill process, and queries are answered by
//! a search that degrades from vector similarity to plain text matching
//! when embeddings or the embedding provider are unavailable.
//!
//! ## Architecture
//!
//! ```text
//!   backfill:   Store ──▶ compose ──▶ EmbeddingAdapter ──▶ Store
//!                (missing)            (provider failover)   (write_embedding)
//!
//!   search:     query ──▶ EmbeddingAdapter ──▶ similarity_search ─┐
//!                  │                                   (no hits)  │
//!                  └──────────────▶ text_search ◀─────────────────┘
//!                                       │ (no hits)
//!                                       ▼
//!                                 substring_search
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for providers, backfill and search
//! - [`error`] - Typed error taxonomy shared by every component
//! - [`models`] - Receipt, job, stats and request/response types
//! - [`compose`] - Canonical text built from a receipt's fields
//! - [`llm::embeddings`] - Ordered embedding providers with failover and dimension checks
//! - [`store`] - Receipt store with idempotent embedding writes, stats and search primitives
//! - [`backfill`] - Batch embedding of receipts that lack one
//! - [`search`] - Vector → text → substring search state machine
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state wiring the components together

pub mod api;
pub mod backfill;
pub mod compose;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
