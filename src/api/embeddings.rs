use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::api::{on_store, ApiError};
use crate::error::Error;
use crate::models::{
    BackfillRequest, BackfillResponse, CompletionStats, EmbedRequest, EmbedResponse, StatsQuery,
};
use crate::state::AppState;
use crate::store::EmbeddingStore;

/// POST /api/embeddings - Embed arbitrary content, optionally attaching the
/// vector to an existing receipt.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let content = req.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(Error::InvalidRequest("content is required".to_string()).into());
    }

    let receipt_id = match req.receipt_id.as_deref() {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .map_err(|_| Error::InvalidRequest(format!("invalid receiptId: {raw}")))?;
            if state.store.get(id).is_none() {
                return Err(Error::NotFound(format!("receipt {id}")).into());
            }
            Some(id)
        }
        None => None,
    };

    let embedding = state.adapter.embed(content).await?;

    if let Some(id) = receipt_id {
        // The receipt may have been deleted while the provider call was in flight.
        let vector = embedding.clone();
        if !on_store(&state, move |store| store.write_embedding(id, vector)).await? {
            return Err(Error::NotFound(format!("receipt {id}")).into());
        }
        tracing::info!("Stored embedding for receipt {id}");
    }

    Ok(Json(EmbedResponse { embedding }))
}

/// POST /api/embeddings/backfill - Run one backfill batch.
///
/// Always 200 with per-item outcomes unless the request is invalid or the
/// store cannot be read.
pub async fn backfill(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BackfillResponse>, ApiError> {
    // Every field is optional, so an empty body is a valid request.
    let req: BackfillRequest = if body.iter().all(u8::is_ascii_whitespace) {
        BackfillRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidRequest(format!("malformed body: {e}")))?
    };
    let limits = &state.config.backfill;

    let batch_size = match req.batch_size {
        Some(0) => {
            return Err(Error::InvalidRequest("batchSize must be at least 1".to_string()).into())
        }
        Some(n) => n.min(limits.max_batch_size),
        None => limits.default_batch_size,
    };
    let user_id = req.user_id.as_deref().filter(|u| !u.trim().is_empty());

    let report = state.backfill.run_batch(batch_size, user_id).await?;

    Ok(Json(BackfillResponse {
        success: true,
        report,
    }))
}

/// GET /api/embeddings/stats - Embedding coverage, optionally for one user.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<CompletionStats>, ApiError> {
    let user_id = query.user_id.as_deref().filter(|u| !u.trim().is_empty());
    Ok(Json(state.store.completion_stats(user_id)?))
}
