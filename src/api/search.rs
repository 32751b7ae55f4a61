use axum::extract::State;
use axum::Json;

use crate::api::ApiError;
use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /api/search - Tiered receipt search:
///   1. Vector similarity (skipped when no embedding provider answers)
///   2. Whole-phrase weighted text match
///   3. Per-word substring match
///
/// Only invalid input and store failures are returned as errors.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limits = &state.config.search;
    let limit = req
        .limit
        .map(|l| l.min(limits.max_limit))
        .unwrap_or(limits.default_limit);

    let outcome = state.search.search(&req.query, &req.user_id, limit).await?;

    Ok(Json(SearchResponse {
        results: outcome.results,
    }))
}
