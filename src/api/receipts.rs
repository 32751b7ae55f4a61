//! Minimal receipt ingestion so the service can be exercised on its own.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::{on_store, ApiError};
use crate::error::Error;
use crate::models::{CreateReceiptRequest, Receipt, ReceiptPatch};
use crate::state::AppState;

/// A receipt as returned over HTTP: the vector itself is left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub has_embedding: bool,
}

impl From<Receipt> for ReceiptResponse {
    fn from(mut receipt: Receipt) -> Self {
        let has_embedding = receipt.embedding.take().is_some();
        Self {
            receipt,
            has_embedding,
        }
    }
}

/// POST /api/receipts - Store a new receipt without an embedding.
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(req): Json<CreateReceiptRequest>,
) -> Result<(StatusCode, Json<ReceiptResponse>), ApiError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(Error::InvalidRequest("userId is required".to_string()).into());
    }

    let receipt = Receipt::new(user_id, req.fields);
    let receipt = on_store(&state, move |store| store.insert_receipt(receipt)).await?;
    tracing::info!("Created receipt {} for {}", receipt.id, receipt.user_id);

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// PATCH /api/receipts/{id} - Edit textual fields; `null` clears one.
/// Changing the searchable text drops the stored embedding.
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ReceiptPatch>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    match on_store(&state, move |store| store.update_receipt(id, patch)).await? {
        Some(receipt) => Ok(Json(receipt.into())),
        None => Err(Error::NotFound(format!("receipt {id}")).into()),
    }
}

/// DELETE /api/receipts/{id}
pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if on_store(&state, move |store| store.delete_receipt(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("receipt {id}")).into())
    }
}
