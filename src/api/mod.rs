pub mod embeddings;
pub mod receipts;
pub mod search;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::Error;
use crate::state::AppState;
use crate::store::ReceiptStore;

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/embeddings", post(embeddings::generate))
        .route("/api/embeddings/backfill", post(embeddings::backfill))
        .route("/api/embeddings/stats", get(embeddings::stats))
        .route("/api/search", post(search::search))
        .route("/api/receipts", post(receipts::create_receipt))
        .route(
            "/api/receipts/{id}",
            patch(receipts::update_receipt).delete(receipts::delete_receipt),
        )
        .with_state(state)
}

/// Run a store mutation on the blocking pool; it writes to disk.
async fn on_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ReceiptStore) -> Result<T, Error> + Send + 'static,
{
    let store = state.store.clone();
    let out = tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| Error::Persistence(format!("store task failed: {e}")))??;
    Ok(out)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Error response: `{error, details?}` with a status derived from [`Error`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, error, details) = match &err {
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Error::InvalidContent => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found"), None),
            Error::ProviderUnavailable
            | Error::ProviderRequestFailed { .. }
            | Error::ContentRejected { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate embedding".to_string(),
                Some(err.to_string()),
            ),
            Error::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage failure".to_string(),
                Some(err.to_string()),
            ),
        };
        if status.is_server_error() {
            tracing::error!("{err}");
        }
        Self {
            status,
            body: ErrorBody { error, details },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(Error::InvalidRequest("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::InvalidContent).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::NotFound("receipt".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(Error::ProviderUnavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(Error::Persistence("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_failure_has_details() {
        let err = ApiError::from(Error::ProviderRequestFailed {
            provider: "openai".into(),
            message: "503".into(),
        });
        assert_eq!(err.body.error, "Failed to generate embedding");
        assert_eq!(
            err.body.details.as_deref(),
            Some("embedding request to openai failed: 503")
        );
    }
}
