//! Error taxonomy for the search service.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::search_result::ErrorResponse;


/// Errors surfaced by the HTTP search endpoints.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Malformed or out-of-range request parameters, reported per field.
    #[error("invalid search parameters")]
    Validation(BTreeMap<String, Vec<String>>),

    /// The engine holds no document with the requested ID.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The search engine call failed or returned an unreadable payload.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { errors })).into_response()
            }
            Self::NotFound(id) => {
                let mut errors = BTreeMap::new();
                errors.insert("id".to_string(), vec![format!("No object matching id {id}")]);
                (StatusCode::NOT_FOUND, Json(ErrorResponse { errors })).into_response()
            }
            Self::Engine(error) => {
                tracing::error!("search engine failure: {error:#}");
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}


/// Errors raised by the batch indexing pipeline. Both variants abort the
/// whole run: a crashed job beats a silently incomplete index.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Transport-level failure talking to the upstream content API.
    #[error("content API request failed: {0}")]
    Api(String),

    /// The upstream returned data that does not match the expected shape.
    #[error("malformed content API data: {0}")]
    Data(String),
}
