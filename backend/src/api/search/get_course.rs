//! Single course retrieval by ID.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, RawQuery, State};
use chrono::Utc;
use common::search_result::CourseSearchItem;

use crate::AppState;
use crate::api::search::query_params::parse_query_string;
use crate::errors::SearchError;
use crate::indexer::courses;

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<CourseSearchItem>, SearchError> {
    let params = parse_query_string(raw.as_deref(), &state.registry)?;
    let language = params
        .language
        .unwrap_or_else(|| state.config.default_language.clone());

    let (id, source) = state
        .engine
        .get_document(courses::COURSES_INDEX, &id)
        .await?;
    // A plain document get carries no script fields, so no state either.
    Ok(Json(courses::from_hit(
        &id,
        &source,
        None,
        &language,
        &state.config.languages_priority,
        Utc::now(),
    )))
}
