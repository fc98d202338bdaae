//! Course list endpoint: query building, engine call, response shaping.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{RawQuery, State};
use chrono::Utc;
use common::search_result::{CourseSearchResponse, SearchMeta};

use crate::AppState;
use crate::api::search::query_params::parse_query_string;
use crate::errors::SearchError;
use crate::indexer::courses;
use crate::{facets, query_builder};

pub async fn search_courses(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<CourseSearchResponse>, SearchError> {
    let params = parse_query_string(raw.as_deref(), &state.registry)?;
    state.registry.ensure_base_paths(&state.content_api).await;

    let now = Utc::now();
    let built = query_builder::build(&state.registry, &state.config, &params, now);
    let body = built.body();
    tracing::debug!("course search query: {}", body);

    let response = state
        .engine
        .search::<serde_json::Value>(courses::COURSES_INDEX, &body)
        .await?;

    let language = params
        .language
        .clone()
        .unwrap_or_else(|| state.config.default_language.clone());
    let objects: Vec<_> = response
        .hits
        .hits
        .iter()
        .map(|hit| {
            courses::from_hit(
                &hit.id,
                &hit.source,
                hit.fields.as_ref(),
                &language,
                &state.config.languages_priority,
                now,
            )
        })
        .collect();

    let shaped = facets::shape(
        response.aggregations.as_ref(),
        &state.registry,
        &params,
        &state.config,
    );
    let facets = shaped
        .into_iter()
        .map(|(name, result)| {
            (
                name,
                result.values.into_iter().collect::<BTreeMap<String, u64>>(),
            )
        })
        .collect();

    Ok(Json(CourseSearchResponse {
        meta: SearchMeta {
            count: objects.len() as u64,
            offset: built.offset,
            total_count: response.hits.total.value,
        },
        objects,
        facets,
    }))
}
