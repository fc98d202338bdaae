//! List endpoints for organizations, categories and persons.

use std::sync::Arc;

use axum::Json;
use axum::extract::{RawQuery, State};
use common::search_result::{IndexableSearchItem, IndexableSearchResponse, SearchMeta};
use serde_json::json;

use crate::AppState;
use crate::api::search::query_params::parse_query_string;
use crate::errors::SearchError;
use crate::indexer::{categories, organizations, persons};

type FromHit = fn(&str, &serde_json::Value, &str, &[String]) -> IndexableSearchItem;

pub async fn search_organizations(
    state: State<Arc<AppState>>,
    raw: RawQuery,
) -> Result<Json<IndexableSearchResponse>, SearchError> {
    search_indexable(state, raw, organizations::ORGANIZATIONS_INDEX, organizations::from_hit).await
}

pub async fn search_categories(
    state: State<Arc<AppState>>,
    raw: RawQuery,
) -> Result<Json<IndexableSearchResponse>, SearchError> {
    search_indexable(state, raw, categories::CATEGORIES_INDEX, categories::from_hit).await
}

pub async fn search_persons(
    state: State<Arc<AppState>>,
    raw: RawQuery,
) -> Result<Json<IndexableSearchResponse>, SearchError> {
    search_indexable(state, raw, persons::PERSONS_INDEX, persons::from_hit).await
}

async fn search_indexable(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
    index: &str,
    from_hit: FromHit,
) -> Result<Json<IndexableSearchResponse>, SearchError> {
    let params = parse_query_string(raw.as_deref(), &state.registry)?;

    let query = match &params.query {
        Some(text) => json!({
            "multi_match": { "fields": ["title.*"], "query": text, "type": "cross_fields" }
        }),
        None => json!({ "match_all": {} }),
    };
    let limit = params.limit.unwrap_or(state.config.default_page_size);
    let body = json!({ "query": query, "from": params.offset, "size": limit });
    let response = state.engine.search::<serde_json::Value>(index, &body).await?;

    let language = params
        .language
        .unwrap_or_else(|| state.config.default_language.clone());
    let objects: Vec<_> = response
        .hits
        .hits
        .iter()
        .map(|hit| from_hit(&hit.id, &hit.source, &language, &state.config.languages_priority))
        .collect();

    Ok(Json(IndexableSearchResponse {
        meta: SearchMeta {
            count: objects.len() as u64,
            offset: params.offset,
            total_count: response.hits.total.value,
        },
        objects,
    }))
}
