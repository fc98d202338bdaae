//! Filter-definitions endpoint: metadata plus named facet values.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{RawQuery, State};
use chrono::Utc;
use common::search_result::{FacetValue, FilterDefinitionsResponse, FilterPresentation};
use serde_json::json;

use crate::AppState;
use crate::api::search::query_params::parse_query_string;
use crate::errors::SearchError;
use crate::filters::{FilterKind, NameSource};
use crate::indexer::{courses, translated_field};
use crate::search_engine::SearchEngine;
use crate::{facets, query_builder};

pub async fn filter_definitions(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<FilterDefinitionsResponse>, SearchError> {
    let params = parse_query_string(raw.as_deref(), &state.registry)?;
    state.registry.ensure_base_paths(&state.content_api).await;

    let built = query_builder::build(&state.registry, &state.config, &params, Utc::now());
    let mut body = built.body();
    // Facet values only, no hits.
    body["size"] = json!(0);
    let response = state
        .engine
        .search::<serde_json::Value>(courses::COURSES_INDEX, &body)
        .await?;
    let shaped = facets::shape(
        response.aggregations.as_ref(),
        &state.registry,
        &params,
        &state.config,
    );

    let language = params
        .language
        .clone()
        .unwrap_or_else(|| state.config.default_language.clone());
    let mut filters = BTreeMap::new();
    for (filter, _nested_path) in state.registry.faceted() {
        let name = filter.meta.name;
        let result = shaped.get(name).cloned().unwrap_or_default();
        let keys: Vec<String> = result.values.iter().map(|(key, _)| key.clone()).collect();
        let names = match filter.name_source() {
            NameSource::Index { index, key_field } => {
                resolve_index_names(
                    &state.engine,
                    index,
                    key_field,
                    &keys,
                    &language,
                    &state.config.languages_priority,
                )
                .await?
            }
            NameSource::Vocabulary(vocabulary) => vocabulary
                .iter()
                .map(|(key, display)| (key.to_string(), display.to_string()))
                .collect(),
            NameSource::None => BTreeMap::new(),
        };
        let values = result
            .values
            .into_iter()
            .map(|(key, count)| FacetValue {
                human_name: names.get(&key).cloned().unwrap_or_else(|| key.clone()),
                key,
                count,
            })
            .collect();
        let base_path = match &filter.kind {
            FilterKind::Tree(tree) => tree.base_path(),
            _ => None,
        };
        filters.insert(
            name.to_string(),
            FilterPresentation {
                human_name: filter.meta.human_name.to_string(),
                position: filter.meta.position,
                is_drilldown: filter.meta.is_drilldown,
                is_searchable: filter.meta.is_searchable,
                is_autocompletable: filter.meta.is_autocompletable,
                base_path,
                has_more_values: result.has_more_values,
                values,
            },
        );
    }

    Ok(Json(FilterDefinitionsResponse { filters }))
}

/// Looks bucket keys up in the index holding their display names and picks
/// the best translation per key. Keys without a match keep their raw form.
async fn resolve_index_names(
    engine: &SearchEngine,
    index: &str,
    key_field: &str,
    keys: &[String],
    language: &str,
    fallback_order: &[String],
) -> Result<BTreeMap<String, String>, SearchError> {
    let mut names = BTreeMap::new();
    if keys.is_empty() {
        return Ok(names);
    }
    let body = json!({
        "query": { "terms": { key_field: keys } },
        "size": keys.len(),
    });
    let response = engine.search::<serde_json::Value>(index, &body).await?;
    for hit in &response.hits.hits {
        let Some(key) = hit.source.get(key_field).and_then(|key| key.as_str()) else {
            continue;
        };
        if let Some(title) = translated_field(&hit.source, "title", language, fallback_order) {
            names.insert(key.to_string(), title);
        }
    }
    Ok(names)
}
