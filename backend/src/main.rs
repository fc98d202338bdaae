//! Service entrypoint: serve the search API, or rebuild the indices with
//! the `reindex` argument.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use backend::api::search::{
    filter_definitions, get_course, search_categories, search_courses, search_organizations,
    search_persons,
};
use backend::config::Config;
use backend::filters::FilterRegistry;
use backend::indexer::content_api::ContentApiClient;
use backend::search_engine::SearchEngine;
use backend::{AppState, indexer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let engine = SearchEngine::new(&config)?;
    let content_api = ContentApiClient::new(&config)?;

    if std::env::args().nth(1).as_deref() == Some("reindex") {
        indexer::regenerate_indices(&engine, &content_api).await?;
        return Ok(());
    }

    let registry = FilterRegistry::from_config(&config);
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        registry,
        engine,
        content_api,
    });

    let app = Router::new()
        .route("/api/v1.0/courses/", get(search_courses))
        .route("/api/v1.0/courses/{id}", get(get_course))
        .route("/api/v1.0/filter-definitions/", get(filter_definitions))
        .route("/api/v1.0/organizations/", get(search_organizations))
        .route("/api/v1.0/categories/", get(search_categories))
        .route("/api/v1.0/persons/", get(search_persons))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("listening on {}", bind_address);
    axum::serve(listener, app).await?;
    Ok(())
}
