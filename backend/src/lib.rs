//! Course catalog search backend.
//!
//! Turns HTTP query parameters into engine queries with per-filter facet
//! aggregations, reshapes the aggregation response for the API, and
//! batch-indexes published objects from the upstream content API.

pub mod api;
pub mod config;
pub mod errors;
pub mod facets;
pub mod filters;
pub mod indexer;
pub mod query_builder;
pub mod search_engine;

use config::Config;
use filters::FilterRegistry;
use indexer::content_api::ContentApiClient;
use search_engine::SearchEngine;


/// Shared state for all request handlers, built once at startup.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub registry: FilterRegistry,
    pub engine: SearchEngine,
    pub content_api: ContentApiClient,
}
