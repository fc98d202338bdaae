//! Process-wide configuration, loaded once at startup.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;


/// Per-filter override: disable a filter or move it in the display order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterOverride {
    pub enabled: Option<bool>,
    pub position: Option<usize>,
}


#[derive(Debug, Clone)]
pub struct Config {
    pub elasticsearch_url: String,
    pub content_api_url: String,
    pub bind_address: String,
    /// Page size applied when the request carries no `limit`.
    pub default_page_size: u64,
    /// Facet values returned per filter by default.
    pub facet_counts_default_limit: usize,
    /// Hard ceiling on facet values, also the limit under `_include` overrides.
    pub facet_counts_max_limit: usize,
    /// Applied to every outbound HTTP call, engine and content API alike.
    pub http_timeout: Duration,
    pub default_language: String,
    /// Site-wide language fallback order for multilingual fields.
    pub languages_priority: Vec<String>,
    pub filter_overrides: BTreeMap<String, FilterOverride>,
}

impl Config {
    /// Reads the whole configuration from environment variables. Filter
    /// overrides come as one JSON object, e.g.
    /// `SEARCH_FILTER_OVERRIDES={"languages": {"enabled": false}}`.
    pub fn from_env() -> anyhow::Result<Self> {
        let filter_overrides = match std::env::var("SEARCH_FILTER_OVERRIDES") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("invalid SEARCH_FILTER_OVERRIDES: {e}"))?,
            _ => BTreeMap::new(),
        };
        let languages_priority = std::env::var("SEARCH_LANGUAGES_PRIORITY")
            .unwrap_or("en,fr".to_string())
            .split(',')
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
        Ok(Self {
            elasticsearch_url: std::env::var("ELASTICSEARCH_URL")
                .unwrap_or("http://127.0.0.1:9200".to_string()),
            content_api_url: std::env::var("CONTENT_API_URL")
                .unwrap_or("http://127.0.0.1:8000/api/v1.0".to_string()),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or("0.0.0.0:8080".to_string()),
            default_page_size: env_number("SEARCH_DEFAULT_PAGE_SIZE", 20)?,
            facet_counts_default_limit: env_number("FACET_COUNTS_DEFAULT_LIMIT", 10)? as usize,
            facet_counts_max_limit: env_number("FACET_COUNTS_MAX_LIMIT", 50)? as usize,
            http_timeout: Duration::from_secs(env_number("SEARCH_HTTP_TIMEOUT_SECONDS", 30)?),
            default_language: std::env::var("SEARCH_DEFAULT_LANGUAGE").unwrap_or("en".to_string()),
            languages_priority,
            filter_overrides,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elasticsearch_url: "http://127.0.0.1:9200".to_string(),
            content_api_url: "http://127.0.0.1:8000/api/v1.0".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            default_page_size: 20,
            facet_counts_default_limit: 10,
            facet_counts_max_limit: 50,
            http_timeout: Duration::from_secs(30),
            default_language: "en".to_string(),
            languages_priority: vec!["en".to_string(), "fr".to_string()],
            filter_overrides: BTreeMap::new(),
        }
    }
}

fn env_number(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a non-negative integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
