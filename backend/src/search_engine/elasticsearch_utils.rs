use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::Config;
use crate::errors::SearchError;

#[derive(Debug, Serialize, Deserialize)]
pub struct RawSearchResult<T> {
    pub hits: RawSearchHits<T>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub took: u64,
    /// Kept as raw JSON: the aggregation tree is request-shaped and the
    /// facet shaper walks it by filter name.
    pub aggregations: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawSearchHits<T> {
    pub hits: Vec<RawSearchHit<T>>,
    pub total: RawSearchTotal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawSearchTotal {
    pub value: u64,
    pub relation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RawSearchHit<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: T,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    /// Script fields requested alongside `_source`, e.g. the course state.
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawGetResult {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<serde_json::Value>,
}


/// Thin async client over the Elasticsearch HTTP API.
///
/// One instance per process; the reqwest client carries the configured
/// request timeout so no call inherits library defaults.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    base_url: String,
    client: reqwest::Client,
}

impl SearchEngine {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            base_url: config.elasticsearch_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn search<T: DeserializeOwned + std::fmt::Debug>(
        &self,
        index: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<RawSearchResult<T>> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let response_txt = response.text().await?;
        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Error: {}: {}", status, response_txt);
        }
        let response: RawSearchResult<T> = serde_json::from_str(&response_txt)?;
        Ok(response)
    }

    /// Fetches one document by ID; an unknown ID is a typed [`SearchError::NotFound`].
    pub async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<(String, serde_json::Value), SearchError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound(id.to_string()));
        }
        let response_txt = response.text().await.map_err(anyhow::Error::from)?;
        if status.is_client_error() || status.is_server_error() {
            return Err(anyhow::anyhow!("Error: {}: {}", status, response_txt).into());
        }
        let result: RawGetResult =
            serde_json::from_str(&response_txt).map_err(anyhow::Error::from)?;
        match (result.found, result.source) {
            (true, Some(source)) => Ok((result.id, source)),
            _ => Err(SearchError::NotFound(id.to_string())),
        }
    }

    /// Creates the index with its mapping unless it already exists.
    pub async fn ensure_index(
        &self,
        index: &str,
        mapping: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let url = format!("{}/{}", self.base_url, index);
        let head = self.client.head(&url).send().await?;
        if head.status().is_success() {
            return Ok(());
        }
        let response = self.client.put(&url).json(mapping).send().await?;
        let status = response.status();
        let response_txt = response.text().await?;
        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Error creating index {}: {}: {}", index, status, response_txt);
        }
        Ok(())
    }

    /// Sends one NDJSON bulk request. Any item-level error fails the call:
    /// the indexing pipeline is fail-fast by design.
    pub async fn bulk(&self, actions: &[serde_json::Value]) -> anyhow::Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for action in actions {
            body.push_str(&serde_json::to_string(action)?);
            body.push('\n');
        }
        let url = format!("{}/_bulk", self.base_url);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let response_txt = response.text().await?;
        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Error: {}: {}", status, response_txt);
        }
        let response: serde_json::Value = serde_json::from_str(&response_txt)?;
        if response.get("errors").and_then(|e| e.as_bool()).unwrap_or(false) {
            anyhow::bail!("bulk indexing reported item errors: {}", response_txt);
        }
        Ok(())
    }
}
