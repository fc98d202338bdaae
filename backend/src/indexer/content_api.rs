//! Client for the upstream content API serving published objects.

use crate::config::Config;
use crate::errors::IndexerError;

/// Page size used when walking paged listings.
const FETCH_PAGE_SIZE: u64 = 50;


#[derive(Debug, Clone)]
pub struct ContentApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ContentApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            base_url: config.content_api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Walks a paged listing until the cumulative offset reaches the
    /// API-reported total. The total starts unknown (effectively infinite)
    /// so the first request is always issued. Any transport or shape
    /// problem aborts the whole walk; the indexing job is fail-fast.
    pub async fn fetch_all(&self, endpoint: &str) -> Result<Vec<serde_json::Value>, IndexerError> {
        let mut records = Vec::new();
        let mut offset: u64 = 0;
        let mut total = u64::MAX;
        while offset < total {
            let url = format!(
                "{}/{}/?limit={}&offset={}",
                self.base_url, endpoint, FETCH_PAGE_SIZE, offset
            );
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|error| IndexerError::Api(format!("{url}: {error}")))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|error| IndexerError::Api(format!("{url}: {error}")))?;
            if !status.is_success() {
                return Err(IndexerError::Api(format!("{url}: {status}: {text}")));
            }
            let page: serde_json::Value = serde_json::from_str(&text)
                .map_err(|error| IndexerError::Api(format!("{url}: unparsable JSON: {error}")))?;

            let count = page
                .get("count")
                .and_then(|count| count.as_u64())
                .ok_or_else(|| IndexerError::Data(format!("{url}: response has no count")))?;
            let results = page
                .get("results")
                .and_then(|results| results.as_array())
                .ok_or_else(|| IndexerError::Data(format!("{url}: response has no results")))?;
            if results.is_empty() && offset < count {
                // A short page would loop forever; treat it as bad data.
                return Err(IndexerError::Data(format!(
                    "{url}: empty page at offset {offset} of {count}"
                )));
            }
            offset += results.len() as u64;
            records.extend(results.iter().cloned());
            total = count;
        }
        Ok(records)
    }

    /// Looks up the tree base page for a reverse identifier. Returns
    /// `Ok(None)` when no such page is published.
    pub async fn page_path(&self, reverse_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!("{}/pages/?reverse_id={}&limit=1", self.base_url, reverse_id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Error: {}: {}", status, text);
        }
        let page: serde_json::Value = serde_json::from_str(&text)?;
        let path = page
            .get("results")
            .and_then(|results| results.as_array())
            .and_then(|results| results.first())
            .and_then(|result| result.get("path"))
            .and_then(|path| path.as_str())
            .map(str::to_string);
        Ok(path)
    }
}
