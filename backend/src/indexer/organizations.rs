//! Organization index: mapping and adapters.

use common::search_result::IndexableSearchItem;
use serde_json::json;

use crate::errors::IndexerError;
use super::{require_id, require_multilingual, translated_field};

pub const ORGANIZATIONS_INDEX: &str = "organizations";

pub fn mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "dynamic_templates": [
                { "multilingual_text": {
                    "path_match": "title.*",
                    "mapping": { "type": "text" }
                } },
            ],
            "properties": {
                "id": { "type": "keyword" },
                "logo": { "type": "keyword", "index": false },
            }
        }
    })
}

pub fn to_document(record: &serde_json::Value) -> Result<serde_json::Value, IndexerError> {
    let id = require_id(record, "organization")?;
    let context = format!("organization {id}");
    let title = require_multilingual(record, "titles", &context)?;
    Ok(json!({
        "id": id,
        "title": title,
        "logo": record.get("logo").cloned().unwrap_or(serde_json::Value::Null),
    }))
}

pub fn from_hit(
    id: &str,
    source: &serde_json::Value,
    language: &str,
    fallback_order: &[String],
) -> IndexableSearchItem {
    IndexableSearchItem {
        id: id.to_string(),
        title: translated_field(source, "title", language, fallback_order),
        path: None,
        logo: source
            .get("logo")
            .and_then(|value| value.as_str())
            .map(str::to_string),
    }
}
