//! Category (taxonomy node) index: mapping and adapters.

use common::search_result::IndexableSearchItem;
use serde_json::json;

use crate::errors::IndexerError;
use super::{require_id, require_multilingual, translated_field};

pub const CATEGORIES_INDEX: &str = "categories";

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
                "path": { "type": "keyword" },
                "logo": { "type": "keyword", "index": false },
            }
        }
    })
}

pub fn to_document(record: &serde_json::Value) -> Result<serde_json::Value, IndexerError> {
    let id = require_id(record, "category")?;
    let context = format!("category {id}");
    let title = require_multilingual(record, "titles", &context)?;
    let path = record
        .get("path")
        .and_then(|path| path.as_str())
        .ok_or_else(|| IndexerError::Data(format!("{context}: missing path")))?;
    Ok(json!({
        "id": id,
        "title": title,
        "path": path,
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
        path: source
            .get("path")
            .and_then(|value| value.as_str())
            .map(str::to_string),
        logo: source
            .get("logo")
            .and_then(|value| value.as_str())
            .map(str::to_string),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_round_trip() {
        let record = json!({
            "id": "42",
            "titles": { "en": "Physics", "fr": "Physique" },
            "path": "00020001"
        });
        let document = to_document(&record).unwrap();
        let item = from_hit("42", &document, "fr", &["en".to_string()]);
        assert_eq!(item.title.as_deref(), Some("Physique"));
        assert_eq!(item.path.as_deref(), Some("00020001"));
    }

    #[test]
    fn missing_path_is_fatal() {
        let record = json!({ "id": "42", "titles": { "en": "Physics" } });
        assert!(to_document(&record).is_err());
    }
}
