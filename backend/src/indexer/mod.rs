//! Indexable object adapters and the batch indexing pipeline.
//!
//! Each adapter maps a published object from the content API into its
//! engine document (`to_document`) and a search hit back into an API
//! record (`from_hit`). Malformed upstream data is a typed error, never a
//! skipped record: the reindex job prefers crashing over an index that is
//! silently missing objects.

pub mod categories;
pub mod content_api;
pub mod courses;
pub mod organizations;
pub mod persons;

use common::multilingual::MultilingualText;
use serde_json::json;

use crate::errors::IndexerError;
use crate::search_engine::SearchEngine;
use content_api::ContentApiClient;


/// Rebuilds all indices sequentially. The first failure of any kind aborts
/// the whole run.
pub async fn regenerate_indices(
    engine: &SearchEngine,
    api: &ContentApiClient,
) -> anyhow::Result<()> {
    reindex(engine, api, courses::COURSES_INDEX, courses::mapping(), courses::to_document).await?;
    reindex(
        engine,
        api,
        organizations::ORGANIZATIONS_INDEX,
        organizations::mapping(),
        organizations::to_document,
    )
    .await?;
    reindex(
        engine,
        api,
        categories::CATEGORIES_INDEX,
        categories::mapping(),
        categories::to_document,
    )
    .await?;
    reindex(engine, api, persons::PERSONS_INDEX, persons::mapping(), persons::to_document).await?;
    Ok(())
}

async fn reindex(
    engine: &SearchEngine,
    api: &ContentApiClient,
    index: &str,
    mapping: serde_json::Value,
    to_document: fn(&serde_json::Value) -> Result<serde_json::Value, IndexerError>,
) -> anyhow::Result<()> {
    engine.ensure_index(index, &mapping).await?;
    let records = api.fetch_all(index).await?;
    let mut actions = Vec::with_capacity(records.len() * 2);
    for record in &records {
        let document = to_document(record)?;
        let id = document
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| IndexerError::Data(format!("{index}: document without id")))?
            .to_string();
        actions.push(json!({ "index": { "_index": index, "_id": id } }));
        actions.push(document);
    }
    engine.bulk(&actions).await?;
    tracing::info!("indexed {} documents into {}", records.len(), index);
    Ok(())
}


pub(crate) fn require_id(
    record: &serde_json::Value,
    context: &str,
) -> Result<String, IndexerError> {
    match record.get("id") {
        Some(serde_json::Value::String(id)) => Ok(id.clone()),
        Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
        _ => Err(IndexerError::Data(format!("{context}: record has no id"))),
    }
}

/// Reads a required `{language: text}` object off an upstream record.
pub(crate) fn require_multilingual(
    record: &serde_json::Value,
    key: &str,
    context: &str,
) -> Result<MultilingualText, IndexerError> {
    let object = record
        .get(key)
        .and_then(|value| value.as_object())
        .ok_or_else(|| IndexerError::Data(format!("{context}: missing {key} object")))?;
    let mut text = MultilingualText::new();
    for (language, value) in object {
        let value = value.as_str().ok_or_else(|| {
            IndexerError::Data(format!("{context}: {key}.{language} is not a string"))
        })?;
        text.insert(language, value);
    }
    Ok(text)
}

/// Reads a required array of strings off an upstream record.
pub(crate) fn require_string_array(
    record: &serde_json::Value,
    key: &str,
    context: &str,
) -> Result<Vec<String>, IndexerError> {
    let array = record
        .get(key)
        .and_then(|value| value.as_array())
        .ok_or_else(|| IndexerError::Data(format!("{context}: missing {key} array")))?;
    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| IndexerError::Data(format!("{context}: {key} entry is not a string")))
        })
        .collect()
}

/// Best translation out of a multilingual object on a hit source.
pub(crate) fn translated_field(
    source: &serde_json::Value,
    key: &str,
    language: &str,
    fallback_order: &[String],
) -> Option<String> {
    let object = source.get(key)?.as_object()?;
    let text: MultilingualText = object
        .iter()
        .filter_map(|(lang, value)| Some((lang.clone(), value.as_str()?.to_string())))
        .collect::<std::collections::BTreeMap<_, _>>()
        .into();
    text.best_translation(language, fallback_order)
        .map(str::to_string)
}

pub(crate) fn string_array(source: &serde_json::Value, key: &str) -> Vec<String> {
    source
        .get(key)
        .and_then(|value| value.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_id_accepts_strings_and_numbers() {
        assert_eq!(require_id(&json!({ "id": "117" }), "course").unwrap(), "117");
        assert_eq!(require_id(&json!({ "id": 117 }), "course").unwrap(), "117");
        assert!(require_id(&json!({}), "course").is_err());
    }

    #[test]
    fn require_multilingual_rejects_non_string_translations() {
        let record = json!({ "titles": { "en": 42 } });
        let error = require_multilingual(&record, "titles", "course").unwrap_err();
        assert!(error.to_string().contains("titles.en"));
    }

    #[test]
    fn translated_field_applies_language_fallback() {
        let source = json!({ "title": { "fr": "Physique", "de": "Physik" } });
        let fallbacks = vec!["fr".to_string()];
        assert_eq!(
            translated_field(&source, "title", "en", &fallbacks),
            Some("Physique".to_string())
        );
        assert_eq!(translated_field(&source, "missing", "en", &fallbacks), None);
    }
}
