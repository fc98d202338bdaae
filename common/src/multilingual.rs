//! Multilingual text maps with language fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};


/// A `{language_code: text}` map as stored on indexed documents.
///
/// Titles, descriptions and URLs are denormalized per language at indexing
/// time; the API picks one translation back out with [`MultilingualText::best_translation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MultilingualText(pub BTreeMap<String, String>);

impl MultilingualText {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        self.0.insert(language.into(), text.into());
    }

    /// Picks the requester's preferred language first, then walks the
    /// site-wide fallback order. Returns `None` when no translation exists.
    pub fn best_translation(&self, preferred: &str, fallback_order: &[String]) -> Option<&str> {
        if let Some(text) = self.0.get(preferred) {
            return Some(text);
        }
        for language in fallback_order {
            if let Some(text) = self.0.get(language) {
                return Some(text);
            }
        }
        None
    }
}

impl From<BTreeMap<String, String>> for MultilingualText {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MultilingualText {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(language, text)| (language.to_string(), text.to_string()))
                .collect(),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_translation_prefers_requested_language() {
        let text = MultilingualText::from([("en", "Physics"), ("fr", "Physique")]);
        assert_eq!(text.best_translation("fr", &["en".to_string()]), Some("Physique"));
    }

    #[test]
    fn best_translation_walks_fallback_order() {
        let text = MultilingualText::from([("de", "Physik"), ("fr", "Physique")]);
        let fallbacks = vec!["es".to_string(), "fr".to_string(), "de".to_string()];
        assert_eq!(text.best_translation("en", &fallbacks), Some("Physique"));
    }

    #[test]
    fn best_translation_returns_none_when_empty() {
        let text = MultilingualText::new();
        assert_eq!(text.best_translation("en", &["fr".to_string()]), None);
    }
}
