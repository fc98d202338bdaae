//! Hierarchical taxonomy filter with a cached base path.

use std::sync::RwLock;

use crate::indexer::content_api::ContentApiClient;


/// A taxonomy filter (subjects, levels) over materialized node paths.
///
/// The subtree it covers is anchored at a page looked up by reverse
/// identifier. Resolution happens lazily on first use and the result is
/// cached for the process lifetime; concurrent first resolutions are
/// harmless since the lookup is a pure read. An unresolvable base means
/// the filter stays inactive for the current request and resolution is
/// retried on the next one.
#[derive(Debug)]
pub struct TreeFilter {
    /// Document field holding the node paths, e.g. `categories_paths`.
    pub field: &'static str,
    /// Reverse identifier of the page anchoring the subtree.
    pub reverse_id: &'static str,
    /// Index holding the taxonomy node titles.
    pub names_index: &'static str,
    base_path: RwLock<Option<String>>,
}

/// Length of one path step in the materialized path encoding.
const PATH_STEP_LEN: usize = 4;

impl TreeFilter {
    pub fn new(field: &'static str, reverse_id: &'static str, names_index: &'static str) -> Self {
        Self {
            field,
            reverse_id,
            names_index,
            base_path: RwLock::new(None),
        }
    }

    pub fn base_path(&self) -> Option<String> {
        self.base_path.read().map(|guard| guard.clone()).unwrap_or(None)
    }

    /// Resolves and caches the base path. Never fails the caller: lookup
    /// errors are logged and leave the filter unresolved.
    pub async fn ensure_base_path(&self, api: &ContentApiClient) {
        if self.base_path().is_some() {
            return;
        }
        match api.page_path(self.reverse_id).await {
            Ok(Some(path)) => {
                if let Ok(mut guard) = self.base_path.write() {
                    *guard = Some(path);
                }
            }
            Ok(None) => {
                tracing::warn!("no page found for reverse id {:?}", self.reverse_id);
            }
            Err(error) => {
                tracing::warn!("base path lookup failed for {:?}: {error:#}", self.reverse_id);
            }
        }
    }

    /// Test hook: seed the cache without a content API round trip.
    pub fn set_base_path(&self, path: &str) {
        if let Ok(mut guard) = self.base_path.write() {
            *guard = Some(path.to_string());
        }
    }

    /// Test isolation hook: drop the cached resolution.
    pub fn reset_base_path(&self) {
        if let Ok(mut guard) = self.base_path.write() {
            *guard = None;
        }
    }

    /// Default facet window: the direct children of the base node.
    pub fn children_include_regex(&self) -> Option<String> {
        let base_path = self.base_path()?;
        Some(format!("{base_path}[0-9]{{{PATH_STEP_LEN}}}"))
    }
}
