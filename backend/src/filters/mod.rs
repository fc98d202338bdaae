//! Declarative filter definitions and the ordered filter registry.
//!
//! Every facet the API exposes is one [`FilterDefinition`]: a closed set of
//! kinds that each know how to turn selected request values into a query
//! clause and how to describe their own aggregation. The registry holds
//! them in a stable order; that order is what makes generated queries
//! byte-identical across runs.

mod tree;
mod vocabulary;

pub use tree::TreeFilter;
pub use vocabulary::LANGUAGES;

use common::search_query::SearchQuery;
use serde_json::json;

use crate::config::Config;
use crate::indexer::content_api::ContentApiClient;


pub type Clause = serde_json::Value;


#[derive(Debug, Clone)]
pub struct FilterMeta {
    pub name: &'static str,
    pub human_name: &'static str,
    pub position: usize,
    pub is_drilldown: bool,
    pub is_searchable: bool,
    pub is_autocompletable: bool,
    pub min_doc_count: u64,
}


/// The closed set of filter kinds.
#[derive(Debug)]
pub enum FilterKind {
    /// Flat keyword field with discrete values, e.g. organization IDs.
    Terms {
        field: &'static str,
        /// Index holding the human-readable names for bucket keys.
        names_index: &'static str,
    },
    /// Hierarchical taxonomy keyed by materialized node paths under a
    /// lazily resolved base page.
    Tree(TreeFilter),
    /// Fixed vocabulary with a static display map. Aggregated manually,
    /// one filter aggregation per choice; `_include` overrides do not
    /// apply to this kind.
    Choices {
        field: &'static str,
        vocabulary: &'static [(&'static str, &'static str)],
    },
    /// Two-ended datetime range. Contributes a query clause, no facet.
    Range { field: &'static str },
    /// Free-text match across per-language title/description fields. A
    /// term may match across different language fields.
    Text { fields: &'static [&'static str] },
    /// Groups child filters whose fields live in nested sub-documents.
    /// All active children combine into a single nested query so their
    /// conditions hold on the same sub-document.
    Nested {
        path: &'static str,
        children: Vec<FilterDefinition>,
    },
}


#[derive(Debug)]
pub struct FilterDefinition {
    pub meta: FilterMeta,
    pub kind: FilterKind,
}

/// Where a facet's human-readable names come from.
pub enum NameSource {
    /// Look titles up in a sibling index by key field.
    Index {
        index: &'static str,
        key_field: &'static str,
    },
    /// Static display map.
    Vocabulary(&'static [(&'static str, &'static str)]),
    None,
}

impl FilterDefinition {
    /// Query clause for this filter's selected values, `None` when inactive.
    ///
    /// Only called on leaf kinds; nested groups are assembled by
    /// [`FilterRegistry::active_clauses`].
    fn leaf_clause(&self, params: &SearchQuery) -> Option<Clause> {
        let name = self.meta.name;
        match &self.kind {
            FilterKind::Terms { field, .. } | FilterKind::Choices { field, .. } => {
                let field = *field;
                let values = params.terms_for(name);
                if values.is_empty() {
                    return None;
                }
                Some(json!({ "terms": { field: values } }))
            }
            FilterKind::Tree(tree) => {
                let base_path = tree.base_path()?;
                let prefixes: Vec<Clause> = params
                    .terms_for(name)
                    .iter()
                    .filter(|value| value.starts_with(&base_path))
                    .map(|value| json!({ "prefix": { tree.field: value } }))
                    .collect();
                if prefixes.is_empty() {
                    return None;
                }
                Some(json!({ "bool": { "should": prefixes } }))
            }
            FilterKind::Range { field } => {
                let field = *field;
                let range = params.range_for(name)?;
                // Open ends stay in the clause as explicit nulls.
                Some(json!({ "range": { field: { "gte": range.start, "lte": range.end } } }))
            }
            FilterKind::Text { fields } => {
                let query = params.query.as_deref()?;
                Some(json!({
                    "multi_match": { "fields": fields, "query": query, "type": "cross_fields" }
                }))
            }
            FilterKind::Nested { .. } => None,
        }
    }

    /// Whether a `<filter>_include` regex override applies to this kind.
    /// Manual-aggregation (choices) filters ignore it: their buckets are
    /// one filter aggregation per choice, so there is no key pattern to
    /// match against. Documented limitation, kept asymmetric on purpose.
    pub fn supports_include(&self) -> bool {
        matches!(self.kind, FilterKind::Terms { .. } | FilterKind::Tree(_))
    }

    /// Whether this filter produces facet values at all.
    pub fn is_faceted(&self) -> bool {
        matches!(
            self.kind,
            FilterKind::Terms { .. } | FilterKind::Tree(_) | FilterKind::Choices { .. }
        )
    }

    pub fn name_source(&self) -> NameSource {
        match &self.kind {
            FilterKind::Terms { names_index, .. } => NameSource::Index {
                index: names_index,
                key_field: "id",
            },
            FilterKind::Tree(tree) => NameSource::Index {
                index: tree.names_index,
                key_field: "path",
            },
            FilterKind::Choices { vocabulary, .. } => NameSource::Vocabulary(vocabulary),
            _ => NameSource::None,
        }
    }
}


/// Ordered list of filter definitions for the course index.
///
/// Built once at startup from configuration; declaration order (after
/// position overrides) determines clause order in every generated query.
#[derive(Debug)]
pub struct FilterRegistry {
    pub filters: Vec<FilterDefinition>,
}

impl FilterRegistry {
    /// Builds the registry from the defaults and configuration overrides.
    /// When an overridden position collides with a default one, the
    /// overridden filter takes the earlier slot.
    pub fn from_config(config: &Config) -> Self {
        let mut filters = default_filters();
        apply_overrides(&mut filters, config);
        sort_by_position(&mut filters, config);
        Self { filters }
    }

    /// All active clauses in declaration order, leaving out the one filter
    /// named in `excluded`. Passing `None` yields the full query context;
    /// passing a filter name yields that filter's facet context, so a
    /// facet shows counts for "what if you also selected this value".
    pub fn active_clauses(&self, params: &SearchQuery, excluded: Option<&str>) -> Vec<Clause> {
        let mut clauses = Vec::new();
        for filter in &self.filters {
            match &filter.kind {
                FilterKind::Nested { path, children } => {
                    let inner: Vec<Clause> = children
                        .iter()
                        .filter(|child| Some(child.meta.name) != excluded)
                        .filter_map(|child| child.leaf_clause(params))
                        .collect();
                    if !inner.is_empty() {
                        clauses.push(json!({
                            "nested": { "path": *path, "query": { "bool": { "must": inner } } }
                        }));
                    }
                }
                _ => {
                    if Some(filter.meta.name) == excluded {
                        continue;
                    }
                    if let Some(clause) = filter.leaf_clause(params) {
                        clauses.push(clause);
                    }
                }
            }
        }
        clauses
    }

    /// Faceted filters in declaration order, flattening nested groups.
    /// The second element is the nested path the filter lives under.
    pub fn faceted(&self) -> Vec<(&FilterDefinition, Option<&'static str>)> {
        let mut result = Vec::new();
        for filter in &self.filters {
            match &filter.kind {
                FilterKind::Nested { path, children } => {
                    for child in children {
                        if child.is_faceted() {
                            result.push((child, Some(*path)));
                        }
                    }
                }
                _ if filter.is_faceted() => result.push((filter, None)),
                _ => {}
            }
        }
        result
    }

    /// Looks a filter up by name across top-level filters and nested children.
    pub fn get(&self, name: &str) -> Option<&FilterDefinition> {
        for filter in &self.filters {
            if filter.meta.name == name {
                return Some(filter);
            }
            if let FilterKind::Nested { children, .. } = &filter.kind {
                for child in children {
                    if child.meta.name == name {
                        return Some(child);
                    }
                }
            }
        }
        None
    }

    fn tree_filters(&self) -> Vec<&TreeFilter> {
        let mut trees = Vec::new();
        for filter in &self.filters {
            match &filter.kind {
                FilterKind::Tree(tree) => trees.push(tree),
                FilterKind::Nested { children, .. } => {
                    for child in children {
                        if let FilterKind::Tree(tree) = &child.kind {
                            trees.push(tree);
                        }
                    }
                }
                _ => {}
            }
        }
        trees
    }

    /// Resolves every tree filter's base path against the content API.
    /// Idempotent; unresolved bases are retried on the next request and
    /// never fail the current one.
    pub async fn ensure_base_paths(&self, api: &ContentApiClient) {
        for tree in self.tree_filters() {
            tree.ensure_base_path(api).await;
        }
    }

    /// Clears every cached base path. Test isolation hook.
    pub fn reset_base_paths(&self) {
        for tree in self.tree_filters() {
            tree.reset_base_path();
        }
    }
}


fn default_filters() -> Vec<FilterDefinition> {
    vec![
        FilterDefinition {
            meta: FilterMeta {
                name: "query",
                human_name: "Search",
                position: 0,
                is_drilldown: false,
                is_searchable: false,
                is_autocompletable: false,
                min_doc_count: 0,
            },
            kind: FilterKind::Text {
                fields: &["title.*^50", "description.*"],
            },
        },
        FilterDefinition {
            meta: FilterMeta {
                name: "subjects",
                human_name: "Subjects",
                position: 1,
                is_drilldown: false,
                is_searchable: true,
                is_autocompletable: true,
                min_doc_count: 0,
            },
            kind: FilterKind::Tree(TreeFilter::new("categories_paths", "subjects", "categories")),
        },
        FilterDefinition {
            meta: FilterMeta {
                name: "levels",
                human_name: "Levels",
                position: 2,
                is_drilldown: true,
                is_searchable: false,
                is_autocompletable: false,
                min_doc_count: 0,
            },
            kind: FilterKind::Tree(TreeFilter::new("categories_paths", "levels", "categories")),
        },
        FilterDefinition {
            meta: FilterMeta {
                name: "organizations",
                human_name: "Organizations",
                position: 3,
                is_drilldown: false,
                is_searchable: true,
                is_autocompletable: true,
                min_doc_count: 0,
            },
            kind: FilterKind::Terms {
                field: "organizations",
                names_index: "organizations",
            },
        },
        FilterDefinition {
            meta: FilterMeta {
                name: "persons",
                human_name: "Persons",
                position: 4,
                is_drilldown: false,
                is_searchable: true,
                is_autocompletable: true,
                min_doc_count: 0,
            },
            kind: FilterKind::Terms {
                field: "persons",
                names_index: "persons",
            },
        },
        FilterDefinition {
            meta: FilterMeta {
                name: "course_runs",
                human_name: "Course runs",
                position: 5,
                is_drilldown: false,
                is_searchable: false,
                is_autocompletable: false,
                min_doc_count: 0,
            },
            kind: FilterKind::Nested {
                path: "course_runs",
                children: vec![
                    FilterDefinition {
                        meta: FilterMeta {
                            name: "languages",
                            human_name: "Languages",
                            position: 5,
                            is_drilldown: false,
                            is_searchable: false,
                            is_autocompletable: false,
                            min_doc_count: 0,
                        },
                        kind: FilterKind::Choices {
                            field: "course_runs.languages",
                            vocabulary: LANGUAGES,
                        },
                    },
                    FilterDefinition {
                        meta: FilterMeta {
                            name: "start_date",
                            human_name: "Start date",
                            position: 6,
                            is_drilldown: false,
                            is_searchable: false,
                            is_autocompletable: false,
                            min_doc_count: 0,
                        },
                        kind: FilterKind::Range {
                            field: "course_runs.start",
                        },
                    },
                    FilterDefinition {
                        meta: FilterMeta {
                            name: "end_date",
                            human_name: "End date",
                            position: 7,
                            is_drilldown: false,
                            is_searchable: false,
                            is_autocompletable: false,
                            min_doc_count: 0,
                        },
                        kind: FilterKind::Range {
                            field: "course_runs.end",
                        },
                    },
                ],
            },
        },
    ]
}

fn apply_overrides(filters: &mut Vec<FilterDefinition>, config: &Config) {
    filters.retain(|filter| is_enabled(filter.meta.name, config));
    for filter in filters.iter_mut() {
        if let Some(position) = position_override(filter.meta.name, config) {
            filter.meta.position = position;
        }
        if let FilterKind::Nested { children, .. } = &mut filter.kind {
            children.retain(|child| is_enabled(child.meta.name, config));
            for child in children.iter_mut() {
                if let Some(position) = position_override(child.meta.name, config) {
                    child.meta.position = position;
                }
            }
        }
    }
}

fn sort_by_position(filters: &mut [FilterDefinition], config: &Config) {
    // Overridden positions sort before default ones on ties.
    let key = |name: &str, position: usize| (position, position_override(name, config).is_none());
    filters.sort_by_key(|filter| key(filter.meta.name, filter.meta.position));
    for filter in filters.iter_mut() {
        if let FilterKind::Nested { children, .. } = &mut filter.kind {
            children.sort_by_key(|child| key(child.meta.name, child.meta.position));
        }
    }
}

fn is_enabled(name: &str, config: &Config) -> bool {
    config
        .filter_overrides
        .get(name)
        .and_then(|o| o.enabled)
        .unwrap_or(true)
}

fn position_override(name: &str, config: &Config) -> Option<usize> {
    config.filter_overrides.get(name).and_then(|o| o.position)
}
