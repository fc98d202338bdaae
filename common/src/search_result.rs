use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMeta {
    /// Number of objects in this page.
    pub count: u64,
    pub offset: u64,
    /// Total matches for the query across all pages.
    pub total_count: u64,
}


/// Response shape for the course list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSearchResponse {
    pub meta: SearchMeta,
    pub objects: Vec<CourseSearchItem>,
    /// Facet counts per filter: `{filter_name: {bucket_key: count}}`.
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSearchItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_url: Option<String>,
    pub categories: Vec<String>,
    pub organizations: Vec<String>,
    pub languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Lifecycle state computed engine-side, drives default ordering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CourseState>,
}

/// Course lifecycle state: lower priority sorts first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseState {
    pub priority: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexableSearchResponse {
    pub meta: SearchMeta,
    pub objects: Vec<IndexableSearchItem>,
}

/// A formatted organization, category or person record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexableSearchItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}


/// Response shape for the filter-definitions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinitionsResponse {
    pub filters: BTreeMap<String, FilterPresentation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPresentation {
    pub human_name: String,
    pub position: usize,
    pub is_drilldown: bool,
    pub is_searchable: bool,
    pub is_autocompletable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    pub has_more_values: bool,
    pub values: Vec<FacetValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub key: String,
    pub human_name: String,
    pub count: u64,
}


/// Body of every 4xx validation failure: one message list per offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: BTreeMap<String, Vec<String>>,
}
