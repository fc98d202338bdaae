//! Shared search query models and helpers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// A two-ended datetime range with optional open ends.
///
/// A `None` bound is carried all the way into the engine query as an
/// explicit `null` bound rather than being omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}


/// The normalized, validated parameter set for one search request.
///
/// Built once from the raw query string at the HTTP boundary and immutable
/// afterwards. Selected values are keyed by filter name; map ordering is
/// irrelevant to the generated query, which follows filter declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    /// Free-text query, already checked for the minimum length.
    pub query: Option<String>,
    /// Requested page size; `None` falls back to the configured default.
    pub limit: Option<u64>,
    pub offset: u64,
    /// Preferred language for human-readable names, e.g. `en`.
    pub language: Option<String>,
    /// Selected discrete values per filter, e.g. `organizations -> ["13", "15"]`.
    pub terms: BTreeMap<String, Vec<String>>,
    /// Selected datetime ranges per range filter, e.g. `start_date`.
    pub ranges: BTreeMap<String, DateRange>,
    /// `<filter>_include` regex overrides for facet value matching.
    pub includes: BTreeMap<String, String>,
}

impl SearchQuery {
    /// Selected values for one filter; empty slice when the filter is inactive.
    pub fn terms_for(&self, filter_name: &str) -> &[String] {
        self.terms.get(filter_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn range_for(&self, filter_name: &str) -> Option<&DateRange> {
        self.ranges.get(filter_name)
    }

    pub fn include_for(&self, filter_name: &str) -> Option<&str> {
        self.includes.get(filter_name).map(String::as_str)
    }
}
