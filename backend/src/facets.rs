//! Reshapes raw aggregation buckets into API-facing facet values.

use std::collections::{BTreeMap, BTreeSet};

use common::search_query::SearchQuery;

use crate::config::Config;
use crate::filters::{FilterKind, FilterRegistry};
use crate::query_builder::effective_facet_limit;


/// One filter's shaped facet: ordered `(key, count)` values plus a flag
/// telling the client the list may be truncated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FacetResult {
    pub values: Vec<(String, u64)>,
    pub has_more_values: bool,
}


/// Shapes the engine's aggregation tree into per-filter facet results.
///
/// Values are sorted by descending count (key as tie-breaker), truncated to
/// the filter's display budget, and currently selected values that fell
/// outside the cut are appended with their true counts, read from the terms
/// buckets or, when the value ranked below the engine's over-fetch window,
/// from its dedicated `<filter>@<value>` aggregation. `has_more_values`
/// compares against the pre-truncation bucket set, so values forced back in
/// never produce a false positive.
pub fn shape(
    raw_aggregations: Option<&serde_json::Value>,
    registry: &FilterRegistry,
    params: &SearchQuery,
    config: &Config,
) -> BTreeMap<String, FacetResult> {
    let empty = serde_json::json!({});
    let scope = raw_aggregations
        .and_then(|aggs| aggs.get("all_courses"))
        .unwrap_or(&empty);

    let mut results = BTreeMap::new();
    for (filter, _nested_path) in registry.faceted() {
        let name = filter.meta.name;
        let result = match &filter.kind {
            FilterKind::Terms { .. } | FilterKind::Tree(_) => {
                let buckets = scope
                    .get(name)
                    .and_then(|agg| agg.get(name))
                    .and_then(|agg| agg.get("buckets"))
                    .and_then(|buckets| buckets.as_array());
                let selected_counts: BTreeMap<String, u64> = params
                    .terms_for(name)
                    .iter()
                    .filter_map(|value| {
                        let count = scope
                            .get(format!("{name}@{value}"))
                            .and_then(|agg| agg.get("doc_count"))
                            .and_then(|count| count.as_u64())?;
                        Some((value.clone(), count))
                    })
                    .collect();
                match buckets {
                    Some(buckets) => shape_term_buckets(
                        buckets,
                        params.terms_for(name),
                        &selected_counts,
                        effective_facet_limit(filter, params, config),
                    ),
                    // Missing aggregation, e.g. a tree filter with an
                    // unresolved base: empty facet, not an error.
                    None => FacetResult::default(),
                }
            }
            FilterKind::Choices { vocabulary, .. } => {
                shape_choice_counts(scope, name, vocabulary, filter.meta.min_doc_count, params)
            }
            _ => continue,
        };
        results.insert(name.to_string(), result);
    }
    results
}

fn shape_term_buckets(
    raw_buckets: &[serde_json::Value],
    active_values: &[String],
    selected_counts: &BTreeMap<String, u64>,
    limit: usize,
) -> FacetResult {
    let mut buckets: Vec<(String, u64)> = raw_buckets
        .iter()
        .filter_map(|bucket| {
            let key = match bucket.get("key")? {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let count = bucket.get("doc_count")?.as_u64()?;
            Some((key, count))
        })
        .collect();
    buckets.sort_by(|(key_a, count_a), (key_b, count_b)| {
        count_b.cmp(count_a).then_with(|| key_a.cmp(key_b))
    });

    let mut values: Vec<(String, u64)> = buckets.iter().take(limit).cloned().collect();
    let mut displayed: BTreeSet<String> = values.iter().map(|(key, _)| key.clone()).collect();

    // Selected values always appear, keeping their true engine counts. A
    // value absent from the over-fetched buckets falls back to its
    // dedicated per-value aggregation.
    for active in active_values {
        if displayed.contains(active) {
            continue;
        }
        let count = buckets
            .iter()
            .find(|(key, _)| key == active)
            .map(|(_, count)| *count)
            .or_else(|| selected_counts.get(active).copied())
            .unwrap_or(0);
        values.push((active.clone(), count));
        displayed.insert(active.clone());
    }

    // Computed from the pre-truncation bucket set: forced values do not
    // mask genuinely hidden ones.
    let has_more_values = buckets.iter().any(|(key, _)| !displayed.contains(key));

    FacetResult {
        values,
        has_more_values,
    }
}

fn shape_choice_counts(
    scope: &serde_json::Value,
    name: &str,
    vocabulary: &[(&str, &str)],
    min_doc_count: u64,
    params: &SearchQuery,
) -> FacetResult {
    let active_values = params.terms_for(name);
    let mut values: Vec<(String, u64)> = vocabulary
        .iter()
        .filter_map(|(code, _)| {
            let count = scope
                .get(format!("{name}@{code}"))
                .and_then(|agg| agg.get("doc_count"))
                .and_then(|count| count.as_u64())?;
            if count < min_doc_count && !active_values.iter().any(|value| value == code) {
                return None;
            }
            Some((code.to_string(), count))
        })
        .collect();
    values.sort_by(|(key_a, count_a), (key_b, count_b)| {
        count_b.cmp(count_a).then_with(|| key_a.cmp(key_b))
    });
    // The whole vocabulary is always surfaced: nothing to truncate.
    FacetResult {
        values,
        has_more_values: false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket_fixture(counts: &[(&str, u64)]) -> Vec<serde_json::Value> {
        counts
            .iter()
            .map(|(key, count)| json!({ "key": key, "doc_count": count }))
            .collect()
    }

    #[test]
    fn buckets_are_sorted_by_descending_count() {
        let buckets = bucket_fixture(&[("a", 3), ("b", 21), ("c", 13)]);
        let result = shape_term_buckets(&buckets, &[], &BTreeMap::new(), 10);
        assert_eq!(
            result.values,
            vec![
                ("b".to_string(), 21),
                ("c".to_string(), 13),
                ("a".to_string(), 3)
            ]
        );
        assert!(!result.has_more_values);
    }

    #[test]
    fn eleven_values_with_limit_five_truncate_and_flag_more() {
        let counts: Vec<(String, u64)> = (0..11).map(|i| (format!("org-{i:02}"), 100 - i)).collect();
        let buckets: Vec<serde_json::Value> = counts
            .iter()
            .map(|(key, count)| json!({ "key": key, "doc_count": count }))
            .collect();
        let result = shape_term_buckets(&buckets, &[], &BTreeMap::new(), 5);
        assert_eq!(result.values.len(), 5);
        assert!(result.has_more_values);
    }

    #[test]
    fn eleven_values_with_limit_eleven_show_everything() {
        let counts: Vec<(String, u64)> = (0..11).map(|i| (format!("org-{i:02}"), 100 - i)).collect();
        let buckets: Vec<serde_json::Value> = counts
            .iter()
            .map(|(key, count)| json!({ "key": key, "doc_count": count }))
            .collect();
        let result = shape_term_buckets(&buckets, &[], &BTreeMap::new(), 11);
        assert_eq!(result.values.len(), 11);
        assert!(!result.has_more_values);
    }

    #[test]
    fn active_value_outside_the_cut_is_appended_with_its_true_count() {
        let buckets = bucket_fixture(&[("a", 50), ("b", 40), ("c", 30), ("d", 2)]);
        let active = vec!["d".to_string()];
        let result = shape_term_buckets(&buckets, &active, &BTreeMap::new(), 2);
        assert_eq!(
            result.values,
            vec![
                ("a".to_string(), 50),
                ("b".to_string(), 40),
                ("d".to_string(), 2)
            ]
        );
        // "c" exists but is not surfaced
        assert!(result.has_more_values);
    }

    #[test]
    fn active_value_below_the_window_reads_its_dedicated_aggregation() {
        let buckets = bucket_fixture(&[("a", 5)]);
        let active = vec!["org-low".to_string()];
        let counts = BTreeMap::from([("org-low".to_string(), 2)]);
        let result = shape_term_buckets(&buckets, &active, &counts, 10);
        assert_eq!(
            result.values,
            vec![("a".to_string(), 5), ("org-low".to_string(), 2)]
        );
        assert!(!result.has_more_values);
    }

    #[test]
    fn active_value_matching_nothing_gets_count_zero() {
        // No bucket and a dedicated aggregation reporting zero matches.
        let buckets = bucket_fixture(&[("a", 5)]);
        let active = vec!["ghost".to_string()];
        let counts = BTreeMap::from([("ghost".to_string(), 0)]);
        let result = shape_term_buckets(&buckets, &active, &counts, 10);
        assert_eq!(
            result.values,
            vec![("a".to_string(), 5), ("ghost".to_string(), 0)]
        );
        assert!(!result.has_more_values);
    }

    #[test]
    fn forced_values_do_not_hide_truncation() {
        // Three buckets, limit 1, the active value is the one below the cut:
        // displaying it does not change the fact that "b" stays hidden.
        let buckets = bucket_fixture(&[("a", 9), ("b", 8), ("c", 1)]);
        let active = vec!["c".to_string()];
        let result = shape_term_buckets(&buckets, &active, &BTreeMap::new(), 1);
        assert_eq!(
            result.values,
            vec![("a".to_string(), 9), ("c".to_string(), 1)]
        );
        assert!(result.has_more_values);
    }

    #[test]
    fn numeric_bucket_keys_are_stringified() {
        let buckets = vec![json!({ "key": 13, "doc_count": 4 })];
        let result = shape_term_buckets(&buckets, &[], &BTreeMap::new(), 10);
        assert_eq!(result.values, vec![("13".to_string(), 4)]);
    }

    #[test]
    fn shape_reads_the_global_scope_and_choice_aggregations() {
        let registry = FilterRegistry::from_config(&Config::default());
        let params = SearchQuery::default();
        let raw = json!({
            "all_courses": {
                "doc_count": 100,
                "organizations": {
                    "doc_count": 100,
                    "organizations": { "buckets": [
                        { "key": "13", "doc_count": 21 },
                        { "key": "15", "doc_count": 13 },
                    ] }
                },
                "languages@en": { "doc_count": 7 },
                "languages@fr": { "doc_count": 9 },
            }
        });
        let shaped = shape(Some(&raw), &registry, &params, &Config::default());

        assert_eq!(
            shaped["organizations"].values,
            vec![("13".to_string(), 21), ("15".to_string(), 13)]
        );
        let languages = &shaped["languages"];
        assert_eq!(languages.values[0], ("fr".to_string(), 9));
        assert_eq!(languages.values[1], ("en".to_string(), 7));
        assert!(!languages.has_more_values);
    }

    #[test]
    fn selected_value_outside_the_engine_window_keeps_its_true_count() {
        let registry = FilterRegistry::from_config(&Config::default());
        let mut params = SearchQuery::default();
        params
            .terms
            .insert("organizations".to_string(), vec!["org-low".to_string()]);
        // The over-fetched window is full of higher-ranked values; the
        // selected value only appears through its dedicated aggregation.
        let window: Vec<serde_json::Value> = (0..12)
            .map(|i| json!({ "key": format!("org-{i:02}"), "doc_count": 100 - i }))
            .collect();
        let raw = json!({
            "all_courses": {
                "organizations": {
                    "organizations": { "buckets": window }
                },
                "organizations@org-low": { "doc_count": 2 },
            }
        });
        let shaped = shape(Some(&raw), &registry, &params, &Config::default());
        let organizations = &shaped["organizations"];
        assert!(organizations
            .values
            .contains(&("org-low".to_string(), 2)));
        assert!(organizations.has_more_values);
    }

    #[test]
    fn missing_aggregation_yields_an_empty_facet() {
        let registry = FilterRegistry::from_config(&Config::default());
        if let FilterKind::Tree(tree) = &registry.get("subjects").unwrap().kind {
            tree.set_base_path("0002");
        }
        let shaped = shape(None, &registry, &SearchQuery::default(), &Config::default());
        assert_eq!(shaped["subjects"], FacetResult::default());
        assert_eq!(shaped["organizations"], FacetResult::default());
    }
}
