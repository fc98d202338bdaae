//! Builds the engine query and aggregation tree for one request.

use chrono::{DateTime, Utc};
use common::search_query::SearchQuery;
use serde_json::json;

use crate::config::Config;
use crate::filters::{FilterDefinition, FilterKind, FilterRegistry};
use crate::indexer::courses::STATE_SCRIPT;


/// Everything needed to issue one course search against the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub limit: u64,
    pub offset: u64,
    pub query: serde_json::Value,
    pub aggregations: serde_json::Value,
    pub sort: serde_json::Value,
    pub script_fields: serde_json::Value,
}

impl BuiltQuery {
    pub fn body(&self) -> serde_json::Value {
        json!({
            "query": self.query,
            "aggregations": self.aggregations,
            "from": self.offset,
            "size": self.limit,
            "sort": self.sort,
            "script_fields": self.script_fields,
        })
    }
}


/// Builds query, aggregations and pagination from validated parameters.
///
/// The caller passes `now` so identical inputs produce byte-identical
/// output; the timestamp feeds the lifecycle state script.
pub fn build(
    registry: &FilterRegistry,
    config: &Config,
    params: &SearchQuery,
    now: DateTime<Utc>,
) -> BuiltQuery {
    let clauses = registry.active_clauses(params, None);
    let query = if clauses.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "must": clauses } })
    };

    let mut facet_aggs = serde_json::Map::new();
    for (filter, nested_path) in registry.faceted() {
        let name = filter.meta.name;
        let other_clauses = registry.active_clauses(params, Some(name));
        match &filter.kind {
            FilterKind::Terms { field, .. } => {
                let field = *field;
                facet_aggs.insert(
                    name.to_string(),
                    terms_aggregation(filter, field, None, &other_clauses, params, config),
                );
                selected_value_aggregations(
                    &mut facet_aggs,
                    name,
                    params.terms_for(name),
                    &other_clauses,
                    nested_path,
                    |value| json!({ "term": { field: value } }),
                );
            }
            FilterKind::Tree(tree) => {
                // Unresolved base: no facet at all, never an error.
                let Some(default_include) = tree.children_include_regex() else {
                    continue;
                };
                facet_aggs.insert(
                    name.to_string(),
                    terms_aggregation(
                        filter,
                        tree.field,
                        Some(default_include),
                        &other_clauses,
                        params,
                        config,
                    ),
                );
                if let Some(base_path) = tree.base_path() {
                    let selected: Vec<String> = params
                        .terms_for(name)
                        .iter()
                        .filter(|value| value.starts_with(&base_path))
                        .cloned()
                        .collect();
                    selected_value_aggregations(
                        &mut facet_aggs,
                        name,
                        &selected,
                        &other_clauses,
                        nested_path,
                        |value| json!({ "prefix": { tree.field: value } }),
                    );
                }
            }
            FilterKind::Choices { field, vocabulary } => {
                // Manual aggregation: one filter per choice. All-but-self
                // context plus the choice's own condition.
                let field = *field;
                for (code, _) in vocabulary.iter() {
                    let choice_clause = match nested_path {
                        Some(path) => json!({
                            "nested": { "path": path, "query": { "term": { field: code } } }
                        }),
                        None => json!({ "term": { field: code } }),
                    };
                    let mut must = other_clauses.clone();
                    must.push(choice_clause);
                    facet_aggs.insert(
                        format!("{name}@{code}"),
                        json!({ "filter": { "bool": { "must": must } } }),
                    );
                }
            }
            _ => {}
        }
    }

    // Facet counts live under a global aggregation so the top-level hit
    // filtering never caps them; each facet carries its own filter context.
    let aggregations = json!({
        "all_courses": {
            "global": {},
            "aggregations": serde_json::Value::Object(facet_aggs),
        }
    });

    let state_script = json!({
        "lang": "painless",
        "source": STATE_SCRIPT,
        "params": { "now": now.timestamp_millis() },
    });
    let sort = if params.query.is_some() {
        json!([{ "_score": "desc" }])
    } else {
        json!([{
            "_script": {
                "type": "number",
                "script": state_script,
                "order": "asc",
            }
        }])
    };
    let script_fields = json!({ "state": { "script": state_script } });

    BuiltQuery {
        limit: params.limit.unwrap_or(config.default_page_size),
        offset: params.offset,
        query,
        aggregations,
        sort,
        script_fields,
    }
}

/// Facet value budget for one filter: the display limit raised to the hard
/// ceiling when an `_include` override is in play.
pub fn effective_facet_limit(
    filter: &FilterDefinition,
    params: &SearchQuery,
    config: &Config,
) -> usize {
    let limit = if filter.supports_include() && params.include_for(filter.meta.name).is_some() {
        config.facet_counts_max_limit
    } else {
        config.facet_counts_default_limit
    };
    limit.min(config.facet_counts_max_limit)
}

fn terms_aggregation(
    filter: &FilterDefinition,
    field: &str,
    default_include: Option<String>,
    other_clauses: &[serde_json::Value],
    params: &SearchQuery,
    config: &Config,
) -> serde_json::Value {
    let name = filter.meta.name;
    let forced = params.terms_for(name).len();
    // Over-fetch one bucket past the display budget so the shaper can tell
    // whether more distinct values exist than it surfaces.
    let size = effective_facet_limit(filter, params, config) + forced + 1;
    let mut terms = serde_json::Map::new();
    terms.insert("field".to_string(), json!(field));
    terms.insert("min_doc_count".to_string(), json!(filter.meta.min_doc_count));
    terms.insert("size".to_string(), json!(size));
    let include = params
        .include_for(name)
        .map(str::to_string)
        .or(default_include);
    if let Some(include) = include {
        terms.insert("include".to_string(), json!(include));
    }
    json!({
        "filter": { "bool": { "must": other_clauses } },
        "aggregations": { name: { "terms": terms } },
    })
}

/// One dedicated filter aggregation per selected value, named
/// `<filter>@<value>`. A selected value ranked below the terms over-fetch
/// window never shows up in the buckets; its count comes from here instead.
fn selected_value_aggregations(
    facet_aggs: &mut serde_json::Map<String, serde_json::Value>,
    name: &str,
    values: &[String],
    other_clauses: &[serde_json::Value],
    nested_path: Option<&str>,
    value_clause: impl Fn(&str) -> serde_json::Value,
) {
    for value in values {
        let clause = value_clause(value);
        let clause = match nested_path {
            Some(path) => json!({ "nested": { "path": path, "query": clause } }),
            None => clause,
        };
        let mut must = other_clauses.to_vec();
        must.push(clause);
        facet_aggs.insert(
            format!("{name}@{value}"),
            json!({ "filter": { "bool": { "must": must } } }),
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn registry() -> FilterRegistry {
        FilterRegistry::from_config(&Config::default())
    }

    #[test]
    fn empty_params_produce_match_all() {
        let built = build(&registry(), &Config::default(), &SearchQuery::default(), fixed_now());
        assert_eq!(built.query, json!({ "match_all": {} }));
        assert_eq!(built.limit, 20);
        assert_eq!(built.offset, 0);
    }

    #[test]
    fn selected_organizations_shape_query_and_facet_contexts() {
        let mut params = SearchQuery::default();
        params.terms.insert(
            "organizations".to_string(),
            vec!["13".to_string(), "15".to_string()],
        );
        params.limit = Some(2);
        let built = build(&registry(), &Config::default(), &params, fixed_now());

        assert_eq!(built.limit, 2);
        assert_eq!(built.offset, 0);
        assert_eq!(
            built.query,
            json!({ "bool": { "must": [{ "terms": { "organizations": ["13", "15"] } }] } })
        );

        // An unrelated facet is computed under the active clause.
        let persons = &built.aggregations["all_courses"]["aggregations"]["persons"];
        assert_eq!(
            persons["filter"],
            json!({ "bool": { "must": [{ "terms": { "organizations": ["13", "15"] } }] } })
        );

        // The filter's own facet excludes its own clause.
        let organizations = &built.aggregations["all_courses"]["aggregations"]["organizations"];
        assert_eq!(organizations["filter"], json!({ "bool": { "must": [] } }));
    }

    #[test]
    fn facets_live_under_a_global_aggregation() {
        let built = build(&registry(), &Config::default(), &SearchQuery::default(), fixed_now());
        assert_eq!(built.aggregations["all_courses"]["global"], json!({}));
    }

    #[test]
    fn terms_aggregation_over_fetches_past_the_display_limit() {
        let mut params = SearchQuery::default();
        params.terms.insert(
            "organizations".to_string(),
            vec!["13".to_string(), "15".to_string()],
        );
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        let terms =
            &built.aggregations["all_courses"]["aggregations"]["organizations"]["aggregations"]
                ["organizations"]["terms"];
        // default limit 10 + 2 forced + 1 over-fetch
        assert_eq!(terms["size"], json!(13));
        assert_eq!(terms["field"], json!("organizations"));
        assert_eq!(terms["min_doc_count"], json!(0));
    }

    #[test]
    fn selected_terms_values_get_dedicated_count_aggregations() {
        let mut params = SearchQuery::default();
        params.terms.insert(
            "organizations".to_string(),
            vec!["13".to_string(), "org-low".to_string()],
        );
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        let aggs = &built.aggregations["all_courses"]["aggregations"];
        // All-but-self context (empty here) plus the value's own condition.
        assert_eq!(
            aggs["organizations@13"],
            json!({ "filter": { "bool": { "must": [
                { "term": { "organizations": "13" } }
            ] } } })
        );
        assert_eq!(
            aggs["organizations@org-low"]["filter"]["bool"]["must"][0],
            json!({ "term": { "organizations": "org-low" } })
        );
    }

    #[test]
    fn selected_tree_values_get_dedicated_prefix_aggregations() {
        let registry = registry();
        let FilterKind::Tree(tree) = &registry.get("subjects").unwrap().kind else {
            panic!("subjects must be a tree filter");
        };
        tree.set_base_path("0002");
        let mut params = SearchQuery::default();
        params.terms.insert(
            "subjects".to_string(),
            vec!["00020001".to_string(), "00990001".to_string()],
        );
        let built = build(&registry, &Config::default(), &params, fixed_now());
        let aggs = &built.aggregations["all_courses"]["aggregations"];
        assert_eq!(
            aggs["subjects@00020001"]["filter"]["bool"]["must"][0],
            json!({ "prefix": { "categories_paths": "00020001" } })
        );
        // Values outside the base contribute no aggregation.
        assert!(aggs.get("subjects@00990001").is_none());
    }

    #[test]
    fn include_override_raises_the_limit_and_sets_the_regex() {
        let mut params = SearchQuery::default();
        params
            .includes
            .insert("organizations".to_string(), ".*-university".to_string());
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        let terms =
            &built.aggregations["all_courses"]["aggregations"]["organizations"]["aggregations"]
                ["organizations"]["terms"];
        assert_eq!(terms["include"], json!(".*-university"));
        // max limit 50 + 0 forced + 1
        assert_eq!(terms["size"], json!(51));
    }

    #[test]
    fn tree_facet_is_skipped_until_the_base_resolves() {
        let registry = registry();
        let built = build(&registry, &Config::default(), &SearchQuery::default(), fixed_now());
        assert!(built.aggregations["all_courses"]["aggregations"]
            .get("subjects")
            .is_none());

        let FilterKind::Tree(tree) = &registry.get("subjects").unwrap().kind else {
            panic!("subjects must be a tree filter");
        };
        tree.set_base_path("0002");
        let built = build(&registry, &Config::default(), &SearchQuery::default(), fixed_now());
        let terms = &built.aggregations["all_courses"]["aggregations"]["subjects"]
            ["aggregations"]["subjects"]["terms"];
        assert_eq!(terms["include"], json!("0002[0-9]{4}"));
    }

    #[test]
    fn choices_facet_builds_one_filter_per_language() {
        let mut params = SearchQuery::default();
        params
            .terms
            .insert("organizations".to_string(), vec!["13".to_string()]);
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        let aggs = &built.aggregations["all_courses"]["aggregations"];
        let english = &aggs["languages@en"];
        let must = english["filter"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must[0], json!({ "terms": { "organizations": ["13"] } }));
        assert_eq!(
            must[1],
            json!({ "nested": {
                "path": "course_runs",
                "query": { "term": { "course_runs.languages": "en" } }
            } })
        );
        // no terms sub-aggregation for manual facets
        assert!(english.get("aggregations").is_none());
    }

    #[test]
    fn selecting_a_language_does_not_constrain_its_own_facet() {
        let mut params = SearchQuery::default();
        params
            .terms
            .insert("languages".to_string(), vec!["en".to_string()]);
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        let aggs = &built.aggregations["all_courses"]["aggregations"];
        let french = &aggs["languages@fr"];
        let must = french["filter"]["bool"]["must"].as_array().unwrap();
        // only the per-choice condition remains: the languages clause is excluded
        assert_eq!(must.len(), 1);
        assert!(must[0].get("nested").is_some());
    }

    #[test]
    fn sort_uses_score_with_text_and_state_script_without() {
        let built = build(&registry(), &Config::default(), &SearchQuery::default(), fixed_now());
        assert_eq!(built.sort[0]["_script"]["order"], json!("asc"));
        assert_eq!(built.sort[0]["_script"]["script"]["params"]["now"], json!(1717243200000i64));

        let mut params = SearchQuery::default();
        params.query = Some("physics".to_string());
        let built = build(&registry(), &Config::default(), &params, fixed_now());
        assert_eq!(built.sort, json!([{ "_score": "desc" }]));
    }

    #[test]
    fn build_is_idempotent_for_identical_inputs() {
        let registry = registry();
        let config = Config::default();
        let mut params = SearchQuery::default();
        params.query = Some("physics".to_string());
        params.terms.insert(
            "organizations".to_string(),
            vec!["13".to_string(), "15".to_string()],
        );
        params
            .terms
            .insert("languages".to_string(), vec!["fr".to_string()]);

        let first = build(&registry, &config, &params, fixed_now());
        let second = build(&registry, &config, &params, fixed_now());
        assert_eq!(
            serde_json::to_string(&first.body()).unwrap(),
            serde_json::to_string(&second.body()).unwrap()
        );
    }
}
