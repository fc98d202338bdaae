//! Query string parsing and validation for the search endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::search_query::{DateRange, SearchQuery};

use crate::errors::SearchError;
use crate::filters::{FilterKind, FilterRegistry};

/// Free-text queries shorter than this are rejected.
const QUERY_MIN_LENGTH: usize = 3;


/// Parses the raw query string into the normalized parameter set.
///
/// Unknown parameters are ignored; every recognized-but-invalid value adds
/// a message under its field name and all of them come back in one
/// [`SearchError::Validation`].
pub fn parse_query_string(
    raw: Option<&str>,
    registry: &FilterRegistry,
) -> Result<SearchQuery, SearchError> {
    let mut params = SearchQuery::default();
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();
        match key.as_str() {
            "query" => {
                if value.trim().chars().count() < QUERY_MIN_LENGTH {
                    field_error(
                        &mut errors,
                        "query",
                        format!("value must be at least {QUERY_MIN_LENGTH} characters long"),
                    );
                } else {
                    params.query = Some(value.trim().to_string());
                }
            }
            "limit" => match value.parse::<u64>() {
                Ok(limit) if limit > 0 => params.limit = Some(limit),
                _ => field_error(&mut errors, "limit", "value must be a positive integer"),
            },
            "offset" => match value.parse::<u64>() {
                Ok(offset) => params.offset = offset,
                Err(_) => {
                    field_error(&mut errors, "offset", "value must be a non-negative integer")
                }
            },
            "lang" => params.language = Some(value),
            _ => parse_filter_param(&key, &value, registry, &mut params, &mut errors),
        }
    }

    if errors.is_empty() {
        Ok(params)
    } else {
        Err(SearchError::Validation(errors))
    }
}

fn parse_filter_param(
    key: &str,
    value: &str,
    registry: &FilterRegistry,
    params: &mut SearchQuery,
    errors: &mut BTreeMap<String, Vec<String>>,
) {
    if let Some(filter_name) = key.strip_suffix("_include") {
        // `_include` overrides only exist for filters that aggregate over
        // bucket keys; other filters silently ignore the parameter.
        let Some(filter) = registry.get(filter_name) else {
            return;
        };
        if !filter.supports_include() {
            return;
        }
        match regex::Regex::new(value) {
            Ok(_) => {
                params.includes.insert(filter_name.to_string(), value.to_string());
            }
            Err(_) => field_error(errors, key, "value must be a valid regular expression"),
        }
        return;
    }

    let Some(filter) = registry.get(key) else {
        return;
    };
    match &filter.kind {
        FilterKind::Terms { .. } | FilterKind::Tree(_) | FilterKind::Choices { .. } => {
            params
                .terms
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        FilterKind::Range { .. } => match parse_date_range(value) {
            Ok(range) => {
                params.ranges.insert(key.to_string(), range);
            }
            Err(message) => field_error(errors, key, message),
        },
        _ => {}
    }
}

/// Parses a JSON-encoded 2-element array of ISO-8601 datetimes or nulls.
fn parse_date_range(value: &str) -> Result<DateRange, String> {
    const EXPECTED: &str = "value must be a JSON array of two ISO-8601 datetimes or nulls";
    let bounds: Vec<Option<String>> =
        serde_json::from_str(value).map_err(|_| EXPECTED.to_string())?;
    if bounds.len() != 2 {
        return Err(EXPECTED.to_string());
    }
    let parse_bound = |bound: &Option<String>| -> Result<Option<DateTime<Utc>>, String> {
        match bound {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|date| Some(date.with_timezone(&Utc)))
                .map_err(|_| format!("{raw:?} is not a valid ISO-8601 datetime")),
        }
    };
    Ok(DateRange {
        start: parse_bound(&bounds[0])?,
        end: parse_bound(&bounds[1])?,
    })
}

fn field_error(
    errors: &mut BTreeMap<String, Vec<String>>,
    field: &str,
    message: impl Into<String>,
) {
    errors.entry(field.to_string()).or_default().push(message.into());
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn registry() -> FilterRegistry {
        FilterRegistry::from_config(&Config::default())
    }

    fn errors_of(raw: &str) -> BTreeMap<String, Vec<String>> {
        match parse_query_string(Some(raw), &registry()) {
            Err(SearchError::Validation(errors)) => errors,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_query_string_parses_to_defaults() {
        let params = parse_query_string(None, &registry()).unwrap();
        assert_eq!(params, SearchQuery::default());
    }

    #[test]
    fn repeated_filter_parameters_accumulate_in_order() {
        let params =
            parse_query_string(Some("organizations=13&organizations=15"), &registry()).unwrap();
        assert_eq!(params.terms_for("organizations"), ["13", "15"]);
    }

    #[test]
    fn non_integer_limit_is_a_field_error() {
        let errors = errors_of("limit=fail");
        assert!(errors.contains_key("limit"));
    }

    #[test]
    fn negative_limit_is_a_field_error() {
        let errors = errors_of("limit=-2");
        assert!(errors.contains_key("limit"));
    }

    #[test]
    fn short_text_query_is_a_field_error() {
        let errors = errors_of("query=ab");
        assert!(errors.contains_key("query"));
        assert!(parse_query_string(Some("query=abc"), &registry()).is_ok());
    }

    #[test]
    fn multiple_invalid_fields_are_reported_together() {
        let errors = errors_of("limit=fail&offset=nope&query=a");
        assert_eq!(errors.len(), 3);
        assert!(errors.contains_key("limit"));
        assert!(errors.contains_key("offset"));
        assert!(errors.contains_key("query"));
    }

    #[test]
    fn date_range_with_null_bound_parses() {
        let raw = "start_date=%5B%222024-01-01T00%3A00%3A00Z%22%2C%20null%5D";
        let params = parse_query_string(Some(raw), &registry()).unwrap();
        let range = params.range_for("start_date").unwrap();
        assert_eq!(range.start.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(range.end.is_none());
    }

    #[test]
    fn malformed_date_range_is_a_field_error() {
        let errors = errors_of("start_date=not-json");
        assert!(errors.contains_key("start_date"));
        let errors = errors_of("start_date=%5B%22soon%22%2C%20null%5D");
        assert!(errors.contains_key("start_date"));
    }

    #[test]
    fn include_override_requires_a_valid_regex() {
        let params = parse_query_string(Some("organizations_include=.%2A-university"), &registry())
            .unwrap();
        assert_eq!(params.include_for("organizations"), Some(".*-university"));

        let errors = errors_of("organizations_include=%5Bunclosed");
        assert!(errors.contains_key("organizations_include"));
    }

    #[test]
    fn include_override_is_ignored_for_manual_aggregation_filters() {
        let params = parse_query_string(Some("languages_include=en.%2A"), &registry()).unwrap();
        assert!(params.include_for("languages").is_none());
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let params = parse_query_string(Some("utm_source=newsletter&foo=bar"), &registry()).unwrap();
        assert_eq!(params, SearchQuery::default());
    }
}
