//! Course index: document mapping, lifecycle state script, adapters.

use chrono::{DateTime, Utc};
use common::search_result::{CourseSearchItem, CourseState};
use serde_json::json;

use crate::errors::IndexerError;
use super::{require_id, require_multilingual, require_string_array, string_array, translated_field};

pub const COURSES_INDEX: &str = "courses";

/// Painless script ranking a course by the best state among its runs.
/// Lower is better: 0 ongoing & open for enrollment, 1 future & open,
/// 3 future with enrollment not yet open, 4 future closed, 5 ongoing
/// closed, 6 archived, 7 nothing scheduled.
pub const STATE_SCRIPT: &str = r#"
long best = 7;
ZonedDateTime now = ZonedDateTime.ofInstant(Instant.ofEpochMilli(params.now), ZoneOffset.UTC);
for (def run : params._source.course_runs) {
    long priority = 7;
    if (run.start != null) {
        ZonedDateTime start = ZonedDateTime.parse(run.start);
        ZonedDateTime end = run.end == null ? null : ZonedDateTime.parse(run.end);
        ZonedDateTime enrollStart = run.enrollment_start == null ? null : ZonedDateTime.parse(run.enrollment_start);
        ZonedDateTime enrollEnd = run.enrollment_end == null ? null : ZonedDateTime.parse(run.enrollment_end);
        boolean open = enrollStart != null
            && !now.isBefore(enrollStart)
            && (enrollEnd == null || now.isBefore(enrollEnd));
        if (now.isBefore(start)) {
            if (open) { priority = 1; }
            else if (enrollStart != null && now.isBefore(enrollStart)) { priority = 3; }
            else { priority = 4; }
        } else if (end == null || now.isBefore(end)) {
            priority = open ? 0 : 5;
        } else {
            priority = 6;
        }
    }
    if (priority < best) { best = priority; }
}
return best;
"#;

pub fn mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "dynamic_templates": [
                { "multilingual_text": {
                    "path_match": "title.*",
                    "mapping": { "type": "text" }
                } },
                { "multilingual_description": {
                    "path_match": "description.*",
                    "mapping": { "type": "text" }
                } },
            ],
            "properties": {
                "id": { "type": "keyword" },
                "absolute_url": { "type": "object", "enabled": false },
                "cover_image": { "type": "keyword", "index": false },
                "categories": { "type": "keyword" },
                "categories_paths": { "type": "keyword" },
                "organizations": { "type": "keyword" },
                "persons": { "type": "keyword" },
                "course_runs": {
                    "type": "nested",
                    "properties": {
                        "start": { "type": "date" },
                        "end": { "type": "date" },
                        "enrollment_start": { "type": "date" },
                        "enrollment_end": { "type": "date" },
                        "languages": { "type": "keyword" },
                    }
                },
            }
        }
    })
}

/// Builds the denormalized course document from a content API record.
pub fn to_document(record: &serde_json::Value) -> Result<serde_json::Value, IndexerError> {
    let id = require_id(record, "course")?;
    let context = format!("course {id}");
    let title = require_multilingual(record, "titles", &context)?;
    let description = require_multilingual(record, "descriptions", &context)?;
    let absolute_url = require_multilingual(record, "urls", &context)?;
    let organizations = require_string_array(record, "organizations", &context)?;
    let persons = require_string_array(record, "persons", &context)?;

    let raw_categories = record
        .get("categories")
        .and_then(|value| value.as_array())
        .ok_or_else(|| IndexerError::Data(format!("{context}: missing categories array")))?;
    let mut categories = Vec::with_capacity(raw_categories.len());
    let mut categories_paths = Vec::with_capacity(raw_categories.len());
    for category in raw_categories {
        categories.push(require_id(category, &context)?);
        let path = category
            .get("path")
            .and_then(|path| path.as_str())
            .ok_or_else(|| IndexerError::Data(format!("{context}: category without path")))?;
        categories_paths.push(path.to_string());
    }

    let raw_runs = record
        .get("course_runs")
        .and_then(|value| value.as_array())
        .ok_or_else(|| IndexerError::Data(format!("{context}: missing course_runs array")))?;
    let mut course_runs = Vec::with_capacity(raw_runs.len());
    for run in raw_runs {
        let languages = require_string_array(run, "languages", &context)?;
        course_runs.push(json!({
            "start": run.get("start").cloned().unwrap_or(serde_json::Value::Null),
            "end": run.get("end").cloned().unwrap_or(serde_json::Value::Null),
            "enrollment_start": run
                .get("enrollment_start")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            "enrollment_end": run
                .get("enrollment_end")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            "languages": languages,
        }));
    }

    Ok(json!({
        "id": id,
        "title": title,
        "description": description,
        "absolute_url": absolute_url,
        "cover_image": record.get("cover_image").cloned().unwrap_or(serde_json::Value::Null),
        "categories": categories,
        "categories_paths": categories_paths,
        "organizations": organizations,
        "persons": persons,
        "course_runs": course_runs,
    }))
}

/// Formats a course hit for the API, picking the best language per field.
pub fn from_hit(
    id: &str,
    source: &serde_json::Value,
    script_fields: Option<&serde_json::Value>,
    language: &str,
    fallback_order: &[String],
    now: DateTime<Utc>,
) -> CourseSearchItem {
    let mut languages: Vec<String> = Vec::new();
    for run in source
        .get("course_runs")
        .and_then(|runs| runs.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
    {
        for code in string_array(run, "languages") {
            if !languages.contains(&code) {
                languages.push(code);
            }
        }
    }

    let state = script_fields
        .and_then(|fields| fields.get("state"))
        .and_then(|state| state.as_array())
        .and_then(|state| state.first())
        .and_then(|priority| priority.as_u64())
        .map(|priority| CourseState {
            priority,
            date_time: state_date(source, priority, now),
        });

    CourseSearchItem {
        id: id.to_string(),
        title: translated_field(source, "title", language, fallback_order),
        absolute_url: translated_field(source, "absolute_url", language, fallback_order),
        categories: string_array(source, "categories"),
        organizations: string_array(source, "organizations"),
        languages,
        cover_image: source
            .get("cover_image")
            .and_then(|value| value.as_str())
            .map(str::to_string),
        state,
    }
}

/// The date attached to a state: next start for upcoming runs, current
/// run's end while ongoing, nothing for archived or unscheduled courses.
fn state_date(
    source: &serde_json::Value,
    priority: u64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let runs = source.get("course_runs")?.as_array()?;
    let parse = |run: &serde_json::Value, key: &str| -> Option<DateTime<Utc>> {
        run.get(key)?
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|date| date.with_timezone(&Utc))
    };
    match priority {
        1 | 3 | 4 => runs
            .iter()
            .filter_map(|run| parse(run, "start"))
            .filter(|start| *start > now)
            .min(),
        0 | 5 => runs
            .iter()
            .filter_map(|run| parse(run, "end"))
            .filter(|end| *end > now)
            .min(),
        _ => None,
    }
}
