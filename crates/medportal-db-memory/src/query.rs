//! Evaluation of filter conditions against stored documents.

use medportal_storage::{Condition, Filter, StoredDocument};
use serde_json::Value;

/// Returns `true` if `doc` satisfies every condition in `filter`.
pub fn matches_filter(filter: &Filter, doc: &StoredDocument) -> bool {
    filter
        .conditions()
        .iter()
        .all(|condition| matches_condition(condition, doc))
}

/// Returns `true` if `doc` satisfies `condition`. A missing field never matches.
pub fn matches_condition(condition: &Condition, doc: &StoredDocument) -> bool {
    let Some(actual) = doc.field(condition.field()) else {
        return false;
    };
    match condition {
        Condition::Eq { value, .. } => actual == *value,
        Condition::ArrayContains { value, .. } => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item == value)),
        Condition::In { values, .. } => values.iter().any(|v| *v == actual),
        Condition::TextContains { needle, .. } => match_text_contains(&actual, needle),
        Condition::Range { gte, lt, .. } => match_range(&actual, gte.as_deref(), lt.as_deref()),
    }
}

fn match_text_contains(actual: &Value, needle: &str) -> bool {
    actual
        .as_str()
        .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase()))
}

fn match_range(actual: &Value, gte: Option<&str>, lt: Option<&str>) -> bool {
    let Some(s) = actual.as_str() else {
        return false;
    };
    gte.is_none_or(|lower| s >= lower) && lt.is_none_or(|upper| s < upper)
}
