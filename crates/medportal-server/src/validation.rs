//! Request field checks shared by the services.
//!
//! Checks collect every violation before the request is rejected.

use std::sync::LazyLock;

use medportal_api::{ApiError, ValidationIssue};
use regex::Regex;

use crate::form::RequestForm;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("Invalid email regex")
});

/// Violations collected while checking one request body.
#[derive(Debug, Default)]
pub struct Issues(Vec<ValidationIssue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, msg: impl Into<String>) {
        self.0.push(ValidationIssue::body(path, msg));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        ApiError::check(self.0)
    }

    /// A non-empty string field, trimmed. Records `msg` otherwise.
    pub fn required_text(&mut self, form: &RequestForm, name: &str, msg: &str) -> Option<String> {
        match form.text(name).map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                self.push(name, msg);
                None
            }
        }
    }

    /// An optional string field, trimmed. A present non-string value is a violation.
    pub fn optional_text(&mut self, form: &RequestForm, name: &str) -> Option<String> {
        match form.value(name) {
            None => None,
            Some(v) => match v.as_str() {
                Some(s) => Some(s.trim().to_string()),
                None => {
                    self.push(name, format!("{name} must be a string"));
                    None
                }
            },
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Replaces HTML-significant characters with entities.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim then escape.
pub fn sanitize(input: &str) -> String {
    escape_html(input.trim())
}

pub fn char_len_between(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emails() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn escaping() {
        assert_eq!(
            sanitize("  <b>Tom & 'Jerry'</b> "),
            "&lt;b&gt;Tom &amp; &#x27;Jerry&#x27;&lt;&#x2F;b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn collects_every_violation() {
        let form = RequestForm::from_json(json!({"time": "  ", "note": 5, "doctorId": "d1"})).unwrap();
        let mut issues = Issues::new();
        assert_eq!(issues.required_text(&form, "time", "Time is required"), None);
        assert_eq!(issues.required_text(&form, "date", "Invalid or missing date"), None);
        assert_eq!(
            issues.required_text(&form, "doctorId", "Doctor ID is required"),
            Some("d1".into())
        );
        assert_eq!(issues.optional_text(&form, "note"), None);
        let err = issues.finish().unwrap_err();
        let body = err.to_body();
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
        assert_eq!(body["errors"][0]["msg"], "Time is required");
    }

    #[test]
    fn lengths_count_chars() {
        assert!(char_len_between("héllo", 5, 5));
        assert!(!char_len_between("hi", 3, 100));
    }
}
