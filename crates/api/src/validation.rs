//! Request body validation.
//!
//! Failures are collected rather than short-circuited so the client gets
//! every problem at once, shaped as
//! `{"formErrors": [...], "fieldErrors": {"field": [...]}}`.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

use digital_distributor_core::Email;

/// Accumulated validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issues {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl Issues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem with one field.
    pub fn field(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    /// Record a problem with the body as a whole.
    pub fn form(&mut self, message: impl Into<String>) {
        self.form_errors.push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }

    /// `Ok` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` if any issue was recorded.
    pub fn finish(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Check a string's length in characters. `max` of `None` means unbounded.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: Option<usize>) {
        let len = value.chars().count();
        if len < min {
            self.field(field, format!("must contain at least {min} character(s)"));
        }
        if let Some(max) = max
            && len > max
        {
            self.field(field, format!("must contain at most {max} character(s)"));
        }
    }

    /// Check that `value` lies in `min..=max`.
    pub fn range<T: PartialOrd + Display>(&mut self, field: &str, value: &T, min: &T, max: &T) {
        if value < min {
            self.field(field, format!("must be greater than or equal to {min}"));
        } else if value > max {
            self.field(field, format!("must be less than or equal to {max}"));
        }
    }

    /// Parse an email, recording a failure.
    pub fn email(&mut self, field: &str, value: &str) -> Option<Email> {
        match Email::parse(value) {
            Ok(email) => Some(email),
            Err(_) => {
                self.field(field, "invalid email");
                None
            }
        }
    }
}

/// A request body with field-level rules.
pub trait Validate {
    /// # Errors
    ///
    /// Returns every rule the value breaks.
    fn validate(&self) -> Result<(), Issues>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_issues_finish_ok() {
        assert!(Issues::new().finish().is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        let mut issues = Issues::new();
        issues.length("username", "юля", 3, Some(50));
        assert!(issues.is_empty());

        issues.length("username", "ab", 3, Some(50));
        issues.length("comment", &"x".repeat(2001), 10, Some(2000));
        let err = issues.finish().unwrap_err();
        assert_eq!(err.field_errors["username"].len(), 1);
        assert_eq!(
            err.field_errors["comment"],
            vec!["must contain at most 2000 character(s)".to_owned()]
        );
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let mut issues = Issues::new();
        issues.range("evaluation", &1, &1, &5);
        issues.range("evaluation", &5, &1, &5);
        assert!(issues.is_empty());

        issues.range("evaluation", &6, &1, &5);
        assert_eq!(
            issues.field_errors["evaluation"],
            vec!["must be less than or equal to 5".to_owned()]
        );
    }

    #[test]
    fn test_email_field() {
        let mut issues = Issues::new();
        assert!(issues.email("email", "bob@example.com").is_some());
        assert!(issues.email("email", "bob").is_none());
        assert_eq!(issues.field_errors["email"], vec!["invalid email".to_owned()]);
    }

    #[test]
    fn test_serialized_shape() {
        let mut issues = Issues::new();
        issues.form("at least one item is required");
        issues.field("password", "must contain at least 6 character(s)");

        let json = serde_json::to_value(&issues).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "formErrors": ["at least one item is required"],
                "fieldErrors": {"password": ["must contain at least 6 character(s)"]}
            })
        );
    }
}
