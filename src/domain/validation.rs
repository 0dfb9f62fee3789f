//! Required-field and value validation for entity records

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// A field whose value was present but unacceptable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

/// Every problem found with a record
///
/// Validation never stops at the first problem: callers get the full list of
/// missing and invalid fields at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub missing: Vec<String>,
    pub invalid: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Single invalid-field error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            missing: Vec::new(),
            invalid: vec![FieldIssue {
                field: field.into(),
                reason: reason.into(),
            }],
        }
    }

    /// Prefix every field name, e.g. for nested line items
    pub fn nested(mut self, prefix: &str) -> Self {
        for field in &mut self.missing {
            *field = format!("{}.{}", prefix, field);
        }
        for issue in &mut self.invalid {
            issue.field = format!("{}.{}", prefix, issue.field);
        }
        self
    }

    fn merge(&mut self, other: ValidationError) {
        self.missing.extend(other.missing);
        self.invalid.extend(other.invalid);
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            let issues: Vec<String> = self
                .invalid
                .iter()
                .map(|i| format!("{} ({})", i.field, i.reason))
                .collect();
            parts.push(format!("invalid fields: {}", issues.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Records that can check themselves before being stored
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Accumulates validation problems
#[derive(Debug, Default)]
pub struct Validator {
    error: ValidationError,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank strings count as missing
    pub fn require(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.error.missing.push(field.to_string());
        }
        self
    }

    pub fn require_some<T>(mut self, field: &str, value: &Option<T>) -> Self {
        if value.is_none() {
            self.error.missing.push(field.to_string());
        }
        self
    }

    /// Record `reason` against `field` unless `ok`
    pub fn check(mut self, ok: bool, field: &str, reason: impl Into<String>) -> Self {
        if !ok {
            self.error.invalid.push(FieldIssue {
                field: field.to_string(),
                reason: reason.into(),
            });
        }
        self
    }

    /// Email format check, skipped when the value is blank
    pub fn email(self, field: &str, value: &str) -> Self {
        let ok = value.trim().is_empty() || is_valid_email(value);
        self.check(ok, field, "not a valid email address")
    }

    /// Fold in the result of a nested record's validation
    pub fn nested(mut self, prefix: &str, result: Result<(), ValidationError>) -> Self {
        if let Err(e) = result {
            self.error.merge(e.nested(prefix));
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.error.is_empty() {
            Ok(())
        } else {
            Err(self.error)
        }
    }
}

/// `local@domain.tld` with no whitespace and a single `@`
pub fn is_valid_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_strings_are_missing() {
        let err = Validator::new()
            .require("name", "   ")
            .require("email", "a@b.co")
            .require_some::<i32>("date", &None)
            .finish()
            .unwrap_err();

        assert_eq!(err.missing, vec!["name", "date"]);
        assert!(err.invalid.is_empty());
    }

    #[test]
    fn test_collects_all_problems() {
        let err = Validator::new()
            .require("name", "")
            .check(false, "quantity", "must not be negative")
            .email("email", "nope")
            .finish()
            .unwrap_err();

        assert_eq!(err.missing.len(), 1);
        assert_eq!(err.invalid.len(), 2);
        assert_eq!(
            err.to_string(),
            "missing required fields: name; invalid fields: quantity (must not be negative), email (not a valid email address)"
        );
    }

    #[test]
    fn test_nested_prefixes_fields() {
        let inner = Validator::new().require("description", "").finish();
        let err = Validator::new().nested("items[0]", inner).finish().unwrap_err();
        assert_eq!(err.missing, vec!["items[0].description"]);
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("owner@acme.com"));
        assert!(!is_valid_email("owner@acme"));
        assert!(!is_valid_email("@acme.com"));
        assert!(!is_valid_email("owner@@acme.com"));
        assert!(Validator::new().email("email", "").finish().is_ok());
    }
}
