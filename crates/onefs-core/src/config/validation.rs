//! Validation accumulator shared by configuration and desired-state checks

use std::fmt;

/// Validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Structural validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value is required but missing
    #[error("Field '{field}' is required but missing")]
    Required { field: String },

    /// Value is out of acceptable range
    #[error("Field '{field}' must be {} (got {actual})", describe_range(.min, .max))]
    OutOfRange {
        field: String,
        min: Option<i64>,
        max: Option<i64>,
        actual: i64,
    },

    /// Value format is invalid
    #[error("Field '{field}' has invalid format. Expected: {expected}, got: {actual}")]
    InvalidFormat {
        field: String,
        expected: String,
        actual: String,
    },

    /// Two fields may not be combined
    #[error("Field '{field}' cannot be used together with '{other}'")]
    Conflict { field: String, other: String },

    /// Custom validation failed
    #[error("Field '{field}': {message}")]
    Custom { field: String, message: String },

    /// Several checks failed
    #[error("{}", join_errors(.0))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    pub fn custom(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Custom {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Individual failures, flattening [`ValidationError::Multiple`]
    pub fn flatten(&self) -> Vec<&ValidationError> {
        match self {
            ValidationError::Multiple(errors) => errors.iter().flat_map(|e| e.flatten()).collect(),
            other => vec![other],
        }
    }

    /// Field path of the (first) failing check
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::Conflict { field, .. }
            | ValidationError::Custom { field, .. } => field,
            ValidationError::Multiple(errors) => errors.first().map_or("", ValidationError::field),
        }
    }
}

fn describe_range(min: &Option<i64>, max: &Option<i64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("between {min} and {max}"),
        (Some(min), None) => format!("at least {min}"),
        (None, Some(max)) => format!("at most {max}"),
        (None, None) => "in valid range".to_string(),
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validator that accumulates failures across many checks.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested field
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Validate that a value is present
    pub fn required<T>(&mut self, field_name: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Validate that a string is present and not blank
    pub fn non_empty(&mut self, field_name: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Validate that a number is within range
    pub fn range<T>(&mut self, field_name: &str, value: T, min: Option<T>, max: Option<T>) -> &mut Self
    where
        T: PartialOrd + Copy + Into<i64>,
    {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);

        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field_name),
                min: min.map(Into::into),
                max: max.map(Into::into),
                actual: value.into(),
            });
        }
        self
    }

    /// Validate that two optional settings are not both present
    pub fn exclusive<A, B>(&mut self, field_name: &str, value: &Option<A>, other_name: &str, other: &Option<B>) -> &mut Self {
        if value.is_some() && other.is_some() {
            self.errors.push(ValidationError::Conflict {
                field: self.full_field_name(field_name),
                other: self.full_field_name(other_name),
            });
        }
        self
    }

    /// Validate a string against an expected shape
    pub fn format(&mut self, field_name: &str, value: &str, expected: &str, is_valid: bool) -> &mut Self {
        if !is_valid {
            self.errors.push(ValidationError::InvalidFormat {
                field: self.full_field_name(field_name),
                expected: expected.to_string(),
                actual: value.to_string(),
            });
        }
        self
    }

    /// Record an error produced elsewhere under this validator's prefix
    pub fn push(&mut self, field_name: &str, message: impl fmt::Display) -> &mut Self {
        self.errors.push(ValidationError::Custom {
            field: self.full_field_name(field_name),
            message: message.to_string(),
        });
        self
    }

    /// Validate a collection of items
    pub fn each<T, F>(&mut self, field_name: &str, items: &[T], mut validator: F) -> &mut Self
    where
        F: FnMut(&mut ConfigValidator, usize, &T),
    {
        for (index, item) in items.iter().enumerate() {
            let mut item_validator = self.for_field(&format!("{field_name}[{index}]"));
            validator(&mut item_validator, index, item);
            self.merge(item_validator);
        }
        self
    }

    /// Merge errors from another validator
    pub fn merge(&mut self, other: ConfigValidator) {
        self.errors.extend(other.errors);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse accumulated failures into one result
    pub fn result(self) -> ValidationResult {
        let mut errors = self.errors;
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_validator_passes() {
        assert_eq!(ConfigValidator::new().result(), Ok(()));
    }

    #[test]
    fn single_failure_is_returned_directly() {
        let mut v = ConfigValidator::new();
        v.non_empty("name", "  ");
        assert_eq!(
            v.result(),
            Err(ValidationError::Required {
                field: "name".into()
            })
        );
    }

    #[test]
    fn nested_fields_are_prefixed() {
        let mut v = ConfigValidator::new();
        v.each("rules", &[5i64, -1], |item, _, value| {
            item.range("limit", *value, Some(0), None);
        });
        let err = v.result().unwrap_err();
        assert_eq!(err.field(), "rules[1].limit");
        assert_eq!(err.flatten().len(), 1);
    }

    #[test]
    fn multiple_failures_are_kept() {
        let mut v = ConfigValidator::new();
        v.required::<u8>("gid", &None)
            .exclusive("a", &Some(1), "b", &Some(2));
        let err = v.result().unwrap_err();
        assert_eq!(err.flatten().len(), 2);
        assert!(err.to_string().contains("cannot be used together"));
    }
}
