//! Validation system for configuration values
//!
//! Each config section implements the `ConfigSection` trait which includes validation.

pub use crate::error::ValidationError;

/// Trait for configuration sections that can validate themselves
///
/// Each config section (AppConfig, BuildConfig, CatalogueConfig) implements this
/// trait, so new sections can be added without touching the existing ones.
pub trait ConfigSection: Default {
    /// Validates the configuration section
    ///
    /// Returns a list of validation errors. Empty list means valid.
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one
    ///
    /// Values from `other` take precedence. This is used for override chains.
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Validates that a value is one of the allowed options
    pub fn one_of<T>(value: &T, allowed: &[T], field: &str) -> Result<(), ValidationError>
    where
        T: PartialEq + std::fmt::Display,
    {
        if !allowed.contains(value) {
            let allowed_str = allowed
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Err(ValidationError::with_value(
                field,
                format!("must be one of: {}", allowed_str),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates a converter command template
    ///
    /// An empty template means the converter is not configured. Otherwise both
    /// `{input}` and `{output}` must appear.
    pub fn command_template(template: &str, field: &str) -> Result<(), ValidationError> {
        if template.trim().is_empty() {
            return Ok(());
        }
        for placeholder in ["{input}", "{output}"] {
            if !template.contains(placeholder) {
                return Err(ValidationError::with_value(
                    field,
                    format!("must contain {}", placeholder),
                    template,
                ));
            }
        }
        Ok(())
    }

    /// Validates a three-letter lowercase language code
    pub fn language_code(code: &str, field: &str) -> Result<(), ValidationError> {
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase()) {
            Ok(())
        } else {
            Err(ValidationError::with_value(
                field,
                "must be a three-letter language code",
                code,
            ))
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert!(Validator::in_range(2, 1, 32, "test").is_ok());
        assert!(Validator::in_range(0, 1, 32, "test").is_err());
        assert!(Validator::in_range(33, 1, 32, "test").is_err());
    }

    #[test]
    fn test_not_empty() {
        assert!(Validator::not_empty("folio.db", "test").is_ok());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_one_of() {
        assert!(Validator::one_of(&"memory", &["memory", "database"], "test").is_ok());
        assert!(Validator::one_of(&"redis", &["memory", "database"], "test").is_err());
    }

    #[test]
    fn test_command_template() {
        assert!(Validator::command_template("", "test").is_ok());
        assert!(Validator::command_template("ebook-convert {input} {output}", "test").is_ok());

        let err = Validator::command_template("ebook-convert {input}", "build.converters.epub")
            .unwrap_err();
        assert_eq!(err.field, "build.converters.epub");
        assert!(err.message.contains("{output}"));
    }

    #[test]
    fn test_language_code() {
        assert!(Validator::language_code("pol", "test").is_ok());
        assert!(Validator::language_code("PL", "test").is_err());
        assert!(Validator::language_code("", "test").is_err());
    }

    #[test]
    fn test_collect_errors() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Ok(()),
            Err(ValidationError::new("field2", "error2")),
        ];
        let result = Validator::collect_errors(results);
        assert_eq!(result.unwrap_err().len(), 2);
    }
}
