//! Validation system for configuration values
//!
//! Each config section implements the `ConfigSection` trait which includes validation.

pub use crate::error::ValidationError;
use std::path::Path;

/// Trait for configuration sections that can validate themselves
pub trait ConfigSection: Default {
    /// Validates the configuration section
    ///
    /// Returns a list of validation errors. Empty list means valid.
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a path is an existing directory
    pub fn is_directory(path: &Path, field: &str) -> Result<(), ValidationError> {
        if !path.is_dir() {
            Err(ValidationError::with_value(
                field,
                "path is not an existing directory",
                path.display(),
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a path is set
    pub fn path_not_empty(path: &Path, field: &str) -> Result<(), ValidationError> {
        if path.as_os_str().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
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

    /// Validates every entry of a list with `not_empty`
    pub fn entries_not_empty(values: &[String], field: &str) -> Vec<Result<(), ValidationError>> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| Self::not_empty(value, &format!("{}[{}]", field, i)))
            .collect()
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
    use std::path::PathBuf;

    #[test]
    fn test_not_empty_valid() {
        assert!(Validator::not_empty("hello", "test").is_ok());
        assert!(Validator::not_empty("  hello  ", "test").is_ok());
    }

    #[test]
    fn test_not_empty_invalid() {
        assert!(Validator::not_empty("", "test").is_err());
        assert!(Validator::not_empty("   ", "test").is_err());
    }

    #[test]
    fn test_entries_not_empty_names_index() {
        let values = vec!["pdf".to_string(), " ".to_string()];
        let errors = Validator::collect_errors(Validator::entries_not_empty(&values, "formats"))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "formats[1]");
    }

    #[test]
    fn test_collect_errors_all_ok() {
        let results = vec![Ok(()), Ok(()), Ok(())];
        assert!(Validator::collect_errors(results).is_ok());
    }

    #[test]
    fn test_collect_errors_some_err() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("field1", "error1")),
            Ok(()),
            Err(ValidationError::new("field2", "error2")),
        ];
        let result = Validator::collect_errors(results);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn test_is_directory_nonexistent() {
        let path = PathBuf::from("/this/path/definitely/does/not/exist");
        assert!(Validator::is_directory(&path, "test").is_err());
    }

    #[test]
    fn test_path_not_empty() {
        assert!(Validator::path_not_empty(&PathBuf::new(), "test").is_err());
        assert!(Validator::path_not_empty(&PathBuf::from("/srv"), "test").is_ok());
    }
}
