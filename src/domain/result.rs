//! Result type alias for Obscura
//!
//! Convenience alias that uses [`ObscuraError`] as the error type.

use super::errors::{ObscuraError, StoreError};

/// Result type alias for Obscura operations
///
/// # Examples
///
/// ```
/// use obscura::domain::result::Result;
/// use obscura::domain::errors::ObscuraError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ObscuraError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ObscuraError>;

/// Result type alias for collaborator backends
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> StoreResult<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_store_error_propagates() {
        fn inner() -> StoreResult<()> {
            Err(StoreError::Conflict("duplicate marker".to_string()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(ObscuraError::Store(_))));
    }
}
