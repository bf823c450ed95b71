//! Collects field-level validation failures so that every problem with a request can be
//! reported at once.

use std::collections::BTreeMap;

use crate::Error;

/// Maps a field name to the reason it failed validation.
pub type ValidationErrors = BTreeMap<String, String>;

/// Accumulates validation failures across one or more checks.
///
/// A single validator can be passed through several validation functions, e.g. the filter
/// checks followed by the entity checks, and the caller inspects the combined result.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    /// Create a validator with no recorded failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` if `condition` is false.
    pub fn check(&mut self, condition: bool, field: &str, message: &str) {
        if !condition {
            self.add_error(field, message);
        }
    }

    /// Record `message` against `field`.
    ///
    /// Only the first message for a field is kept.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    /// Whether no failures have been recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The failures recorded so far.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Consume the validator, returning [Error::Validation] if any check failed.
    pub fn finish(self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Whether `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}
