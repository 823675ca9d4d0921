//! Identifier-type keys.
//!
//! An [`IdReferenceType`] names one identifier namespace (for example
//! `"handle"` or `"sample"`) and is the key under which handler factories are
//! registered and occurrences are dispatched. Equality and ordering are
//! string-based, case-sensitive, with no trimming.

use std::fmt;

use crate::error::{IdReferenceError, Result};

/// The type of an ID reference embedded in a typed object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdReferenceType(String);

impl IdReferenceType {
    /// Create a new ID type, validating the input.
    ///
    /// # Errors
    ///
    /// Returns [`IdReferenceError::InvalidArgument`] if the string is empty
    /// or whitespace only.
    pub fn new(id_type: impl Into<String>) -> Result<Self> {
        let id_type = id_type.into();
        if id_type.trim().is_empty() {
            return Err(IdReferenceError::InvalidArgument(
                "type cannot be null or whitespace only".to_string(),
            ));
        }
        Ok(IdReferenceType(id_type))
    }

    /// Create an ID type without validation.
    ///
    /// Intended for statically known literals such as the type constants
    /// exported by concrete handler factories. Use [`IdReferenceType::new`]
    /// for untrusted input.
    pub fn new_unchecked(id_type: impl Into<String>) -> Self {
        IdReferenceType(id_type.into())
    }

    /// Get the type string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for IdReferenceType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
