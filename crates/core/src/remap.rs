//! Remapped (post-processing) identifier values.

use std::fmt;

/// The final identifier substituted into storage after the processing phase.
///
/// For handlers that never transfer ownership this is the original ID
/// unchanged; for the copying blob-store handler it is the ID of the
/// administratively owned copy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemappedId(String);

impl RemappedId {
    /// Wrap a final identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        RemappedId(id.into())
    }

    /// Get the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for RemappedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemappedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
