//! A single mention of an external ID inside a payload.

use crate::idtype::IdReferenceType;

/// One occurrence of an ID reference discovered while walking a typed
/// object's payload: the ID type, the raw identifier string, and the ordered
/// attribute list from the type annotation. The same raw ID may recur across
/// many objects and many times within one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdOccurrence {
    id_type: IdReferenceType,
    id: String,
    attributes: Vec<String>,
}

impl IdOccurrence {
    /// Create an occurrence with no attributes (the normalized form of an
    /// absent attribute list).
    pub fn new(id_type: IdReferenceType, id: impl Into<String>) -> Self {
        IdOccurrence {
            id_type,
            id: id.into(),
            attributes: Vec::new(),
        }
    }

    /// Attach an ordered attribute list to this occurrence.
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// The ID type.
    pub fn id_type(&self) -> &IdReferenceType {
        &self.id_type
    }

    /// The raw identifier string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The attribute list; empty if none were supplied.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}
