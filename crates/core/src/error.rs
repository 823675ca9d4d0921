//! Error taxonomy for ID reference processing.
//!
//! Errors split into three families, distinguished by who must react:
//!
//! - **Per-identifier data errors** ([`IdReferenceError::Parse`],
//!   [`IdReferenceError::Validation`]): caused by the caller's data, never
//!   retried, and carry the ID type, associated object, raw ID and attributes
//!   for precise attribution.
//! - **Call-level failures** ([`IdReferenceError::Infrastructure`],
//!   [`IdReferenceError::Permission`]): not attributable to one identifier;
//!   the caller may retry the whole call.
//! - **Protocol errors** (the remaining variants): indicate misuse of the
//!   framework and should not occur in correct operation.
//!
//! All variants propagate uncaught out of the framework; no retries are
//! attempted internally.

use std::fmt;

use thiserror::Error;

use crate::idtype::IdReferenceType;

/// Result type alias for ID reference operations.
pub type Result<T> = std::result::Result<T, IdReferenceError>;

/// Error types for ID reference collection, processing and remapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdReferenceError {
    /// Identifier syntax is malformed. A caller/data error; never retried.
    #[error("{message}")]
    Parse {
        /// The type of the offending identifier.
        id_type: IdReferenceType,
        /// The associated object the identifier occurred in, rendered for
        /// display.
        associated_object: String,
        /// The raw identifier string.
        id: String,
        /// The attributes supplied with the identifier.
        attributes: Vec<String>,
        /// A description of the problem.
        message: String,
    },

    /// Identifier not found, not readable, not owned, or its backing service
    /// unconfigured. A caller/data error; never retried.
    #[error("{message}")]
    Validation {
        /// The type of the offending identifier.
        id_type: IdReferenceType,
        /// The associated object the identifier occurred in, rendered for
        /// display.
        associated_object: String,
        /// The raw identifier string.
        id: String,
        /// The attributes supplied with the identifier.
        attributes: Vec<String>,
        /// A description of the problem.
        message: String,
    },

    /// Network failure, remote server error, or unexpected client failure
    /// while talking to an external service. Call-level; the caller may retry
    /// the whole call.
    #[error("{message}")]
    Infrastructure {
        /// The ID type whose handler hit the failure.
        id_type: IdReferenceType,
        /// A description of the problem.
        message: String,
    },

    /// A remapped ID was queried before processing, or for an identifier that
    /// was never added.
    #[error("{0}")]
    NotFound(String),

    /// A remap query named an ID type with no registered handler.
    #[error("there is no handler registered for the ID type {0}")]
    NoSuchHandler(IdReferenceType),

    /// An addition was attempted after the processing phase started.
    #[error("this handler is locked")]
    HandlerLocked,

    /// An ID was added before any object was associated with the handler set.
    #[error("must add an object to associate IDs with prior to adding IDs")]
    NoAssociatedObject,

    /// The per-call cap on distinct identifiers was exceeded.
    #[error("maximum ID count of {maximum} exceeded")]
    TooManyIds {
        /// The configured cap.
        maximum: usize,
    },

    /// Post-save permission propagation failed. May be partial; completed
    /// grants are not rolled back.
    #[error("{message}")]
    Permission {
        /// A description of the problem.
        message: String,
    },

    /// A required argument was absent.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// An argument failed validation.
    #[error("{0}")]
    InvalidArgument(String),
}

impl IdReferenceError {
    /// Build a [`IdReferenceError::Parse`] error attributed to one
    /// identifier occurrence.
    pub fn parse(
        id_type: IdReferenceType,
        associated_object: &impl fmt::Display,
        id: impl Into<String>,
        attributes: &[String],
        message: impl Into<String>,
    ) -> Self {
        IdReferenceError::Parse {
            id_type,
            associated_object: associated_object.to_string(),
            id: id.into(),
            attributes: attributes.to_vec(),
            message: message.into(),
        }
    }

    /// Build a [`IdReferenceError::Validation`] error attributed to one
    /// identifier occurrence.
    pub fn validation(
        id_type: IdReferenceType,
        associated_object: &impl fmt::Display,
        id: impl Into<String>,
        attributes: &[String],
        message: impl Into<String>,
    ) -> Self {
        IdReferenceError::Validation {
            id_type,
            associated_object: associated_object.to_string(),
            id: id.into(),
            attributes: attributes.to_vec(),
            message: message.into(),
        }
    }

    /// Build a call-level [`IdReferenceError::Infrastructure`] error.
    pub fn infrastructure(id_type: IdReferenceType, message: impl Into<String>) -> Self {
        IdReferenceError::Infrastructure {
            id_type,
            message: message.into(),
        }
    }

    /// Build a [`IdReferenceError::Permission`] error.
    pub fn permission(message: impl Into<String>) -> Self {
        IdReferenceError::Permission {
            message: message.into(),
        }
    }

    /// The ID type this error is attributed to, if any.
    pub fn id_type(&self) -> Option<&IdReferenceType> {
        match self {
            IdReferenceError::Parse { id_type, .. }
            | IdReferenceError::Validation { id_type, .. }
            | IdReferenceError::Infrastructure { id_type, .. }
            | IdReferenceError::NoSuchHandler(id_type) => Some(id_type),
            _ => None,
        }
    }
}
