//! Core framework for resolving external ID references embedded in typed
//! objects.
//!
//! Payloads saved to the storage service may embed identifiers that point at
//! records in independently operated external services. Before an object can
//! be persisted every embedded identifier must be validated against its
//! owning service, and the results of that validation (possibly a remapped
//! identifier) substituted back into the object. This crate defines the
//! generic, pluggable machinery for doing so:
//!
//! - [`IdReferenceType`]: the key identifying one identifier namespace
//! - [`IdOccurrence`]: one mention of an identifier inside a payload
//! - [`IdReferenceError`]: the error taxonomy (per-identifier data errors vs
//!   call-level infrastructure errors vs protocol errors)
//! - [`IdReferenceHandler`] / [`IdReferenceHandlerFactory`]: the plugin seam;
//!   new identifier types are added without touching this crate
//! - [`IdLedger`]: the shared per-handler collection/remap state
//! - [`IdReferenceHandlerSet`]: the per-call dispatcher that owns the global
//!   unique-identifier cap and drives the collect → process lifecycle
//! - [`HandlerRegistry`] / [`HandlerRegistryBuilder`]: the process-wide
//!   frozen registry of factories, bound per call to a caller token
//! - [`IdReferencePermissionHandlerSet`]: post-save read-permission
//!   propagation
//!
//! A handler set and its handlers are created fresh per inbound call and
//! driven strictly sequentially: collection, then processing, then remap
//! queries. The frozen registry is the only piece shared across calls and is
//! read-only after [`HandlerRegistryBuilder::build`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handler;
pub mod handler_set;
pub mod idtype;
pub mod ledger;
pub mod occurrence;
pub mod registry;
pub mod remap;
pub mod status;
pub mod token;

pub use error::{IdReferenceError, Result};
pub use handler::{
    AssociatedKey, IdReferenceHandler, IdReferenceHandlerFactory, IdReferencePermissionHandler,
};
pub use handler_set::IdReferenceHandlerSet;
pub use idtype::IdReferenceType;
pub use ledger::IdLedger;
pub use occurrence::IdOccurrence;
pub use registry::{
    HandlerRegistry, HandlerRegistryBuilder, IdReferenceHandlerSetFactory,
    IdReferencePermissionHandlerSet,
};
pub use remap::RemappedId;
pub use status::DependencyStatus;
pub use token::AuthToken;
