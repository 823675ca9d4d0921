//! ID reference resolution and ownership transfer for typed-object storage.
//!
//! Objects saved to the storage service may embed identifiers pointing at
//! records in external services. Before a save commits, every embedded ID
//! must be collected, validated against its service with the caller's
//! credentials, have ownership of the underlying data secured where the ID
//! type demands it, and be remappable to its final form.
//!
//! This facade re-exports the pluggable framework from `idref-core` (the
//! handler/factory traits, the per-call [`IdReferenceHandlerSet`] with its
//! two-phase collect/process lifecycle, and the process-wide
//! [`HandlerRegistry`]) and the concrete service handlers from
//! `idref-handlers` (blob-store, handle and sample IDs).
//!
//! ```no_run
//! use std::sync::Arc;
//! use idref::{
//!     AuthToken, BytestreamIdHandlerFactory, HandlerRegistryBuilder, IdOccurrence,
//!     IdReferenceType,
//! };
//!
//! # fn main() -> idref::Result<()> {
//! let registry = HandlerRegistryBuilder::<u64>::new(100_000)
//!     .with_factory(Arc::new(BytestreamIdHandlerFactory::new(None)))
//!     .build();
//!
//! // per call:
//! let token = AuthToken::new("user", "secret");
//! let mut set = registry.handler_set_factory(Some(token)).create_handlers()?;
//! set.associate_object(1);
//! set.add_id(&IdOccurrence::new(
//!     IdReferenceType::new("bytestream")?,
//!     "36e4f273-4978-41b8-93bd-ee662ba0d01d",
//! ))?;
//! set.process_ids()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use idref_core::*;
pub use idref_handlers::*;
