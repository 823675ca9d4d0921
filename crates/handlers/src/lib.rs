//! Concrete ID reference handlers for the external services the storage
//! service integrates with.
//!
//! Four handler factories plug into the `idref-core` framework:
//!
//! - [`BytestreamIdHandlerFactory`]: blob-store IDs (type `bytestream`),
//!   ownership transfer by re-owning nodes in place
//! - [`ShockIdHandlerFactory`]: blob-store IDs (type `shock`), ownership
//!   transfer by copying nodes
//! - [`HandleIdHandlerFactory`]: handle-registry IDs (type `handle`), batch
//!   readability check, no transfer
//! - [`SampleIdHandlerFactory`]: sample-registry IDs (type `sample`),
//!   per-record ACL check, no transfer
//!
//! Each factory talks to its service through a small client trait
//! ([`BlobstoreClient`], [`HandleServiceClient`], [`SampleServiceClient`]) so
//! tests can substitute recording fakes; the production implementations are
//! HTTP ([`HttpBlobstoreClient`]) and JSON-RPC ([`JsonRpcHandleClient`],
//! [`JsonRpcSampleClient`]). A factory constructed without a client degrades
//! to per-identifier "service not configured" validation errors instead of a
//! startup crash.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blobstore;
pub mod handle;
mod rpc;
pub mod sample;

pub use blobstore::chown::{bytestream_type, BytestreamIdHandlerFactory};
pub use blobstore::client::{AclKind, BlobstoreClient, BlobstoreError, NodeAcl, NodeId};
pub use blobstore::copy::{shock_type, ShockIdHandlerFactory};
pub use blobstore::http::HttpBlobstoreClient;
pub use handle::{
    handle_type, HandleError, HandleIdHandlerFactory, HandleServiceClient, JsonRpcHandleClient,
};
pub use sample::{
    sample_type, JsonRpcSampleClient, SampleAcls, SampleError, SampleIdHandlerFactory,
    SampleServiceClient,
};
