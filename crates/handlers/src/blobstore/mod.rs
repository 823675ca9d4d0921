//! Blob-store ID handling.
//!
//! The blob store holds byte-stream nodes owned by user accounts. Before an
//! object referencing a node can be saved, the node must be brought under the
//! storage service's administrative account so it stays accessible after the
//! uploading user's account is retired. Two handler variants implement that
//! transfer with deliberately different policies:
//!
//! - [`chown`]: re-owns the caller's node in place and requires the caller to
//!   actually own it (conservative, destructive).
//! - [`copy`]: copies any node the caller can read and remaps to the copy's
//!   ID (permissive, non-destructive).

pub mod chown;
pub mod client;
pub mod copy;
pub mod http;
mod permission;

#[cfg(test)]
pub(crate) mod testutil;
