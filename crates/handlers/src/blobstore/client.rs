//! The blob-store client seam.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use idref_core::AuthToken;

/// A validated blob-store node ID (UUID format).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Parse and validate a node ID.
    pub fn new(id: impl Into<String>) -> Result<Self, BlobstoreError> {
        let id = id.into();
        if Uuid::parse_str(&id).is_err() {
            return Err(BlobstoreError::InvalidNodeId(id));
        }
        Ok(NodeId(id))
    }

    /// Get the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of access-control list on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclKind {
    /// Read access.
    Read,
    /// Write access.
    Write,
    /// Delete access.
    Delete,
    /// Ownership.
    Owner,
}

impl AclKind {
    /// The wire name of the ACL kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AclKind::Read => "read",
            AclKind::Write => "write",
            AclKind::Delete => "delete",
            AclKind::Owner => "owner",
        }
    }
}

/// A snapshot of a node's access-control lists, by user name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeAcl {
    /// The node's owner.
    pub owner: String,
    /// Users with read access.
    pub read: Vec<String>,
    /// Users with write access.
    pub write: Vec<String>,
    /// Users with delete access.
    pub delete: Vec<String>,
}

/// Errors from the blob-store client.
///
/// `Unauthorized` and `NoSuchNode` are attributable to one node and become
/// per-identifier validation errors; `Remote` and `Io` are call-level
/// infrastructure failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobstoreError {
    /// The ID is not a well-formed node ID.
    #[error("invalid node ID: {0}")]
    InvalidNodeId(String),

    /// The configured service URL is not a valid blob-store URL.
    #[error("invalid blobstore URL: {0}")]
    InvalidUrl(String),

    /// The acting user may not read the node.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The node does not exist.
    #[error("node {0} does not exist")]
    NoSuchNode(String),

    /// The blob store reported an error.
    #[error("{0}")]
    Remote(String),

    /// A transport-level failure talking to the blob store.
    #[error("{0}")]
    Io(String),
}

/// Synchronous client for the blob store.
///
/// One administrative, privileged instance is shared read-mostly across all
/// concurrent calls. Per-call caller-scoped access goes through
/// [`with_token`](BlobstoreClient::with_token), which clones the client and
/// rebinds the token on the clone; the shared client's token is never mutated
/// in place, preventing cross-call credential leakage under concurrent load.
pub trait BlobstoreClient: Send + Sync {
    /// The user name of the token this client acts as.
    fn acting_user(&self) -> &str;

    /// Clone this client with a different token bound.
    fn with_token(&self, token: &AuthToken) -> Result<Box<dyn BlobstoreClient>, BlobstoreError>;

    /// Fetch a node's access-control lists.
    fn acls(&self, node: &NodeId) -> Result<NodeAcl, BlobstoreError>;

    /// Add users to a node ACL, returning the updated ACLs.
    fn add_to_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError>;

    /// Remove users from a node ACL.
    fn remove_from_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError>;

    /// Copy a node, including its data and indexes, returning the new node's
    /// ID. The copy is owned by the acting user.
    fn copy_node(&self, node: &NodeId) -> Result<NodeId, BlobstoreError>;

    /// Set or clear world-readability on a node.
    fn set_publicly_readable(&self, node: &NodeId, readable: bool) -> Result<(), BlobstoreError>;

    /// The version reported by the remote service.
    fn remote_version(&self) -> Result<String, BlobstoreError>;
}
