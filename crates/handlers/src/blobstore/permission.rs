//! Post-save read-permission propagation for blob-store nodes.
//!
//! Shared by both blob-store handler variants; only the service naming in
//! the error messages differs.

use std::sync::Arc;

use idref_core::{IdReferenceError, IdReferencePermissionHandler, Result};

use super::client::{AclKind, BlobstoreClient, NodeId};

/// Wording used in messages produced by a blob-store handler variant.
#[derive(Clone, Copy)]
pub(crate) struct Wording {
    /// The ID noun, e.g. "bytestream".
    pub noun: &'static str,
    /// The service name mid-sentence, e.g. "bytestream storage".
    pub service: &'static str,
    /// The service name at sentence start, e.g. "Bytestream storage".
    pub service_title: &'static str,
}

pub(crate) struct BlobstorePermissionHandler {
    client: Option<Arc<dyn BlobstoreClient>>,
    user: Option<String>,
    wording: Wording,
}

impl BlobstorePermissionHandler {
    pub(crate) fn new(
        client: Option<Arc<dyn BlobstoreClient>>,
        user: Option<&str>,
        wording: Wording,
    ) -> Self {
        BlobstorePermissionHandler {
            client,
            user: user.map(String::from),
            wording,
        }
    }
}

impl IdReferencePermissionHandler for BlobstorePermissionHandler {
    fn add_read_permission(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let w = self.wording;
        let Some(client) = &self.client else {
            return Err(IdReferenceError::permission(format!(
                "There is no connection configured for {} and {} IDs cannot be processed.",
                w.service, w.noun
            )));
        };
        for id in ids {
            let node = NodeId::new(id).map_err(|_| {
                IdReferenceError::permission(format!("Illegal {} ID: {id}", w.noun))
            })?;
            let result = match &self.user {
                None => client.set_publicly_readable(&node, true),
                Some(user) => client
                    .add_to_acl(&node, std::slice::from_ref(user), AclKind::Read)
                    .map(|_| ()),
            };
            result.map_err(|e| match e {
                super::client::BlobstoreError::Io(m) => IdReferenceError::permission(format!(
                    "There was an I/O problem while attempting to set {} ACLs on node {id}: {m}",
                    w.noun
                )),
                other => IdReferenceError::permission(format!(
                    "{} reported a problem while attempting to set ACLs on node {id}: {other}",
                    w.service_title
                )),
            })?;
        }
        Ok(())
    }
}
