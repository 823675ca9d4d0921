//! Blob-store handler, re-own variant (ID type `bytestream`).
//!
//! Ownership transfer mutates the caller's node in place: the administrative
//! account is made the owner, then every other write and delete grant on the
//! node is revoked. The caller must own the node; a merely-readable node is
//! rejected. IDs remap to themselves.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use idref_core::{
    AssociatedKey, AuthToken, DependencyStatus, IdLedger, IdReferenceError, IdReferenceHandler,
    IdReferenceHandlerFactory, IdReferencePermissionHandler, IdReferenceType, RemappedId, Result,
};

use super::client::{AclKind, BlobstoreClient, BlobstoreError, NodeAcl, NodeId};
use super::permission::{BlobstorePermissionHandler, Wording};

const WORDING: Wording = Wording {
    noun: "bytestream",
    service: "bytestream storage",
    service_title: "Bytestream storage",
};

/// The ID type handled by [`BytestreamIdHandlerFactory`].
pub fn bytestream_type() -> IdReferenceType {
    IdReferenceType::new_unchecked("bytestream")
}

/// Factory for blob-store ID handlers that transfer ownership by re-owning
/// nodes in place.
///
/// Construct with `None` to run without a blob-store connection; handlers
/// then fail each collected ID with a "not configured" validation error.
pub struct BytestreamIdHandlerFactory {
    client: Option<Arc<dyn BlobstoreClient>>,
}

impl BytestreamIdHandlerFactory {
    /// Create a factory backed by the given administrative client, if any.
    pub fn new(client: Option<Arc<dyn BlobstoreClient>>) -> Self {
        BytestreamIdHandlerFactory { client }
    }
}

impl<T: AssociatedKey + 'static> IdReferenceHandlerFactory<T> for BytestreamIdHandlerFactory {
    fn id_type(&self) -> IdReferenceType {
        bytestream_type()
    }

    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<T>>> {
        let token = token
            .ok_or_else(|| IdReferenceError::MissingArgument("userToken".to_string()))?
            .clone();
        Ok(Box::new(BytestreamIdHandler {
            client: self.client.clone(),
            token,
            ledger: IdLedger::new(),
        }))
    }

    fn create_permission_handler(
        &self,
        user: Option<&str>,
    ) -> Box<dyn IdReferencePermissionHandler> {
        Box::new(BlobstorePermissionHandler::new(
            self.client.clone(),
            user,
            WORDING,
        ))
    }

    fn dependency_status(&self) -> Vec<DependencyStatus> {
        match &self.client {
            None => vec![],
            Some(client) => match client.remote_version() {
                Ok(version) => vec![DependencyStatus::new(true, "OK", "Blobstore", version)],
                Err(e) => vec![DependencyStatus::new(
                    false,
                    e.to_string(),
                    "Blobstore",
                    "Unknown",
                )],
            },
        }
    }
}

struct BytestreamIdHandler<T: AssociatedKey> {
    client: Option<Arc<dyn BlobstoreClient>>,
    token: AuthToken,
    ledger: IdLedger<T>,
}

fn parse_node(id: &str) -> Result<NodeId> {
    NodeId::new(id).map_err(|e| IdReferenceError::infrastructure(bytestream_type(), e.to_string()))
}

fn alter_error(e: BlobstoreError) -> IdReferenceError {
    match e {
        BlobstoreError::Io(m) => IdReferenceError::infrastructure(
            bytestream_type(),
            format!(
                "There was an I/O problem while attempting to contact bytestream \
                 storage to alter nodes: {m}"
            ),
        ),
        other => IdReferenceError::infrastructure(
            bytestream_type(),
            format!(
                "Bytestream storage reported a problem while attempting to alter nodes: {other}"
            ),
        ),
    }
}

/// Revoke every write and delete grant on the node except the admin's own.
fn strip_grants(
    admin: &dyn BlobstoreClient,
    node: &NodeId,
    admin_user: &str,
    acl: &NodeAcl,
) -> Result<()> {
    for (users, kind) in [(&acl.write, AclKind::Write), (&acl.delete, AclKind::Delete)] {
        let others: Vec<String> = users.iter().filter(|u| *u != admin_user).cloned().collect();
        if others.is_empty() {
            continue;
        }
        admin
            .remove_from_acl(node, &others, kind)
            .map_err(alter_error)?;
    }
    Ok(())
}

impl<T: AssociatedKey> IdReferenceHandler<T> for BytestreamIdHandler<T> {
    fn id_type(&self) -> IdReferenceType {
        bytestream_type()
    }

    fn add_id(&mut self, associated: &T, id: &str, attributes: &[String]) -> Result<bool> {
        if self.client.is_none() {
            return Err(IdReferenceError::validation(
                bytestream_type(),
                associated,
                id,
                attributes,
                format!(
                    "Found bytestream id {id}. There is no connection configured for \
                     bytestream storage and so objects containing bytestream IDs cannot \
                     be processed."
                ),
            ));
        }
        if NodeId::new(id).is_err() {
            return Err(IdReferenceError::parse(
                bytestream_type(),
                associated,
                id,
                attributes,
                format!("Illegal bytestream ID: {id}"),
            ));
        }
        self.ledger.insert(associated, id)
    }

    fn process_ids(&mut self) -> Result<()> {
        if self.ledger.is_empty() {
            self.ledger.mark_processed();
            return Ok(());
        }
        let Some(admin) = self.client.clone() else {
            return Err(IdReferenceError::infrastructure(
                bytestream_type(),
                "no blobstore connection is configured",
            ));
        };
        let caller = admin.with_token(&self.token).map_err(|e| {
            IdReferenceError::infrastructure(
                bytestream_type(),
                format!("Error contacting bytestream storage to validate IDs: {e}"),
            )
        })?;
        let admin_user = admin.acting_user().to_string();
        let caller_user = self.token.user_name().to_string();

        // Precheck every distinct node with the caller's credentials before
        // mutating anything, so permission failures surface before any node
        // changes hands.
        let mut to_own: BTreeSet<String> = BTreeSet::new();
        let mut checked: HashSet<&str> = HashSet::new();
        for (associated, ids) in self.ledger.entries() {
            for id in ids {
                if !checked.insert(id.as_str()) {
                    continue;
                }
                let node = parse_node(id)?;
                let acl = match caller.acls(&node) {
                    Ok(acl) => acl,
                    Err(BlobstoreError::Unauthorized(_)) => {
                        return Err(IdReferenceError::validation(
                            bytestream_type(),
                            associated,
                            id.as_str(),
                            &[],
                            format!("User {caller_user} cannot read bytestream node {id}"),
                        ));
                    }
                    Err(BlobstoreError::NoSuchNode(_)) => {
                        return Err(IdReferenceError::validation(
                            bytestream_type(),
                            associated,
                            id.as_str(),
                            &[],
                            format!("Bytestream node {id} does not exist"),
                        ));
                    }
                    Err(BlobstoreError::Io(m)) => {
                        return Err(IdReferenceError::infrastructure(
                            bytestream_type(),
                            format!(
                                "There was an I/O problem while attempting to contact \
                                 bytestream storage to process IDs: {m}"
                            ),
                        ));
                    }
                    Err(e) => {
                        return Err(IdReferenceError::infrastructure(
                            bytestream_type(),
                            format!(
                                "Bytestream storage reported a problem while attempting \
                                 to process IDs: {e}"
                            ),
                        ));
                    }
                };
                if acl.owner == admin_user {
                    // Already ours, but stray grants from before the transfer
                    // must still be revoked.
                    strip_grants(&*admin, &node, &admin_user, &acl)?;
                } else if acl.owner != caller_user {
                    return Err(IdReferenceError::validation(
                        bytestream_type(),
                        associated,
                        id.as_str(),
                        &[],
                        format!("User {caller_user} does not own bytestream node {id}"),
                    ));
                } else {
                    to_own.insert(id.clone());
                }
            }
        }

        let distinct: Vec<String> = self
            .ledger
            .distinct_ids()
            .into_iter()
            .map(String::from)
            .collect();
        for id in distinct {
            if to_own.contains(&id) {
                let node = parse_node(&id)?;
                let acl = admin
                    .add_to_acl(&node, std::slice::from_ref(&admin_user), AclKind::Owner)
                    .map_err(alter_error)?;
                strip_grants(&*admin, &node, &admin_user, &acl)?;
                tracing::info!(node = %id, from = %caller_user, "took ownership of bytestream node");
            }
            self.ledger.record_remap(&id, id.clone());
        }
        self.ledger.mark_processed();
        Ok(())
    }

    fn remapped_id(&self, original_id: &str) -> Result<RemappedId> {
        self.ledger.remapped_id(original_id)
    }

    fn remapped_ids(&self, associated: &T) -> Result<HashSet<RemappedId>> {
        self.ledger.remapped_ids(associated)
    }

    fn lock(&mut self) {
        self.ledger.lock();
    }
}
