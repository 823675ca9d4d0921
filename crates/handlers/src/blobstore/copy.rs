//! Blob-store handler, copy variant (ID type `shock`).
//!
//! Ownership transfer copies the node: any node the caller can read is copied
//! under the administrative account and the ID remaps to the copy's ID. The
//! caller's node is left untouched, so no ownership check and no ACL hygiene
//! are performed.

use std::collections::HashSet;
use std::sync::Arc;

use idref_core::{
    AssociatedKey, AuthToken, DependencyStatus, IdLedger, IdReferenceError, IdReferenceHandler,
    IdReferenceHandlerFactory, IdReferencePermissionHandler, IdReferenceType, RemappedId, Result,
};

use super::client::{BlobstoreClient, BlobstoreError, NodeId};
use super::permission::{BlobstorePermissionHandler, Wording};

const WORDING: Wording = Wording {
    noun: "shock",
    service: "the Shock service",
    service_title: "The Shock service",
};

/// The ID type handled by [`ShockIdHandlerFactory`].
pub fn shock_type() -> IdReferenceType {
    IdReferenceType::new_unchecked("shock")
}

/// Factory for blob-store ID handlers that transfer ownership by copying
/// nodes.
///
/// Construct with `None` to run without a connection; handlers then fail each
/// collected ID with a "not configured" validation error.
pub struct ShockIdHandlerFactory {
    client: Option<Arc<dyn BlobstoreClient>>,
}

impl ShockIdHandlerFactory {
    /// Create a factory backed by the given administrative client, if any.
    pub fn new(client: Option<Arc<dyn BlobstoreClient>>) -> Self {
        ShockIdHandlerFactory { client }
    }
}

impl<T: AssociatedKey + 'static> IdReferenceHandlerFactory<T> for ShockIdHandlerFactory {
    fn id_type(&self) -> IdReferenceType {
        shock_type()
    }

    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<T>>> {
        let token = token
            .ok_or_else(|| IdReferenceError::MissingArgument("userToken".to_string()))?
            .clone();
        Ok(Box::new(ShockIdHandler {
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
                Ok(version) => vec![DependencyStatus::new(true, "OK", "Shock", version)],
                Err(e) => vec![DependencyStatus::new(
                    false,
                    e.to_string(),
                    "Shock",
                    "Unknown",
                )],
            },
        }
    }
}

struct ShockIdHandler<T: AssociatedKey> {
    client: Option<Arc<dyn BlobstoreClient>>,
    token: AuthToken,
    ledger: IdLedger<T>,
}

fn copy_error(e: BlobstoreError) -> IdReferenceError {
    match e {
        BlobstoreError::Io(m) => IdReferenceError::infrastructure(
            shock_type(),
            format!(
                "There was an I/O problem while attempting to contact the Shock \
                 service to copy nodes: {m}"
            ),
        ),
        other => IdReferenceError::infrastructure(
            shock_type(),
            format!("The Shock service reported a problem while attempting to copy nodes: {other}"),
        ),
    }
}

impl<T: AssociatedKey> IdReferenceHandler<T> for ShockIdHandler<T> {
    fn id_type(&self) -> IdReferenceType {
        shock_type()
    }

    fn add_id(&mut self, associated: &T, id: &str, attributes: &[String]) -> Result<bool> {
        if self.client.is_none() {
            return Err(IdReferenceError::validation(
                shock_type(),
                associated,
                id,
                attributes,
                format!(
                    "Found shock id {id}. There is no connection configured for the \
                     Shock service and so objects containing shock IDs cannot be \
                     processed."
                ),
            ));
        }
        if NodeId::new(id).is_err() {
            return Err(IdReferenceError::parse(
                shock_type(),
                associated,
                id,
                attributes,
                format!("Illegal shock ID: {id}"),
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
                shock_type(),
                "no Shock connection is configured",
            ));
        };
        let caller = admin.with_token(&self.token).map_err(|e| {
            IdReferenceError::infrastructure(
                shock_type(),
                format!("Error contacting the Shock service to validate IDs: {e}"),
            )
        })?;
        let admin_user = admin.acting_user().to_string();
        let caller_user = self.token.user_name().to_string();

        // Readability precheck with the caller's credentials; nothing is
        // copied until every node checks out.
        let mut to_copy: Vec<String> = Vec::new();
        let mut checked: HashSet<&str> = HashSet::new();
        for (associated, ids) in self.ledger.entries() {
            for id in ids {
                if !checked.insert(id.as_str()) {
                    continue;
                }
                let node = NodeId::new(id.as_str())
                    .map_err(|e| IdReferenceError::infrastructure(shock_type(), e.to_string()))?;
                let acl = match caller.acls(&node) {
                    Ok(acl) => acl,
                    Err(BlobstoreError::Unauthorized(_)) => {
                        return Err(IdReferenceError::validation(
                            shock_type(),
                            associated,
                            id.as_str(),
                            &[],
                            format!("User {caller_user} cannot read Shock node {id}"),
                        ));
                    }
                    Err(BlobstoreError::NoSuchNode(_)) => {
                        return Err(IdReferenceError::validation(
                            shock_type(),
                            associated,
                            id.as_str(),
                            &[],
                            format!("Shock node {id} does not exist"),
                        ));
                    }
                    Err(BlobstoreError::Io(m)) => {
                        return Err(IdReferenceError::infrastructure(
                            shock_type(),
                            format!(
                                "There was an I/O problem while attempting to contact \
                                 the Shock service to process IDs: {m}"
                            ),
                        ));
                    }
                    Err(e) => {
                        return Err(IdReferenceError::infrastructure(
                            shock_type(),
                            format!(
                                "The Shock service reported a problem while attempting \
                                 to process IDs: {e}"
                            ),
                        ));
                    }
                };
                if acl.owner != admin_user {
                    to_copy.push(id.clone());
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
            if to_copy.contains(&id) {
                let node = NodeId::new(id.as_str())
                    .map_err(|e| IdReferenceError::infrastructure(shock_type(), e.to_string()))?;
                let copied = admin.copy_node(&node).map_err(copy_error)?;
                tracing::info!(node = %id, copy = %copied, "copied Shock node");
                self.ledger.record_remap(&id, copied.as_str());
            } else {
                self.ledger.record_remap(&id, id.clone());
            }
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

#[cfg(test)]
mod tests {
    use super::super::client::NodeAcl;
    use super::super::testutil::{Call, FakeBlobstore};
    use super::*;

    const NODE: &str = "4d2bf7cc-9d20-4d31-bb8e-f54e9348b8cb";
    const COPY: &str = "9f0a14b6-01ce-47db-a7c4-a9a9ee2a02f0";

    fn factory_with(fake: &Arc<FakeBlobstore>) -> ShockIdHandlerFactory {
        let client: Arc<dyn BlobstoreClient> = fake.clone();
        ShockIdHandlerFactory::new(Some(client))
    }

    fn handler(factory: &ShockIdHandlerFactory) -> Box<dyn IdReferenceHandler<String>> {
        factory
            .create_handler(Some(&AuthToken::new("alice", "tok")))
            .unwrap()
    }

    fn owned_by(owner: &str, read: &[&str]) -> NodeAcl {
        NodeAcl {
            owner: owner.to_string(),
            read: read.iter().map(|s| s.to_string()).collect(),
            ..NodeAcl::default()
        }
    }

    #[test]
    fn test_add_id_without_connection_is_validation_error() {
        let factory = ShockIdHandlerFactory::new(None);
        let mut h = handler(&factory);
        let err = h.add_id(&"obj1".to_string(), NODE, &[]).unwrap_err();
        match err {
            IdReferenceError::Validation { message, .. } => {
                assert!(message.starts_with(&format!("Found shock id {NODE}.")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_add_id_rejects_malformed_id() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        let mut h = handler(&factory_with(&fake));
        let err = h.add_id(&"obj1".to_string(), "nope", &[]).unwrap_err();
        match err {
            IdReferenceError::Parse { message, .. } => {
                assert_eq!(message, "Illegal shock ID: nope");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_process_copies_readable_node_and_remaps_to_copy() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        // merely readable, not owned by the caller
        fake.insert_node(NODE, owned_by("bob", &["alice"]));
        fake.set_copy_target(NODE, COPY);
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        h.process_ids().unwrap();

        assert_eq!(h.remapped_id(NODE).unwrap(), RemappedId::new(COPY));
        assert_eq!(fake.node_acl(COPY).unwrap().owner, "wsadmin");
        // the original node is untouched
        assert_eq!(fake.node_acl(NODE).unwrap().owner, "bob");

        let calls = fake.calls();
        assert_eq!(
            calls,
            vec![
                Call::Acls {
                    user: "alice".to_string(),
                    node: NODE.to_string()
                },
                Call::Copy {
                    user: "wsadmin".to_string(),
                    node: NODE.to_string()
                },
            ]
        );
    }

    #[test]
    fn test_process_skips_copy_for_admin_owned_node() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        fake.insert_node(NODE, owned_by("wsadmin", &["alice"]));
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        h.process_ids().unwrap();

        assert_eq!(h.remapped_id(NODE).unwrap(), RemappedId::new(NODE));
        assert!(!fake
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Copy { .. })));
    }

    #[test]
    fn test_process_unreadable_node() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        fake.insert_node(NODE, owned_by("bob", &[]));
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        let err = h.process_ids().unwrap_err();
        match err {
            IdReferenceError::Validation { message, .. } => {
                assert_eq!(message, format!("User alice cannot read Shock node {NODE}"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_process_missing_node() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        let err = h.process_ids().unwrap_err();
        match err {
            IdReferenceError::Validation { message, .. } => {
                assert_eq!(message, format!("Shock node {NODE} does not exist"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_copy_failure_is_infrastructure_error() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        fake.insert_node(NODE, owned_by("bob", &["alice"]));
        fake.fail_copy(BlobstoreError::Io("broken pipe".to_string()));
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        let err = h.process_ids().unwrap_err();
        match err {
            IdReferenceError::Infrastructure { message, .. } => {
                assert!(message.contains("copy nodes"));
                assert!(message.contains("broken pipe"));
            }
            other => panic!("expected infrastructure error, got {other:?}"),
        }
    }

    #[test]
    fn test_shared_node_copied_once() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        fake.insert_node(NODE, owned_by("bob", &["alice"]));
        fake.set_copy_target(NODE, COPY);
        let mut h = handler(&factory_with(&fake));
        h.add_id(&"obj1".to_string(), NODE, &[]).unwrap();
        h.add_id(&"obj2".to_string(), NODE, &[]).unwrap();
        h.process_ids().unwrap();
        let copies = fake
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Copy { .. }))
            .count();
        assert_eq!(copies, 1);
        for obj in ["obj1", "obj2"] {
            let ids = h.remapped_ids(&obj.to_string()).unwrap();
            assert!(ids.contains(&RemappedId::new(COPY)));
        }
    }

    #[test]
    fn test_dependency_status() {
        let fake = Arc::new(FakeBlobstore::new("wsadmin"));
        fake.set_version(Err(BlobstoreError::Io("timed out".to_string())));
        let factory = factory_with(&fake);
        let status = IdReferenceHandlerFactory::<String>::dependency_status(&factory);
        assert_eq!(status.len(), 1);
        assert!(!status[0].ok);
        assert_eq!(status[0].name, "Shock");
        assert_eq!(status[0].version, "Unknown");
    }
}
