//! A recording in-memory blob store for handler tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use idref_core::AuthToken;

use super::client::{AclKind, BlobstoreClient, BlobstoreError, NodeAcl, NodeId};

/// One recorded client call, tagged with the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Acls {
        user: String,
        node: String,
    },
    AddAcl {
        user: String,
        node: String,
        users: Vec<String>,
        kind: AclKind,
    },
    RemoveAcl {
        user: String,
        node: String,
        users: Vec<String>,
        kind: AclKind,
    },
    Copy {
        user: String,
        node: String,
    },
    SetPublic {
        user: String,
        node: String,
        readable: bool,
    },
}

#[derive(Default)]
struct State {
    nodes: HashMap<String, NodeAcl>,
    copies: HashMap<String, String>,
    calls: Vec<Call>,
    fail_acls: Option<BlobstoreError>,
    fail_add: Option<BlobstoreError>,
    fail_remove: Option<BlobstoreError>,
    fail_copy: Option<BlobstoreError>,
    fail_public: Option<BlobstoreError>,
    version: Option<Result<String, BlobstoreError>>,
}

/// A fake blob store. Clones produced by `with_token` share the same state,
/// so tests can assert on calls made through rebound clients.
pub(crate) struct FakeBlobstore {
    state: Arc<Mutex<State>>,
    acting: String,
}

impl FakeBlobstore {
    pub(crate) fn new(acting_user: &str) -> Self {
        FakeBlobstore {
            state: Arc::new(Mutex::new(State::default())),
            acting: acting_user.to_string(),
        }
    }

    pub(crate) fn insert_node(&self, node: &str, acl: NodeAcl) {
        self.state.lock().nodes.insert(node.to_string(), acl);
    }

    /// Predetermine the ID returned when `from` is copied.
    pub(crate) fn set_copy_target(&self, from: &str, to: &str) {
        self.state
            .lock()
            .copies
            .insert(from.to_string(), to.to_string());
    }

    pub(crate) fn fail_acls(&self, err: BlobstoreError) {
        self.state.lock().fail_acls = Some(err);
    }

    pub(crate) fn fail_add(&self, err: BlobstoreError) {
        self.state.lock().fail_add = Some(err);
    }

    pub(crate) fn fail_public(&self, err: BlobstoreError) {
        self.state.lock().fail_public = Some(err);
    }

    pub(crate) fn fail_remove(&self, err: BlobstoreError) {
        self.state.lock().fail_remove = Some(err);
    }

    pub(crate) fn fail_copy(&self, err: BlobstoreError) {
        self.state.lock().fail_copy = Some(err);
    }

    pub(crate) fn set_version(&self, version: Result<String, BlobstoreError>) {
        self.state.lock().version = Some(version);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn node_acl(&self, node: &str) -> Option<NodeAcl> {
        self.state.lock().nodes.get(node).cloned()
    }

    fn lookup(state: &State, node: &NodeId, acting: &str) -> Result<NodeAcl, BlobstoreError> {
        let acl = state
            .nodes
            .get(node.as_str())
            .ok_or_else(|| BlobstoreError::NoSuchNode(node.to_string()))?;
        let readable = acl.owner == acting
            || acl.read.iter().any(|u| u == acting)
            || acl.write.iter().any(|u| u == acting);
        if !readable {
            return Err(BlobstoreError::Unauthorized(format!(
                "user {acting} may not read node {node}"
            )));
        }
        Ok(acl.clone())
    }
}

impl BlobstoreClient for FakeBlobstore {
    fn acting_user(&self) -> &str {
        &self.acting
    }

    fn with_token(&self, token: &AuthToken) -> Result<Box<dyn BlobstoreClient>, BlobstoreError> {
        Ok(Box::new(FakeBlobstore {
            state: Arc::clone(&self.state),
            acting: token.user_name().to_string(),
        }))
    }

    fn acls(&self, node: &NodeId) -> Result<NodeAcl, BlobstoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Acls {
            user: self.acting.clone(),
            node: node.to_string(),
        });
        if let Some(err) = state.fail_acls.clone() {
            return Err(err);
        }
        Self::lookup(&state, node, &self.acting)
    }

    fn add_to_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::AddAcl {
            user: self.acting.clone(),
            node: node.to_string(),
            users: users.to_vec(),
            kind,
        });
        if let Some(err) = state.fail_add.clone() {
            return Err(err);
        }
        let acl = state
            .nodes
            .get_mut(node.as_str())
            .ok_or_else(|| BlobstoreError::NoSuchNode(node.to_string()))?;
        match kind {
            AclKind::Owner => {
                if let Some(user) = users.first() {
                    acl.owner = user.clone();
                }
            }
            AclKind::Read => acl.read.extend(users.iter().cloned()),
            AclKind::Write => acl.write.extend(users.iter().cloned()),
            AclKind::Delete => acl.delete.extend(users.iter().cloned()),
        }
        Ok(acl.clone())
    }

    fn remove_from_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveAcl {
            user: self.acting.clone(),
            node: node.to_string(),
            users: users.to_vec(),
            kind,
        });
        if let Some(err) = state.fail_remove.clone() {
            return Err(err);
        }
        let acl = state
            .nodes
            .get_mut(node.as_str())
            .ok_or_else(|| BlobstoreError::NoSuchNode(node.to_string()))?;
        let list = match kind {
            AclKind::Read => &mut acl.read,
            AclKind::Write => &mut acl.write,
            AclKind::Delete => &mut acl.delete,
            AclKind::Owner => return Err(BlobstoreError::Remote("cannot remove owner".into())),
        };
        list.retain(|u| !users.contains(u));
        Ok(acl.clone())
    }

    fn copy_node(&self, node: &NodeId) -> Result<NodeId, BlobstoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Copy {
            user: self.acting.clone(),
            node: node.to_string(),
        });
        if let Some(err) = state.fail_copy.clone() {
            return Err(err);
        }
        if !state.nodes.contains_key(node.as_str()) {
            return Err(BlobstoreError::NoSuchNode(node.to_string()));
        }
        let new_id = state
            .copies
            .get(node.as_str())
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        state.nodes.insert(
            new_id.clone(),
            NodeAcl {
                owner: self.acting.clone(),
                ..NodeAcl::default()
            },
        );
        NodeId::new(new_id)
    }

    fn set_publicly_readable(&self, node: &NodeId, readable: bool) -> Result<(), BlobstoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::SetPublic {
            user: self.acting.clone(),
            node: node.to_string(),
            readable,
        });
        if let Some(err) = state.fail_public.clone() {
            return Err(err);
        }
        Ok(())
    }

    fn remote_version(&self) -> Result<String, BlobstoreError> {
        self.state
            .lock()
            .version
            .clone()
            .unwrap_or_else(|| Ok("1.0.0".to_string()))
    }
}
