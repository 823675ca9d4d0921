//! Sample-registry ID handling (ID type `sample`).
//!
//! Sample records carry their own ACLs with an owner and an admin list.
//! Processing fetches each distinct sample's ACLs with administrative
//! credentials and requires the caller to be the owner or an admin, failing
//! the offending identifier otherwise. Samples are never transferred and
//! remap to themselves. The registry has no bulk ACL primitives, so
//! permission propagation is one call per sample and a failure partway
//! through is not rolled back.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use idref_core::{
    AssociatedKey, AuthToken, DependencyStatus, IdLedger, IdReferenceError, IdReferenceHandler,
    IdReferenceHandlerFactory, IdReferencePermissionHandler, IdReferenceType, RemappedId, Result,
};

use crate::rpc::{JsonRpcClient, RpcError};

/// The ID type handled by [`SampleIdHandlerFactory`].
pub fn sample_type() -> IdReferenceType {
    IdReferenceType::new_unchecked("sample")
}

/// Errors from the sample service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The configured service URL is not valid.
    #[error("invalid sample service URL: {0}")]
    InvalidUrl(String),

    /// The service rejected the supplied credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The service executed the call and reported an error.
    #[error("{0}")]
    Remote(String),

    /// A transport-level failure talking to the service.
    #[error("{0}")]
    Io(String),
}

impl From<RpcError> for SampleError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::InvalidUrl(u) => SampleError::InvalidUrl(u),
            RpcError::Unauthorized(m) => SampleError::Unauthorized(m),
            RpcError::Server(m) => SampleError::Remote(m),
            RpcError::Io(m) => SampleError::Io(m),
        }
    }
}

/// A sample's access-control lists, by user name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SampleAcls {
    /// The sample's owner.
    pub owner: String,
    /// Users with administrative permission.
    #[serde(default)]
    pub admin: Vec<String>,
    /// Users with write permission.
    #[serde(default)]
    pub write: Vec<String>,
    /// Users with read permission.
    #[serde(default)]
    pub read: Vec<String>,
}

/// Synchronous client for the sample registry, acting with administrative
/// credentials.
pub trait SampleServiceClient: Send + Sync {
    /// Fetch a sample's ACLs.
    fn sample_acls(&self, id: &str) -> std::result::Result<SampleAcls, SampleError>;

    /// Make a sample publicly readable.
    fn set_public_read(&self, id: &str) -> std::result::Result<(), SampleError>;

    /// Grant a user read permission on a sample, never downgrading an
    /// existing higher permission.
    fn add_read_acl(&self, id: &str, user: &str) -> std::result::Result<(), SampleError>;

    /// The version reported by the service.
    fn remote_version(&self) -> std::result::Result<String, SampleError>;
}

#[derive(Deserialize)]
struct SampleServiceStatus {
    version: String,
}

/// JSON-RPC implementation of [`SampleServiceClient`].
pub struct JsonRpcSampleClient {
    rpc: JsonRpcClient,
    admin_token: AuthToken,
}

impl JsonRpcSampleClient {
    /// Create a client for the service at `url`, acting as the given
    /// administrative token.
    pub fn new(url: &str, admin_token: AuthToken) -> std::result::Result<Self, SampleError> {
        let rpc = JsonRpcClient::new(url)?;
        Ok(JsonRpcSampleClient { rpc, admin_token })
    }
}

impl SampleServiceClient for JsonRpcSampleClient {
    fn sample_acls(&self, id: &str) -> std::result::Result<SampleAcls, SampleError> {
        let (acls,): (SampleAcls,) = self.rpc.call(
            "SampleService.get_sample_acls",
            &json!([{"id": id, "as_admin": 1}]),
            Some(self.admin_token.secret()),
        )?;
        Ok(acls)
    }

    fn set_public_read(&self, id: &str) -> std::result::Result<(), SampleError> {
        self.rpc.call_void(
            "SampleService.update_sample_acls",
            &json!([{"id": id, "public_read": 1, "as_admin": 1}]),
            Some(self.admin_token.secret()),
        )?;
        Ok(())
    }

    fn add_read_acl(&self, id: &str, user: &str) -> std::result::Result<(), SampleError> {
        self.rpc.call_void(
            "SampleService.update_sample_acls",
            &json!([{"id": id, "read": [user], "at_least": 1, "as_admin": 1}]),
            Some(self.admin_token.secret()),
        )?;
        Ok(())
    }

    fn remote_version(&self) -> std::result::Result<String, SampleError> {
        let (status,): (SampleServiceStatus,) = self.rpc.call(
            "SampleService.status",
            &json!([]),
            Some(self.admin_token.secret()),
        )?;
        Ok(status.version)
    }
}

/// Factory for sample ID handlers.
///
/// Construct with `None` to run without a sample service connection; handlers
/// then fail each collected ID with a "not configured" validation error.
pub struct SampleIdHandlerFactory {
    client: Option<Arc<dyn SampleServiceClient>>,
}

impl SampleIdHandlerFactory {
    /// Create a factory backed by the given administrative client, if any.
    pub fn new(client: Option<Arc<dyn SampleServiceClient>>) -> Self {
        SampleIdHandlerFactory { client }
    }
}

impl<T: AssociatedKey + 'static> IdReferenceHandlerFactory<T> for SampleIdHandlerFactory {
    fn id_type(&self) -> IdReferenceType {
        sample_type()
    }

    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<T>>> {
        let token = token
            .ok_or_else(|| IdReferenceError::MissingArgument("userToken".to_string()))?
            .clone();
        Ok(Box::new(SampleIdHandler {
            client: self.client.clone(),
            token,
            ledger: IdLedger::new(),
        }))
    }

    fn create_permission_handler(
        &self,
        user: Option<&str>,
    ) -> Box<dyn IdReferencePermissionHandler> {
        Box::new(SamplePermissionHandler {
            client: self.client.clone(),
            user: user.map(String::from),
        })
    }

    fn dependency_status(&self) -> Vec<DependencyStatus> {
        match &self.client {
            None => vec![],
            Some(client) => match client.remote_version() {
                Ok(version) => vec![DependencyStatus::new(true, "OK", "Sample service", version)],
                Err(e) => vec![DependencyStatus::new(
                    false,
                    e.to_string(),
                    "Sample service",
                    "Unknown",
                )],
            },
        }
    }
}

struct SampleIdHandler<T: AssociatedKey> {
    client: Option<Arc<dyn SampleServiceClient>>,
    token: AuthToken,
    ledger: IdLedger<T>,
}

impl<T: AssociatedKey> IdReferenceHandler<T> for SampleIdHandler<T> {
    fn id_type(&self) -> IdReferenceType {
        sample_type()
    }

    fn add_id(&mut self, associated: &T, id: &str, attributes: &[String]) -> Result<bool> {
        if self.client.is_none() {
            return Err(IdReferenceError::validation(
                sample_type(),
                associated,
                id,
                attributes,
                format!(
                    "Found sample id {id}. There is no connection configured for the \
                     sample service and so objects containing sample IDs cannot be \
                     processed."
                ),
            ));
        }
        self.ledger.insert(associated, id)
    }

    fn process_ids(&mut self) -> Result<()> {
        if self.ledger.is_empty() {
            self.ledger.mark_processed();
            return Ok(());
        }
        let Some(client) = self.client.clone() else {
            return Err(IdReferenceError::infrastructure(
                sample_type(),
                "no sample service connection is configured",
            ));
        };
        // The framework has already validated the token, so the user name it
        // carries is trusted rather than re-verified with an auth call.
        let user = self.token.user_name().to_string();
        let mut checked: HashSet<&str> = HashSet::new();
        for (associated, ids) in self.ledger.entries() {
            for id in ids {
                if !checked.insert(id.as_str()) {
                    continue;
                }
                let acls = match client.sample_acls(id) {
                    Ok(acls) => acls,
                    Err(SampleError::Remote(m)) => {
                        return Err(IdReferenceError::validation(
                            sample_type(),
                            associated,
                            id.as_str(),
                            &[],
                            format!(
                                "The Sample Service reported a problem while attempting \
                                 to get Sample ACLs: {m}"
                            ),
                        ));
                    }
                    Err(SampleError::Unauthorized(m)) => {
                        return Err(IdReferenceError::infrastructure(
                            sample_type(),
                            format!(
                                "Unable to contact the Sample Service - the service \
                                 credentials were rejected: {m}"
                            ),
                        ));
                    }
                    Err(SampleError::Io(m)) => {
                        return Err(IdReferenceError::infrastructure(
                            sample_type(),
                            format!(
                                "There was a communication error while trying to contact \
                                 the Sample Service: {m}"
                            ),
                        ));
                    }
                    Err(e) => {
                        return Err(IdReferenceError::infrastructure(
                            sample_type(),
                            format!(
                                "There was an unexpected error while trying to contact \
                                 the Sample Service: {e}"
                            ),
                        ));
                    }
                };
                if acls.owner != user && !acls.admin.iter().any(|a| a == &user) {
                    return Err(IdReferenceError::validation(
                        sample_type(),
                        associated,
                        id.as_str(),
                        &[],
                        format!(
                            "User {user} does not have administrative permissions for \
                             sample {id}"
                        ),
                    ));
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

struct SamplePermissionHandler {
    client: Option<Arc<dyn SampleServiceClient>>,
    user: Option<String>,
}

impl IdReferencePermissionHandler for SamplePermissionHandler {
    fn add_read_permission(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let Some(client) = &self.client else {
            return Err(IdReferenceError::permission(
                "There is no connection configured for the sample service and sample \
                 IDs cannot be processed.",
            ));
        };
        for id in ids {
            let result = match &self.user {
                None => client.set_public_read(id),
                Some(user) => client.add_read_acl(id, user),
            };
            result.map_err(|e| match e {
                SampleError::Io(m) => IdReferenceError::permission(format!(
                    "There was an I/O problem while attempting to set Sample ACLs: {m}"
                )),
                SampleError::Unauthorized(m) => IdReferenceError::permission(format!(
                    "Unable to contact the Sample Service - the service credentials \
                     were rejected: {m}"
                )),
                SampleError::Remote(m) => IdReferenceError::permission(format!(
                    "The Sample Service reported a problem while attempting to set \
                     Sample ACLs: {m}"
                )),
                other => IdReferenceError::permission(format!(
                    "There was an unexpected problem while contacting the Sample \
                     Service to set Sample ACLs: {other}"
                )),
            })?;
        }
        Ok(())
    }
}
