//! Handle-registry ID handling (ID type `handle`).
//!
//! Handle IDs are non-negative integers naming records in the handle
//! registry. Processing is a single batch readability check with the caller's
//! credentials; the registry only answers whether *all* of the handles are
//! readable, so a negative answer fails the whole call rather than one
//! identifier. Handles are never transferred and remap to themselves.

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

/// The ID type handled by [`HandleIdHandlerFactory`].
pub fn handle_type() -> IdReferenceType {
    IdReferenceType::new_unchecked("handle")
}

/// Errors from the handle service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The configured service URL is not valid.
    #[error("invalid handle service URL: {0}")]
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

impl From<RpcError> for HandleError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::InvalidUrl(u) => HandleError::InvalidUrl(u),
            RpcError::Unauthorized(m) => HandleError::Unauthorized(m),
            RpcError::Server(m) => HandleError::Remote(m),
            RpcError::Io(m) => HandleError::Io(m),
        }
    }
}

/// Synchronous client for the handle registry.
pub trait HandleServiceClient: Send + Sync {
    /// Whether all of the given handles are readable with the given
    /// credentials.
    fn are_readable(&self, token: &AuthToken, handles: &[i64]) -> std::result::Result<bool, HandleError>;

    /// Make the records behind the handles publicly readable.
    fn set_public_read(&self, handles: &[i64]) -> std::result::Result<(), HandleError>;

    /// Grant a user read permission on the records behind the handles.
    fn add_read_acl(&self, handles: &[i64], user: &str) -> std::result::Result<(), HandleError>;

    /// The version reported by the service.
    fn remote_version(&self) -> std::result::Result<String, HandleError>;
}

#[derive(Deserialize)]
struct HandleServiceStatus {
    version: String,
}

/// JSON-RPC implementation of [`HandleServiceClient`].
///
/// Readability checks run with the caller's token; ACL mutations run with the
/// administrative token the client was constructed with.
pub struct JsonRpcHandleClient {
    rpc: JsonRpcClient,
    admin_token: AuthToken,
}

impl JsonRpcHandleClient {
    /// Create a client for the service at `url`.
    pub fn new(url: &str, admin_token: AuthToken) -> std::result::Result<Self, HandleError> {
        let rpc = JsonRpcClient::new(url)?;
        Ok(JsonRpcHandleClient { rpc, admin_token })
    }
}

impl HandleServiceClient for JsonRpcHandleClient {
    fn are_readable(&self, token: &AuthToken, handles: &[i64]) -> std::result::Result<bool, HandleError> {
        let (readable,): (i64,) = self.rpc.call(
            "AbstractHandle.are_readable",
            &json!([handles]),
            Some(token.secret()),
        )?;
        // 0 = false, anything else = true
        Ok(readable != 0)
    }

    fn set_public_read(&self, handles: &[i64]) -> std::result::Result<(), HandleError> {
        self.rpc.call_void(
            "AbstractHandle.set_public_read",
            &json!([handles]),
            Some(self.admin_token.secret()),
        )?;
        Ok(())
    }

    fn add_read_acl(&self, handles: &[i64], user: &str) -> std::result::Result<(), HandleError> {
        self.rpc.call_void(
            "AbstractHandle.add_read_acl",
            &json!([handles, user]),
            Some(self.admin_token.secret()),
        )?;
        Ok(())
    }

    fn remote_version(&self) -> std::result::Result<String, HandleError> {
        let (status,): (HandleServiceStatus,) = self.rpc.call(
            "AbstractHandle.status",
            &json!([]),
            Some(self.admin_token.secret()),
        )?;
        Ok(status.version)
    }
}

/// Factory for handle ID handlers.
///
/// Construct with `None` to run without a handle service connection; handlers
/// then fail each collected ID with a "not configured" validation error.
pub struct HandleIdHandlerFactory {
    client: Option<Arc<dyn HandleServiceClient>>,
}

impl HandleIdHandlerFactory {
    /// Create a factory backed by the given client, if any.
    pub fn new(client: Option<Arc<dyn HandleServiceClient>>) -> Self {
        HandleIdHandlerFactory { client }
    }
}

impl<T: AssociatedKey + 'static> IdReferenceHandlerFactory<T> for HandleIdHandlerFactory {
    fn id_type(&self) -> IdReferenceType {
        handle_type()
    }

    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<T>>> {
        let token = token
            .ok_or_else(|| IdReferenceError::MissingArgument("userToken".to_string()))?
            .clone();
        Ok(Box::new(HandleIdHandler {
            client: self.client.clone(),
            token,
            ledger: IdLedger::new(),
        }))
    }

    fn create_permission_handler(
        &self,
        user: Option<&str>,
    ) -> Box<dyn IdReferencePermissionHandler> {
        Box::new(HandlePermissionHandler {
            client: self.client.clone(),
            user: user.map(String::from),
        })
    }

    fn dependency_status(&self) -> Vec<DependencyStatus> {
        match &self.client {
            None => vec![],
            Some(client) => match client.remote_version() {
                Ok(version) => vec![DependencyStatus::new(true, "OK", "Handle service", version)],
                Err(e) => vec![DependencyStatus::new(
                    false,
                    e.to_string(),
                    "Handle service",
                    "Unknown",
                )],
            },
        }
    }
}

struct HandleIdHandler<T: AssociatedKey> {
    client: Option<Arc<dyn HandleServiceClient>>,
    token: AuthToken,
    ledger: IdLedger<T>,
}

fn parse_handle<T: AssociatedKey>(
    associated: &T,
    id: &str,
    attributes: &[String],
) -> Result<i64> {
    let parsed: i64 = id.parse().map_err(|_| {
        IdReferenceError::parse(
            handle_type(),
            associated,
            id,
            attributes,
            format!("Illegal handle id {id}, expected an integer"),
        )
    })?;
    if parsed < 0 {
        return Err(IdReferenceError::validation(
            handle_type(),
            associated,
            id,
            attributes,
            format!("Illegal handle id {parsed}, must be positive"),
        ));
    }
    Ok(parsed)
}

impl<T: AssociatedKey> IdReferenceHandler<T> for HandleIdHandler<T> {
    fn id_type(&self) -> IdReferenceType {
        handle_type()
    }

    fn add_id(&mut self, associated: &T, id: &str, attributes: &[String]) -> Result<bool> {
        if self.client.is_none() {
            return Err(IdReferenceError::validation(
                handle_type(),
                associated,
                id,
                attributes,
                format!(
                    "Found handle id {id}. There is no connection configured for the \
                     handle service and so objects containing handle IDs cannot be \
                     processed."
                ),
            ));
        }
        let parsed = parse_handle(associated, id, attributes)?;
        // IDs are stored in canonical form so "007" and "7" collapse
        self.ledger.insert(associated, &parsed.to_string())
    }

    fn process_ids(&mut self) -> Result<()> {
        if self.ledger.is_empty() {
            self.ledger.mark_processed();
            return Ok(());
        }
        let Some(client) = self.client.clone() else {
            return Err(IdReferenceError::infrastructure(
                handle_type(),
                "no handle service connection is configured",
            ));
        };
        let handles: Vec<i64> = self
            .ledger
            .distinct_ids()
            .into_iter()
            .filter_map(|id| id.parse().ok())
            .collect();
        let all_readable = client
            .are_readable(&self.token, &handles)
            .map_err(|e| match e {
                HandleError::Unauthorized(m) => IdReferenceError::infrastructure(
                    handle_type(),
                    format!("Authorization for the Handle Service failed. The server said: {m}"),
                ),
                HandleError::Io(m) => IdReferenceError::infrastructure(
                    handle_type(),
                    format!(
                        "There was a communication error while trying to contact the \
                         Handle Service: {m}"
                    ),
                ),
                other => IdReferenceError::infrastructure(
                    handle_type(),
                    format!(
                        "There was an unexpected error while trying to contact the \
                         Handle Service: {other}"
                    ),
                ),
            })?;
        if !all_readable {
            return Err(IdReferenceError::infrastructure(
                handle_type(),
                "The Handle Service reported that at least one of the handles contained \
                 in the objects in this call was not accessible with your credentials. \
                 The call cannot complete.",
            ));
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
        // canonicalize so the lookup form matches the stored form
        let canonical: i64 = original_id.parse().map_err(|_| {
            IdReferenceError::NotFound(format!(
                "no such ID contained in this handler: {original_id}"
            ))
        })?;
        self.ledger.remapped_id(&canonical.to_string())
    }

    fn remapped_ids(&self, associated: &T) -> Result<HashSet<RemappedId>> {
        self.ledger.remapped_ids(associated)
    }

    fn lock(&mut self) {
        self.ledger.lock();
    }
}

struct HandlePermissionHandler {
    client: Option<Arc<dyn HandleServiceClient>>,
    user: Option<String>,
}

impl IdReferencePermissionHandler for HandlePermissionHandler {
    fn add_read_permission(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let Some(client) = &self.client else {
            return Err(IdReferenceError::permission(
                "There is no connection configured for the handle service and handle \
                 IDs cannot be processed.",
            ));
        };
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let parsed: i64 = id.parse().map_err(|_| {
                IdReferenceError::permission(format!("Illegal handle ID: {id}"))
            })?;
            handles.push(parsed);
        }
        let result = match &self.user {
            None => client.set_public_read(&handles),
            Some(user) => client.add_read_acl(&handles, user),
        };
        result.map_err(|e| match e {
            HandleError::Io(m) => IdReferenceError::permission(format!(
                "There was an I/O problem while attempting to set handle ACLs: {m}"
            )),
            HandleError::Unauthorized(m) => IdReferenceError::permission(format!(
                "Unable to contact the Handle Service - the service credentials were \
                 rejected: {m}"
            )),
            other => IdReferenceError::permission(format!(
                "The Handle Service reported a problem while attempting to set handle \
                 ACLs: {other}"
            )),
        })
    }
}
