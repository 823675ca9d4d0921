//! HTTP implementation of the blob-store client.
//!
//! Talks the node/ACL REST API: `GET /node/{id}/acl/` to fetch ACLs,
//! `PUT`/`DELETE /node/{id}/acl/{kind}?users=…` to grant and revoke,
//! `PUT`/`DELETE /node/{id}/acl/public_read` for world-readability,
//! `POST /node` with a `copy_data` form field to copy a node, and a `GET` on
//! the service root for the version probe. Responses arrive in a
//! `{status, data, error}` envelope. No timeout or retry logic lives here
//! beyond the client's configured request timeout.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use idref_core::AuthToken;

use super::client::{AclKind, BlobstoreClient, BlobstoreError, NodeAcl, NodeId};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A blob-store client over HTTP, bound to one token.
#[derive(Debug)]
pub struct HttpBlobstoreClient {
    http: Client,
    base: reqwest::Url,
    token: AuthToken,
}

#[derive(Deserialize)]
struct Envelope<D> {
    data: Option<D>,
    error: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct WireUser {
    username: String,
}

#[derive(Deserialize)]
struct WireAcl {
    owner: WireUser,
    #[serde(default)]
    read: Vec<WireUser>,
    #[serde(default)]
    write: Vec<WireUser>,
    #[serde(default)]
    delete: Vec<WireUser>,
}

#[derive(Deserialize)]
struct WireNode {
    id: String,
}

#[derive(Deserialize)]
struct ServiceInfo {
    version: String,
}

fn usernames(users: Vec<WireUser>) -> Vec<String> {
    users.into_iter().map(|u| u.username).collect()
}

impl From<WireAcl> for NodeAcl {
    fn from(acl: WireAcl) -> Self {
        NodeAcl {
            owner: acl.owner.username,
            read: usernames(acl.read),
            write: usernames(acl.write),
            delete: usernames(acl.delete),
        }
    }
}

impl HttpBlobstoreClient {
    /// Create a client for the service at `url`, acting as the given token.
    pub fn new(url: &str, token: AuthToken) -> Result<Self, BlobstoreError> {
        let base = reqwest::Url::parse(url)
            .map_err(|_| BlobstoreError::InvalidUrl(url.to_string()))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BlobstoreError::Io(format!("could not build HTTP client: {e}")))?;
        Ok(HttpBlobstoreClient { http, base, token })
    }

    fn node_url(&self, node: &NodeId, suffix: &str) -> Result<reqwest::Url, BlobstoreError> {
        self.base
            .join(&format!("node/{node}{suffix}"))
            .map_err(|_| BlobstoreError::InvalidUrl(self.base.to_string()))
    }

    fn send<D: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        node: Option<&NodeId>,
    ) -> Result<D, BlobstoreError> {
        let resp = req
            .header("Authorization", format!("OAuth {}", self.token.secret()))
            .send()
            .map_err(|e| BlobstoreError::Io(e.to_string()))?;
        let status = resp.status();
        let env: Envelope<D> = resp
            .json()
            .map_err(|e| BlobstoreError::Io(format!("error parsing blobstore response: {e}")))?;
        let errmsg = || {
            env.error
                .as_ref()
                .map(|e| e.join("; "))
                .unwrap_or_else(|| format!("blobstore returned HTTP {status}"))
        };
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BlobstoreError::Unauthorized(errmsg()));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BlobstoreError::NoSuchNode(
                node.map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        if !status.is_success() || env.error.is_some() {
            return Err(BlobstoreError::Remote(errmsg()));
        }
        env.data
            .ok_or_else(|| BlobstoreError::Remote("no data in blobstore response".to_string()))
    }
}

impl BlobstoreClient for HttpBlobstoreClient {
    fn acting_user(&self) -> &str {
        self.token.user_name()
    }

    fn with_token(&self, token: &AuthToken) -> Result<Box<dyn BlobstoreClient>, BlobstoreError> {
        Ok(Box::new(HttpBlobstoreClient {
            http: self.http.clone(),
            base: self.base.clone(),
            token: token.clone(),
        }))
    }

    fn acls(&self, node: &NodeId) -> Result<NodeAcl, BlobstoreError> {
        let url = self.node_url(node, "/acl/")?;
        let acl: WireAcl = self.send(self.http.get(url), Some(node))?;
        Ok(acl.into())
    }

    fn add_to_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError> {
        let mut url = self.node_url(node, &format!("/acl/{}", kind.as_str()))?;
        url.query_pairs_mut().append_pair("users", &users.join(","));
        let acl: WireAcl = self.send(self.http.put(url), Some(node))?;
        Ok(acl.into())
    }

    fn remove_from_acl(
        &self,
        node: &NodeId,
        users: &[String],
        kind: AclKind,
    ) -> Result<NodeAcl, BlobstoreError> {
        let mut url = self.node_url(node, &format!("/acl/{}", kind.as_str()))?;
        url.query_pairs_mut().append_pair("users", &users.join(","));
        let acl: WireAcl = self.send(self.http.delete(url), Some(node))?;
        Ok(acl.into())
    }

    fn copy_node(&self, node: &NodeId) -> Result<NodeId, BlobstoreError> {
        let url = self
            .base
            .join("node")
            .map_err(|_| BlobstoreError::InvalidUrl(self.base.to_string()))?;
        let form = [("copy_data", node.as_str())];
        let copied: WireNode = self.send(self.http.post(url).form(&form), Some(node))?;
        NodeId::new(copied.id)
    }

    fn set_publicly_readable(&self, node: &NodeId, readable: bool) -> Result<(), BlobstoreError> {
        let url = self.node_url(node, "/acl/public_read")?;
        let req = if readable {
            self.http.put(url)
        } else {
            self.http.delete(url)
        };
        let _: WireAcl = self.send(req, Some(node))?;
        Ok(())
    }

    fn remote_version(&self) -> Result<String, BlobstoreError> {
        let resp = self
            .http
            .get(self.base.clone())
            .send()
            .map_err(|e| BlobstoreError::Io(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(BlobstoreError::Remote(format!(
                "blobstore returned HTTP {}",
                resp.status()
            )));
        }
        let info: ServiceInfo = resp
            .json()
            .map_err(|e| BlobstoreError::Io(format!("error parsing blobstore response: {e}")))?;
        Ok(info.version)
    }
}
