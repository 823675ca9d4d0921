//! Minimal JSON-RPC 1.1 plumbing shared by the handle and sample service
//! clients.
//!
//! Requests are POSTed as `{"version": "1.1", "id": ..., "method": ...,
//! "params": [...]}` with the token in the `Authorization` header. Both
//! services report failures in the response `error` object, usually alongside
//! a non-2xx HTTP status, so the body is parsed before the status is checked.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RpcError {
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),

    /// The service rejected the supplied credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The service executed the call and reported an error.
    #[error("{0}")]
    Server(String),

    /// Transport failure or unparseable response.
    #[error("{0}")]
    Io(String),
}

#[derive(Debug)]
pub(crate) struct JsonRpcClient {
    http: reqwest::blocking::Client,
    url: reqwest::Url,
}

#[derive(Deserialize)]
struct RpcResponse<D> {
    result: Option<D>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    message: String,
}

impl JsonRpcClient {
    pub(crate) fn new(url: &str) -> Result<Self, RpcError> {
        let url = reqwest::Url::parse(url).map_err(|_| RpcError::InvalidUrl(url.to_string()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Io(format!("could not build HTTP client: {e}")))?;
        Ok(JsonRpcClient { http, url })
    }

    /// Issue a call and deserialize its result. `params` supplies the full
    /// positional parameter list.
    pub(crate) fn call<P: Serialize, D: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
        token: Option<&str>,
    ) -> Result<D, RpcError> {
        let response: RpcResponse<D> = self.send(method, params, token)?;
        response
            .result
            .ok_or_else(|| RpcError::Io(format!("no result in response to {method}")))
    }

    /// Issue a call whose result, if any, is discarded.
    pub(crate) fn call_void<P: Serialize>(
        &self,
        method: &str,
        params: &P,
        token: Option<&str>,
    ) -> Result<(), RpcError> {
        let _: RpcResponse<serde_json::Value> = self.send(method, params, token)?;
        Ok(())
    }

    fn send<P: Serialize, D: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
        token: Option<&str>,
    ) -> Result<RpcResponse<D>, RpcError> {
        let body = json!({
            "version": "1.1",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });
        let mut req = self.http.post(self.url.clone()).json(&body);
        if let Some(token) = token {
            req = req.header("Authorization", token);
        }
        let resp = req.send().map_err(|e| RpcError::Io(e.to_string()))?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::Unauthorized(format!(
                "service returned HTTP {status}"
            )));
        }
        let parsed: RpcResponse<D> = resp.json().map_err(|e| {
            if status.is_success() {
                RpcError::Io(format!("error parsing response to {method}: {e}"))
            } else {
                RpcError::Io(format!("service returned HTTP {status}"))
            }
        })?;
        if let Some(error) = parsed.error {
            return Err(RpcError::Server(error.message));
        }
        if !status.is_success() {
            return Err(RpcError::Io(format!("service returned HTTP {status}")));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_url() {
        let err = JsonRpcClient::new("::not a url::").unwrap_err();
        assert_eq!(err, RpcError::InvalidUrl("::not a url::".to_string()));
    }
}
