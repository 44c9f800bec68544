//! Vault token backend
//!
//! Creates response-wrapped, no-parent tokens via Vault's HTTP API. The
//! issuance handler only sees the [`SecretBackend`] trait; tests mock it and
//! production uses [`VaultBackend`].
//!
//! # Wrapping
//!
//! The backend is asked for a *wrapped* token: Vault returns a short-lived
//! single-use wrapping token instead of the real one. Only the wrap-info
//! envelope ever leaves this process; the real token is materialized by the
//! receiver's unwrap call.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Secret backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP request to Vault failed
    #[error("vault request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Vault answered with a non-success status
    #[error("vault returned {status}: {body}")]
    Api {
        /// HTTP status code from Vault
        status: u16,
        /// Response body text
        body: String,
    },

    /// Vault answered 200 but without a wrap_info envelope
    #[error("vault response carried no wrap_info; response wrapping was not applied")]
    NotWrapped,
}

/// Token creation request sent to the backend
///
/// Derived once per issuance request from the workload's annotations.
/// `ttl` and `period` are raw duration strings; Vault owns their parsing.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TokenRequest {
    /// Policies to scope the token to
    pub policies: Vec<String>,
    /// Token lifetime, uninterpreted
    pub ttl: String,
    /// Renewal period, uninterpreted (set equal to `ttl`)
    pub period: String,
    /// Display name shown in Vault's audit log
    pub display_name: String,
    /// Audit/binding metadata (host IP, namespace, pod IP, name, UID)
    pub metadata: BTreeMap<String, String>,
    /// Issue an orphan token with no lineage to our own credential
    pub no_parent: bool,
}

/// Wrap-info envelope returned by Vault for a wrapped token
///
/// This is the only structure delivered to the workload. `token` here is the
/// single-use wrapping token, not the issued credential.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WrapInfo {
    /// Single-use wrapping token
    pub token: String,
    /// Accessor of the wrapping token
    #[serde(default)]
    pub accessor: String,
    /// Wrapping token lifetime in seconds
    pub ttl: u64,
    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub creation_time: String,
    /// Path the wrapped call was made against
    #[serde(default)]
    pub creation_path: String,
    /// Accessor of the wrapped (real) token
    #[serde(default)]
    pub wrapped_accessor: String,
}

impl fmt::Debug for WrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the wrapping token in debug output; the accessor is
        // enough for traceability.
        f.debug_struct("WrapInfo")
            .field("accessor", &self.accessor)
            .field("ttl", &self.ttl)
            .field("creation_time", &self.creation_time)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting wrapped-token creation
///
/// Implementations must be safe for concurrent use by multiple in-flight
/// issuance requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Create a wrapped, no-parent token scoped to the request's policies
    async fn create_wrapped_token(&self, request: &TokenRequest)
        -> Result<WrapInfo, BackendError>;
}

#[derive(Deserialize)]
struct CreateTokenResponse {
    #[serde(default)]
    wrap_info: Option<WrapInfo>,
}

/// Secret backend talking to a real Vault server
pub struct VaultBackend {
    http: reqwest::Client,
    addr: String,
    token: String,
    wrap_ttl: String,
}

impl VaultBackend {
    /// Create a backend client
    ///
    /// `addr` is the Vault base URL (e.g. `https://vault:8200`), `token` a
    /// Vault token permitted to create child tokens, and `wrap_ttl` the
    /// lifetime of the wrapping envelope (e.g. `60s`).
    pub fn new(
        addr: impl Into<String>,
        token: impl Into<String>,
        wrap_ttl: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            addr: addr.into().trim_end_matches('/').to_string(),
            token: token.into(),
            wrap_ttl: wrap_ttl.into(),
        })
    }
}

#[async_trait]
impl SecretBackend for VaultBackend {
    async fn create_wrapped_token(
        &self,
        request: &TokenRequest,
    ) -> Result<WrapInfo, BackendError> {
        let url = format!("{}/v1/auth/token/create", self.addr);
        let response = self
            .http
            .post(&url)
            .header("X-Vault-Token", &self.token)
            .header("X-Vault-Wrap-TTL", &self.wrap_ttl)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: CreateTokenResponse = response.json().await?;
        body.wrap_info.ok_or(BackendError::NotWrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Wrap-Info Secrecy Stories
    // ==========================================================================
    //
    // The wrapping token is credential material. If a WrapInfo ever reaches
    // a log sink via Debug formatting, the token value must not appear.

    /// Story: debug output never exposes the wrapping token
    #[test]
    fn story_debug_output_protects_wrapping_token() {
        let info = WrapInfo {
            token: "s.WRAPPINGTOKEN".to_string(),
            accessor: "accessor-1".to_string(),
            ttl: 60,
            creation_time: "2016-10-13T15:32:05Z".to_string(),
            creation_path: "auth/token/create".to_string(),
            wrapped_accessor: "accessor-2".to_string(),
        };

        let debug = format!("{:?}", info);
        assert!(
            !debug.contains("s.WRAPPINGTOKEN"),
            "Debug output must not expose the wrapping token"
        );
        assert!(
            debug.contains("accessor-1"),
            "Debug output should keep the accessor for traceability"
        );
    }

    /// Story: Vault's wrap_info response parses into our envelope
    ///
    /// Shape taken from Vault's documented response-wrapping output.
    #[test]
    fn story_vault_wrap_response_parses() {
        let body = r#"{
            "request_id": "",
            "lease_id": "",
            "renewable": false,
            "lease_duration": 0,
            "data": null,
            "wrap_info": {
                "token": "s.abcdef",
                "accessor": "acc-wrap",
                "ttl": 60,
                "creation_time": "2016-10-13T15:32:05.6789703Z",
                "creation_path": "auth/token/create",
                "wrapped_accessor": "acc-real"
            }
        }"#;

        let parsed: CreateTokenResponse = serde_json::from_str(body).unwrap();
        let info = parsed.wrap_info.expect("wrap_info present");
        assert_eq!(info.token, "s.abcdef");
        assert_eq!(info.ttl, 60);
        assert_eq!(info.wrapped_accessor, "acc-real");
    }

    /// Story: an unwrapped 200 response is a backend error
    ///
    /// If the wrap TTL header is dropped somewhere, Vault happily returns a
    /// raw token under `auth`. Treating that as success would push an
    /// unwrapped credential over the network.
    #[test]
    fn story_missing_wrap_info_is_detected() {
        let body = r#"{"auth": {"client_token": "s.RAWTOKEN"}}"#;
        let parsed: CreateTokenResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.wrap_info.is_none());

        let err = parsed.wrap_info.ok_or(BackendError::NotWrapped).unwrap_err();
        assert!(err.to_string().contains("no wrap_info"));
    }

    /// Story: the token request serializes with Vault's field names
    #[test]
    fn story_token_request_serializes_for_vault() {
        let request = TokenRequest {
            policies: vec!["read".to_string(), "write".to_string()],
            ttl: "72h".to_string(),
            period: "72h".to_string(),
            display_name: "web-1".to_string(),
            metadata: BTreeMap::from([("pod_name".to_string(), "web-1".to_string())]),
            no_parent: true,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["policies"], serde_json::json!(["read", "write"]));
        assert_eq!(value["ttl"], "72h");
        assert_eq!(value["period"], "72h");
        assert_eq!(value["no_parent"], true);
        assert_eq!(value["metadata"]["pod_name"], "web-1");
    }

    /// Story: trailing slashes in the Vault address are normalized
    #[test]
    fn story_vault_address_is_normalized() {
        let backend = VaultBackend::new("https://vault:8200/", "root", "60s").unwrap();
        assert_eq!(backend.addr, "https://vault:8200");
    }
}
