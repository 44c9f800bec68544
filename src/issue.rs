//! Credential issuance handler
//!
//! The core of credcourier: validates an inbound token request, resolves the
//! workload, derives policies and TTL from its annotations, creates a
//! wrapped token in the backend, and dispatches delivery as a detached task.
//!
//! Per request the sequence is strictly
//! `validate → resolve → derive → issue → dispatch`; any step failure aborts
//! the request with its mapped status and nothing is retried or compensated
//! (an issued-but-undelivered token is left to expire on its own).
//! `202 Accepted` means "issuance succeeded, delivery in flight", never
//! "delivery succeeded".

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::deliver::CredentialSink;
use crate::error::IssueError;
use crate::vault::{SecretBackend, TokenRequest};
use crate::workload::{LookupError, WorkloadLookup, WorkloadRecord};
use crate::{DEFAULT_TOKEN_TTL, POLICIES_ANNOTATION, TTL_ANNOTATION};

/// One inbound token request, taken from query parameters
///
/// Transient; constructed per call and never persisted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IssuanceRequest {
    /// Workload name (required; its absence is the only client error)
    pub name: Option<String>,
    /// Workload namespace (optional; empty means `"default"`)
    pub namespace: Option<String>,
}

/// Credential issuance handler
///
/// All collaborators are injected at construction; the handler itself holds
/// no mutable state and is safe to share across concurrent requests.
pub struct IssuanceHandler {
    lookup: Arc<dyn WorkloadLookup>,
    backend: Arc<dyn SecretBackend>,
    sink: Arc<dyn CredentialSink>,
}

impl IssuanceHandler {
    /// Create a handler over the given lookup, backend, and delivery sink
    pub fn new(
        lookup: Arc<dyn WorkloadLookup>,
        backend: Arc<dyn SecretBackend>,
        sink: Arc<dyn CredentialSink>,
    ) -> Self {
        Self {
            lookup,
            backend,
            sink,
        }
    }

    /// Handle one issuance request
    ///
    /// Returns `202 Accepted` once the wrapped token exists and delivery has
    /// been dispatched. The delivery task is detached: no join handle is
    /// kept, there is no cancellation path, and its outcome is visible only
    /// in the sink's logs.
    pub async fn handle(&self, request: IssuanceRequest) -> crate::Result<StatusCode> {
        let name = request
            .name
            .filter(|n| !n.is_empty())
            .ok_or(IssueError::MissingName)?;

        let namespace = match request.namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => ns,
            None => {
                info!(name = %name, "namespace missing or empty, using default");
                "default".to_string()
            }
        };

        let workload = self
            .lookup
            .get(&namespace, &name)
            .await
            .map_err(|e| match e {
                LookupError::NotFound => IssueError::WorkloadNotFound {
                    namespace: namespace.clone(),
                    name: name.clone(),
                },
                LookupError::Api(api) => IssueError::Lookup {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    message: api.to_string(),
                },
            })?;

        let token_request = derive_token_request(&workload)?;

        // Resolve the delivery target before touching the backend, so a
        // workload with nowhere to deliver to never gets a token issued.
        let (address, port) = delivery_target(&workload)?;

        let wrap_info = self
            .backend
            .create_wrapped_token(&token_request)
            .await
            .map_err(|e| IssueError::Backend {
                name: name.clone(),
                message: e.to_string(),
            })?;

        // Only the wrap-info envelope is serialized, never the raw secret
        let payload =
            serde_json::to_vec(&wrap_info).map_err(|e| IssueError::Serialization(e.to_string()))?;

        info!(
            namespace = %namespace,
            name = %name,
            address = %address,
            port = %port,
            "credential issued, dispatching delivery"
        );

        // Detached dispatch: the task outlives this request and carries no
        // cancellation handle. Failures surface only in the sink's logs.
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            sink.push(&address, &port, payload).await;
        });

        Ok(StatusCode::ACCEPTED)
    }
}

/// Derive the backend token request from a workload's annotations
fn derive_token_request(workload: &WorkloadRecord) -> crate::Result<TokenRequest> {
    let policies = workload
        .annotations
        .get(POLICIES_ANNOTATION)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IssueError::MissingPolicies {
            name: workload.name.clone(),
        })?;

    let ttl = workload
        .annotations
        .get(TTL_ANNOTATION)
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or(DEFAULT_TOKEN_TTL);

    // Literal comma split: entries keep their surrounding whitespace and
    // duplicates survive. The annotation value is the contract.
    let policies = policies.split(',').map(str::to_string).collect();

    let metadata = BTreeMap::from([
        ("host_ip".to_string(), workload.host_ip.clone()),
        ("namespace".to_string(), workload.namespace.clone()),
        ("pod_ip".to_string(), workload.pod_ip.clone()),
        ("pod_name".to_string(), workload.name.clone()),
        ("pod_uid".to_string(), workload.uid.clone()),
    ]);

    Ok(TokenRequest {
        policies,
        ttl: ttl.to_string(),
        period: ttl.to_string(),
        display_name: workload.name.clone(),
        metadata,
        no_parent: true,
    })
}

/// Resolve the delivery target: pod IP plus the first port of the first
/// declared init endpoint, as a decimal string
fn delivery_target(workload: &WorkloadRecord) -> crate::Result<(String, String)> {
    let endpoint =
        workload
            .init_endpoints
            .first()
            .ok_or_else(|| IssueError::NoInitEndpoint {
                name: workload.name.clone(),
            })?;

    let port = endpoint.ports.first().ok_or_else(|| IssueError::NoInitPort {
        endpoint: endpoint.name.clone(),
    })?;

    Ok((workload.pod_ip.clone(), port.to_string()))
}
