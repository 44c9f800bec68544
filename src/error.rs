//! Error types for the issuance path
//!
//! Every failure before dispatch maps to an HTTP status:
//! client input errors are `400`, resolution and issuance errors are `500`.
//! Delivery failures never become an [`IssueError`]; they are terminal to
//! the detached delivery task and observable only in its logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for credential issuance
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssueError {
    /// The request carried no `name` parameter (or an empty one)
    #[error("missing or empty name parameter")]
    MissingName,

    /// The workload does not exist in the cluster
    #[error("workload {namespace}/{name} not found")]
    WorkloadNotFound {
        /// Namespace used for the lookup
        namespace: String,
        /// Workload name used for the lookup
        name: String,
    },

    /// The workload lookup failed for a reason other than not-found
    #[error("workload lookup for {namespace}/{name} failed: {message}")]
    Lookup {
        /// Namespace used for the lookup
        namespace: String,
        /// Workload name used for the lookup
        name: String,
        /// Underlying Kubernetes API error text
        message: String,
    },

    /// The workload carries no (or an empty) policies annotation
    #[error("workload {name} has no {annotation} annotation", annotation = crate::POLICIES_ANNOTATION)]
    MissingPolicies {
        /// Workload name
        name: String,
    },

    /// The workload declares no init containers
    #[error("workload {name} has no init containers")]
    NoInitEndpoint {
        /// Workload name
        name: String,
    },

    /// The workload's first init container declares no ports
    #[error("init container {endpoint} has no ports")]
    NoInitPort {
        /// Init container name
        endpoint: String,
    },

    /// The secret backend failed to create the wrapped token
    #[error("creating wrapped token for workload {name} failed: {message}")]
    Backend {
        /// Workload name
        name: String,
        /// Underlying backend error text
        message: String,
    },

    /// Serializing the wrap-info payload failed
    #[error("serializing wrapped token failed: {0}")]
    Serialization(String),
}

impl IssueError {
    /// HTTP status this error maps to
    ///
    /// Only missing client input is the caller's fault (`400`); resolution
    /// and issuance failures all flatten to `500`.
    pub fn status(&self) -> StatusCode {
        match self {
            IssueError::MissingName => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IssueError {
    fn into_response(self) -> Response {
        // Error text is surfaced verbatim in the body; it never contains
        // credential material.
        (self.status(), self.to_string()).into_response()
    }
}
