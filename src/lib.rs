//! Credcourier - Kubernetes credential issuance and delivery controller
//!
//! Credcourier issues short-lived, single-use Vault tokens to workloads
//! running in a cluster and delivers them over a direct HTTPS channel to the
//! workload's init container, rather than through a shared secret store.
//!
//! # Flow
//!
//! 1. A workload's init container calls `GET /token?name=&namespace=`
//! 2. The handler resolves the pod via the Kubernetes API
//! 3. Policies and TTL are derived from pod annotations
//! 4. A wrapped, no-parent token is created in Vault
//! 5. The wrap-info payload is pushed to `https://<podIP>:<initPort>/` as a
//!    detached task; the handler returns `202 Accepted` without waiting
//!
//! The wrapped token must be unwrapped exactly once by the receiver, so an
//! intercepted payload is detectable. The raw token never appears in logs,
//! in the HTTP response, or anywhere outside the delivery channel.
//!
//! # Modules
//!
//! - [`issue`] - Issuance handler (validate, resolve, derive, issue, dispatch)
//! - [`deliver`] - One-shot credential delivery pusher
//! - [`workload`] - Workload identity lookup via the Pods API
//! - [`vault`] - Vault token backend
//! - [`server`] - HTTP server exposing the issuance endpoint
//! - [`error`] - Error types for the issuance path

#![deny(missing_docs)]

pub mod deliver;
pub mod error;
pub mod issue;
pub mod server;
pub mod vault;
pub mod workload;

pub use error::IssueError;

/// Result type alias using our custom Error type
pub type Result<T, E = IssueError> = std::result::Result<T, E>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// These constants define the defaults used throughout credcourier.
// Centralizing them here keeps the handler, CLI, and test fixtures in sync.

/// Pod annotation carrying the comma-separated list of Vault policies
///
/// Required on every workload that requests a token. The value is split on
/// commas literally; entries are not trimmed or deduplicated.
pub const POLICIES_ANNOTATION: &str = "credcourier.io/policies";

/// Pod annotation overriding the issued token's lifetime
///
/// Optional. The value is passed to Vault uninterpreted (Vault parses the
/// duration); absent or empty means [`DEFAULT_TOKEN_TTL`].
pub const TTL_ANNOTATION: &str = "credcourier.io/ttl";

/// Token lifetime used when a workload declares no TTL annotation
pub const DEFAULT_TOKEN_TTL: &str = "72h";

/// Default listen address for the issuance HTTP server
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
