//! One-shot credential delivery
//!
//! Pushes a wrapped credential payload to the workload's init endpoint over
//! HTTPS. Delivery is best-effort and at-most-once: no retry, no queue, no
//! acknowledgment path back into the issuance flow. Every outcome, success
//! or failure, is observable only through this module's logs.
//!
//! # Trust model
//!
//! The receiving init container presents a self-signed certificate
//! established out-of-band, so the pusher's transport is built with
//! [`PusherConfig::skip_peer_verification`] set. Trust is by network
//! reachability convention, not certificate chain validation. The flag is an
//! explicit configuration field so the choice is visible at the
//! construction site.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

/// Delivery transport configuration
#[derive(Clone, Debug)]
pub struct PusherConfig {
    /// Accept the delivery target's certificate unconditionally
    ///
    /// Required for targets presenting self-signed certificates. Maps to
    /// reqwest's `danger_accept_invalid_certs`.
    pub skip_peer_verification: bool,
    /// Timeout for one delivery attempt
    pub timeout: Duration,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            skip_peer_verification: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Trait abstracting the delivery channel
///
/// The issuance handler dispatches through this seam so tests can observe
/// (or stall) deliveries without network I/O. `push` returns nothing: a
/// delivery failure is terminal to the invocation and never reported back.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Push a credential payload to `https://<address>:<port>/`
    async fn push(&self, address: &str, port: &str, payload: Vec<u8>);
}

/// Delivery pusher performing a single HTTPS POST per credential
pub struct DeliveryPusher {
    http: reqwest::Client,
}

impl DeliveryPusher {
    /// Build a pusher with the given transport configuration
    pub fn new(config: &PusherConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_peer_verification)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http })
    }
}

fn delivery_url(address: &str, port: &str) -> String {
    format!("https://{}:{}/", address, port)
}

#[async_trait]
impl CredentialSink for DeliveryPusher {
    async fn push(&self, address: &str, port: &str, payload: Vec<u8>) {
        let url = delivery_url(address, port);
        match self.http.post(&url).body(payload).send().await {
            Err(e) => {
                warn!(url = %url, error = %e, "credential delivery failed");
            }
            // The receiver signals acceptance with exactly 200
            Ok(response) if response.status() != reqwest::StatusCode::OK => {
                warn!(url = %url, status = %response.status(), "credential delivery rejected");
            }
            Ok(_) => {
                info!(url = %url, "credential delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: delivery always targets HTTPS at the root path
    #[test]
    fn story_delivery_url_is_https_root() {
        assert_eq!(delivery_url("10.1.2.3", "8200"), "https://10.1.2.3:8200/");
    }

    /// Story: the default configuration states its trust model openly
    ///
    /// `skip_peer_verification` defaults to true because init containers
    /// present self-signed certificates; the field exists so that choice is
    /// written down at the construction site rather than buried in the
    /// transport builder.
    #[test]
    fn story_default_config_skips_peer_verification() {
        let config = PusherConfig::default();
        assert!(config.skip_peer_verification);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    /// Story: a pusher builds for both trust configurations
    #[test]
    fn story_pusher_builds_with_and_without_verification() {
        DeliveryPusher::new(&PusherConfig::default()).unwrap();
        DeliveryPusher::new(&PusherConfig {
            skip_peer_verification: false,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
    }
}
