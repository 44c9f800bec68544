//! Credcourier - issues wrapped Vault tokens to workloads and delivers them
//! out-of-band

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use credcourier::deliver::{DeliveryPusher, PusherConfig};
use credcourier::issue::IssuanceHandler;
use credcourier::server;
use credcourier::vault::VaultBackend;
use credcourier::workload::KubeWorkloadLookup;

/// Credcourier - Kubernetes credential issuance and delivery controller
#[derive(Parser, Debug)]
#[command(name = "credcourier", version, about, long_about = None)]
struct Cli {
    /// Address the issuance server listens on
    #[arg(long, default_value = credcourier::DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Vault server address
    #[arg(long, env = "VAULT_ADDR", default_value = "https://vault:8200")]
    vault_addr: String,

    /// Vault token permitted to create child tokens
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    vault_token: String,

    /// Lifetime of the response-wrapping envelope around issued tokens
    ///
    /// Short by design: the receiving init container is expected to unwrap
    /// immediately, and an unclaimed envelope should expire fast.
    #[arg(long, default_value = "60s")]
    wrap_ttl: String,

    /// Timeout for one credential delivery attempt, in seconds
    #[arg(long, default_value = "10")]
    delivery_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider - FIPS-validated aws-lc-rs
    // This MUST succeed for the application to operate securely.
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install crypto provider: {:?}. \
             The controller cannot operate without a working TLS implementation.",
            e
        );
        std::process::exit(1);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Credcourier controller starting...");

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let lookup = Arc::new(KubeWorkloadLookup::new(client));

    let backend = Arc::new(
        VaultBackend::new(cli.vault_addr, cli.vault_token, cli.wrap_ttl)
            .map_err(|e| anyhow::anyhow!("Failed to create Vault client: {}", e))?,
    );

    // Workloads present self-signed certificates established out-of-band;
    // trust for the delivery channel is by network reachability, not chain
    // validation. The flag is explicit so the trust model is auditable here.
    let pusher = DeliveryPusher::new(&PusherConfig {
        skip_peer_verification: true,
        timeout: Duration::from_secs(cli.delivery_timeout_secs),
    })
    .map_err(|e| anyhow::anyhow!("Failed to create delivery client: {}", e))?;

    let handler = Arc::new(IssuanceHandler::new(lookup, backend, Arc::new(pusher)));

    server::serve(cli.listen, handler)
        .await
        .map_err(|e| anyhow::anyhow!("Issuance server error: {}", e))?;

    tracing::info!("Credcourier controller shutting down");
    Ok(())
}
