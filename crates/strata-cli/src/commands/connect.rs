//! The connect command
//!
//! Resolves a database branch, establishes a local tunnel to it, and keeps
//! the tunnel up until the operator interrupts it. An interrupt is a clean
//! exit; anything else that stops the tunnel is an error.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use strata_api::{Client, RemoteCertSource};
use strata_proxy::{Tunnel, TunnelOptions};

use crate::config::ConfigManager;
use crate::output;
use crate::resolver::{self, TerminalPicker};

/// Arguments for `strata connect`
#[derive(Debug)]
pub struct ConnectArgs {
    pub database: String,
    pub branch: Option<String>,
    pub org: Option<String>,
    pub local_addr: String,
    pub remote_addr: Option<String>,
    pub debug: bool,
}

/// Connect to a database branch and serve it on a local address
pub async fn run(args: ConnectArgs) -> Result<()> {
    let config = ConfigManager::load()?;

    let organization = args
        .org
        .clone()
        .or_else(|| config.organization.clone())
        .unwrap_or_default();

    let client = Client::builder()
        .base_url(config.api_url())
        .credentials(config.credentials()?)
        .build()?;

    let target = resolver::resolve(
        &client,
        &TerminalPicker,
        &organization,
        &args.database,
        args.branch.as_deref(),
    )
    .await?;
    debug!("Connecting to {}", target.instance());

    let cert_source = Arc::new(RemoteCertSource::new(client));
    let options = TunnelOptions::new(cert_source, target.instance())
        .with_local_addr(&args.local_addr)
        .with_remote_addr(args.remote_addr.clone())
        .with_verbose(args.debug);

    let tunnel = Arc::new(Tunnel::new(options).context("Couldn't create tunnel")?);

    // Announce the local address as soon as the listener is up. The waiter
    // also resolves when the run dies early, so this task never leaks.
    let notifier = tokio::spawn({
        let tunnel = Arc::clone(&tunnel);
        let database = target.database.clone();
        let branch = target.branch.clone();
        async move { announce_ready(&tunnel, &database, &branch).await }
    });

    let shutdown = CancellationToken::new();
    spawn_signal_watcher(shutdown.clone());

    let result = tunnel.run(shutdown).await;
    let _ = notifier.await;

    Ok(result?)
}

/// Print the readiness line once the tunnel address resolves. A run that
/// dies before binding resolves the waiter with an error instead; that is
/// worth a warning but never fails the command on its own.
async fn announce_ready(tunnel: &Tunnel, database: &str, branch: &str) {
    match tunnel.local_addr().await {
        Ok(addr) => output::print_ready(database, branch, addr),
        Err(e) => warn!("Tunnel ended before becoming ready: {}", e),
    }
}

/// Cancel `shutdown` on the first interrupt or terminate signal
fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                debug!("Received ctrl-c, initiating shutdown");
            }
            _ = terminate => {
                debug!("Received SIGTERM, initiating shutdown");
            }
        }

        shutdown.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use strata_proxy::{
        BoxedStream, CertSourceError, CertificateSource, ClientCert, SecureConnector, TunnelError,
    };

    struct UnusedCerts;

    #[async_trait]
    impl CertificateSource for UnusedCerts {
        async fn fetch(&self, _instance: &str) -> Result<ClientCert, CertSourceError> {
            Err(CertSourceError::RequestFailed("not used".to_string()))
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl SecureConnector for FailingConnector {
        async fn prepare(&self) -> Result<(), TunnelError> {
            Err(TunnelError::ConnectionFailed("edge unreachable".to_string()))
        }

        async fn open(&self) -> Result<BoxedStream, TunnelError> {
            Err(TunnelError::ConnectionFailed("edge unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_announce_ready_survives_a_dead_run() {
        let options = TunnelOptions::new(Arc::new(UnusedCerts), "acme/shop/main");
        let tunnel = Tunnel::with_connector(options, Arc::new(FailingConnector))
            .expect("options are valid");

        let run_result = tunnel.run(CancellationToken::new()).await;
        assert!(run_result.is_err(), "session setup failure ends the run");

        // The announcement resolves on its own and swallows the failure
        timeout(
            Duration::from_secs(1),
            announce_ready(&tunnel, "shop", "main"),
        )
        .await
        .expect("notifier must resolve once the run is over");
    }
}
