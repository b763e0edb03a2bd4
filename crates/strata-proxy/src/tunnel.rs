//! Local tunnel listener
//!
//! A [`Tunnel`] binds a TCP listener on a local address and forwards every
//! accepted connection over a secure stream to the remote database edge.
//! Construction and startup are separate steps: [`Tunnel::new`] only
//! validates options, [`Tunnel::run`] binds, serves and cleans up.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cert_source::CertificateSource;
use crate::connector::{SecureConnector, TlsConnector};
use crate::error::TunnelError;

/// Configuration for a tunnel
pub struct TunnelOptions {
    /// Source of the client certificate used to authenticate to the remote
    pub cert_source: Arc<dyn CertificateSource>,

    /// Instance identifier in `org/database/branch` form
    pub instance: String,

    /// Local listen address (defaults to "127.0.0.1:0" for automatic port allocation)
    pub local_addr: String,

    /// Remote edge address override; resolved from the certificate when unset
    pub remote_addr: Option<String>,

    /// Log individual connections at info level
    pub verbose: bool,
}

impl TunnelOptions {
    /// Create options for the given instance with default settings
    pub fn new(cert_source: Arc<dyn CertificateSource>, instance: impl Into<String>) -> Self {
        Self {
            cert_source,
            instance: instance.into(),
            local_addr: "127.0.0.1:0".to_string(),
            remote_addr: None,
            verbose: false,
        }
    }

    /// Set the local listen address
    pub fn with_local_addr(mut self, addr: impl Into<String>) -> Self {
        self.local_addr = addr.into();
        self
    }

    /// Override the remote edge address
    pub fn with_remote_addr(mut self, addr: Option<String>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Enable per-connection logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self) -> Result<(), TunnelError> {
        if self.instance.is_empty() {
            return Err(TunnelError::Config(
                "Instance identifier is required".to_string(),
            ));
        }

        if self.local_addr.is_empty() {
            return Err(TunnelError::Config(
                "Local listen address is required".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for TunnelOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelOptions")
            .field("instance", &self.instance)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Listener state observed by [`Tunnel::local_addr`]
#[derive(Debug, Clone)]
enum AddrState {
    Pending,
    Bound(SocketAddr),
    BindFailed(String),
    Closed(String),
}

/// Local tunnel to a remote database instance
pub struct Tunnel {
    options: TunnelOptions,
    connector: Arc<dyn SecureConnector>,
    addr_tx: watch::Sender<AddrState>,
    addr_rx: watch::Receiver<AddrState>,
    started: AtomicBool,
}

impl Tunnel {
    /// Create a tunnel that connects out over TLS with a client certificate
    pub fn new(options: TunnelOptions) -> Result<Self, TunnelError> {
        let connector = TlsConnector::new(
            Arc::clone(&options.cert_source),
            options.instance.clone(),
            options.remote_addr.clone(),
        );

        Self::with_connector(options, Arc::new(connector))
    }

    /// Create a tunnel with a custom connector
    pub fn with_connector(
        options: TunnelOptions,
        connector: Arc<dyn SecureConnector>,
    ) -> Result<Self, TunnelError> {
        options.validate()?;

        let (addr_tx, addr_rx) = watch::channel(AddrState::Pending);

        Ok(Self {
            options,
            connector,
            addr_tx,
            addr_rx,
            started: AtomicBool::new(false),
        })
    }

    /// Wait for the concrete local address the tunnel is listening on.
    ///
    /// Blocks until [`Tunnel::run`] has bound the listener. Never blocks past
    /// the end of a run: if the run terminates before binding, this resolves
    /// with the error that ended it, and once the run is over any further
    /// call fails immediately.
    pub async fn local_addr(&self) -> Result<SocketAddr, TunnelError> {
        let mut rx = self.addr_rx.clone();

        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                AddrState::Pending => {}
                AddrState::Bound(addr) => return Ok(addr),
                AddrState::BindFailed(msg) => return Err(TunnelError::Bind(msg)),
                AddrState::Closed(msg) => return Err(TunnelError::Closed(msg)),
            }

            if rx.changed().await.is_err() {
                return Err(TunnelError::Closed(
                    "Tunnel dropped before the listener was bound".to_string(),
                ));
            }
        }
    }

    /// Run the tunnel until `shutdown` is cancelled or a fatal error occurs.
    ///
    /// Returns `Ok(())` for a shutdown-triggered exit. The listener and all
    /// forwarded connections are torn down before this returns, so the local
    /// port is free again.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), TunnelError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(TunnelError::Closed("Tunnel already started".to_string()));
        }

        let result = self.run_inner(&shutdown).await;

        // Leave a terminal state behind so address waiters never outlive the
        // run: pending waiters learn the run died early, late callers learn
        // the listener is gone. Bind failures keep their specific error.
        self.addr_tx.send_if_modified(|state| match state {
            AddrState::Pending => {
                *state = match &result {
                    Ok(()) => AddrState::Closed("Tunnel exited before binding".to_string()),
                    Err(e) => AddrState::Closed(format!("Tunnel exited before binding: {}", e)),
                };
                true
            }
            AddrState::Bound(_) => {
                *state = AddrState::Closed("Tunnel run has ended".to_string());
                true
            }
            AddrState::BindFailed(_) | AddrState::Closed(_) => false,
        });

        result
    }

    async fn run_inner(&self, shutdown: &CancellationToken) -> Result<(), TunnelError> {
        // Session setup can stall on the network; a shutdown request must
        // still win the race.
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            prepared = self.connector.prepare() => prepared?,
        }

        let listener = match TcpListener::bind(&self.options.local_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let msg = format!("{}: {}", self.options.local_addr, e);
                self.addr_tx.send_replace(AddrState::BindFailed(msg.clone()));
                return Err(TunnelError::Bind(msg));
            }
        };

        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let msg = format!("{}: {}", self.options.local_addr, e);
                self.addr_tx.send_replace(AddrState::BindFailed(msg.clone()));
                return Err(TunnelError::Bind(msg));
            }
        };

        self.addr_tx.send_replace(AddrState::Bound(local_addr));
        info!("Tunnel listening on {}", local_addr);

        let mut forwards = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, closing tunnel");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        let connector = Arc::clone(&self.connector);
                        let verbose = self.options.verbose;
                        forwards.spawn(forward(client, peer, connector, verbose));
                    }
                    Err(e) => {
                        break Err(TunnelError::IoError(e));
                    }
                },
                Some(finished) = forwards.join_next(), if !forwards.is_empty() => {
                    if let Err(e) = finished {
                        if !e.is_cancelled() {
                            warn!("Forward task failed: {}", e);
                        }
                    }
                }
            }
        };

        // Tear down in-flight connections; the listener closes on drop
        forwards.shutdown().await;

        result
    }
}

/// Forward one accepted connection to the remote instance
async fn forward(
    mut client: TcpStream,
    peer: SocketAddr,
    connector: Arc<dyn SecureConnector>,
    verbose: bool,
) {
    if verbose {
        info!("Accepted connection from {}", peer);
    } else {
        debug!("Accepted connection from {}", peer);
    }

    let mut remote = match connector.open().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to open secure stream for {}: {}", peer, e);
            return;
        }
    };

    match tokio::io::copy_bidirectional(&mut client, &mut remote).await {
        Ok((to_remote, to_client)) => {
            if verbose {
                info!(
                    "Connection from {} closed ({} bytes sent, {} bytes received)",
                    peer, to_remote, to_client
                );
            } else {
                debug!(
                    "Connection from {} closed ({} bytes sent, {} bytes received)",
                    peer, to_remote, to_client
                );
            }
        }
        Err(e) => {
            debug!("Connection from {} ended with error: {}", peer, e);
        }
    }
}
