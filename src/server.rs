//! Connection acceptor.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::SocksError;
use crate::handler::handle_connection;

/// Pause after a transient accept failure, e.g. running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The main SOCKS5 server struct.
///
/// Owns the listening socket and the [`Config`] every connection reads. Each
/// accepted connection is served by its own task; a failure or panic in one of
/// them is logged and never stops the accept loop.
pub struct Socks5 {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Socks5 {
    /// Bind a new SOCKS5 server to an address.
    ///
    /// # Arguments
    ///
    /// * `addr` - The address to bind to, e.g., `"127.0.0.1:1080"`.
    /// * `config` - The policy for every connection this server accepts.
    ///
    /// # Errors
    ///
    /// Returns a `SocksError::Io` if binding fails.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: Config) -> Result<Self, SocksError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Returns the local address of the server.
    pub fn local_addr(&self) -> Result<SocketAddr, SocksError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accept a client TCP connection.
    ///
    /// # Returns
    ///
    /// A tuple of `(TcpStream, SocketAddr)` representing the connected client.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), SocksError> {
        let (stream, addr) = self.listener.accept().await?;
        Ok((stream, addr))
    }

    /// Serve connections until the listener fails.
    pub async fn run(self) -> Result<(), SocksError> {
        self.run_until(CancellationToken::new()).await
    }

    /// Serve connections until `shutdown` is cancelled or the listener fails.
    ///
    /// Connections already being served keep running after shutdown.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<(), SocksError> {
        info!(addr = %self.local_addr()?, role = ?self.config.role, "SOCKS5 proxy listening");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("SOCKS5 proxy shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(client = %peer, "accepted");
                    spawn_supervised(stream, peer, Arc::clone(&self.config));
                }
                Err(e) if is_listener_failure(&e) => {
                    error!(error = %e, "listener failed");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, retrying");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Runs the connection in its own task and reports how it ended, panics included.
fn spawn_supervised(stream: TcpStream, peer: SocketAddr, config: Arc<Config>) {
    let task = tokio::spawn(handle_connection(stream, peer, config));

    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => debug!(client = %peer, "connection closed"),
            Ok(Err(e)) => warn!(client = %peer, error = %e, "connection failed"),
            Err(e) if e.is_panic() => error!(client = %peer, "connection handler panicked"),
            Err(e) => warn!(client = %peer, error = %e, "connection task aborted"),
        }
    });
}

/// Accept errors that mean the listening socket itself is unusable.
fn is_listener_failure(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported
    )
}
