//! The local client's upstream leg.
//!
//! [`dial`] replays a parsed request through a freshly authenticated session with
//! the upstream exit server, so the exit sees an ordinary SOCKS5 client.
//! [`passthrough`] is the lighter variant: it only rewrites the authentication
//! phase and relays the application's request untouched.
//!
//! In both cases the application is told that no authentication is required,
//! whatever the upstream negotiated.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::auth;
use crate::config::{Config, Upstream};
use crate::conn::reply::{ConnReply, Rep};
use crate::conn::request::ConnRequest;
use crate::error::SocksError;
use crate::handler::within;
use crate::msg::message::{MethodSelection, VersionMessage};
use crate::msg::method::Method;
use crate::relay::relay;

/// Opens an upstream session ready to carry `request`'s traffic.
///
/// Connects, authenticates, forwards the request re-encoded from its parsed
/// form, and consumes the upstream's complete reply. `timeout` bounds the whole
/// exchange. Any non-success reply fails with [`SocksError::UpstreamRejected`].
pub async fn dial(
    upstream: &Upstream,
    request: &ConnRequest,
    timeout: Duration,
) -> Result<TcpStream, SocksError> {
    bounded(upstream, timeout, async {
        let mut stream = open(upstream).await?;

        request.write_to(&mut stream).await?;
        let reply = ConnReply::read_from(&mut stream).await?;
        if reply.rep != Rep::Succeeded {
            return Err(SocksError::UpstreamRejected(reply.rep));
        }

        debug!(upstream = %upstream.addr, dest = %request.dst, bind = %reply.bnd, "upstream ready");
        Ok(stream)
    })
    .await
}

/// Serves an application whose request is relayed to the upstream unparsed.
///
/// The application must offer `NO AUTH`. The upstream is connected and
/// authenticated before the application gets its method selection.
pub async fn passthrough<S>(
    mut stream: S,
    peer: SocketAddr,
    upstream: &Upstream,
    config: &Config,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let hello = within(config.handshake_timeout, VersionMessage::read_from(&mut stream)).await?;
    if !hello.offers(Method::NO_AUTH) {
        MethodSelection::new(Method::NO_ACCEPTABLE)
            .write_to(&mut stream)
            .await?;
        return Err(SocksError::MethodNotSupported(Method::NO_AUTH));
    }

    let remote = bounded(upstream, config.connect_timeout, open(upstream)).await?;

    MethodSelection::new(Method::NO_AUTH)
        .write_to(&mut stream)
        .await?;
    info!(client = %peer, upstream = %upstream.addr, "passthrough established");

    let stats = relay(stream, remote).await?;
    debug!(
        client = %peer,
        up = stats.client_to_target,
        down = stats.target_to_client,
        "relay finished"
    );
    Ok(())
}

/// Connects to the upstream and completes the initiator side of authentication.
async fn open(upstream: &Upstream) -> Result<TcpStream, SocksError> {
    let mut stream = TcpStream::connect(upstream.addr.as_str())
        .await
        .map_err(|source| SocksError::Dial {
            target: upstream.addr.clone(),
            source,
        })?;

    let method = auth::initiate(&mut stream, upstream.credentials.as_ref()).await?;
    debug!(upstream = %upstream.addr, %method, "upstream authenticated");
    Ok(stream)
}

async fn bounded<F, T>(upstream: &Upstream, timeout: Duration, fut: F) -> Result<T, SocksError>
where
    F: Future<Output = Result<T, SocksError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SocksError::Dial {
            target: upstream.addr.clone(),
            source: io::Error::new(io::ErrorKind::TimedOut, "upstream handshake timed out"),
        }),
    }
}
