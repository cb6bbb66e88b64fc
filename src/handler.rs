//! Per-connection pipeline: negotiate, read the request, dispatch, relay.
//!
//! Phases run strictly in order on one connection. Any failure ends that
//! connection only; a best-effort failure reply is sent when the protocol phase
//! still allows one.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::auth;
use crate::chain;
use crate::config::{Config, Role, Upstream};
use crate::conn::reply::{ConnReply, Rep};
use crate::conn::request::{CMD, ConnRequest};
use crate::error::SocksError;
use crate::parse::AddrPort;
use crate::relay::relay;

/// Where a CONNECT goes once the request is understood.
enum Outbound<'a> {
    Direct,
    Chained(&'a Upstream),
}

/// Serves one accepted connection to completion.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    config: Arc<Config>,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let outbound = match &config.role {
        Role::Exit(_) => Outbound::Direct,
        Role::Chain(upstream) => Outbound::Chained(upstream),
        Role::Passthrough(upstream) => {
            return chain::passthrough(stream, peer, upstream, &config).await;
        }
    };

    let policy = config.inbound_policy();
    let req = within(config.handshake_timeout, async {
        auth::respond(&mut stream, &policy).await?;
        read_request(&mut stream).await
    })
    .await?;

    info!(client = %peer, request = %req, "request");

    match req.cmd {
        CMD::Connect => connect(stream, peer, req, outbound, &config).await,
        CMD::Bind => {
            warn!(client = %peer, "BIND is not supported");
            ConnReply::unspecified(Rep::CommandNotSupported)
                .write_to(&mut stream)
                .await
        }
        CMD::UdpAssociate => {
            info!(client = %peer, "UDP ASSOCIATE is not implemented, ignoring");
            Ok(())
        }
    }
}

/// Reads the request, answering undecodable ones with the matching failure code.
async fn read_request<S>(stream: &mut S) -> Result<ConnRequest, SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    match ConnRequest::read_from(stream).await {
        Ok(req) => Ok(req),
        Err(e) => {
            if let Some(rep) = e.reply_code() {
                let _ = ConnReply::unspecified(rep).write_to(stream).await;
            }
            Err(e)
        }
    }
}

async fn connect<S>(
    mut stream: S,
    peer: SocketAddr,
    req: ConnRequest,
    outbound: Outbound<'_>,
    config: &Config,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let target = match outbound {
        Outbound::Direct => dial_target(&req.dst, config.connect_timeout).await,
        Outbound::Chained(upstream) => chain::dial(upstream, &req, config.connect_timeout).await,
    };

    let target = match target {
        Ok(target) => target,
        Err(e) => {
            let _ = ConnReply::unspecified(Rep::NetworkUnreachable)
                .write_to(&mut stream)
                .await;
            return Err(e);
        }
    };

    ConnReply::unspecified(Rep::Succeeded)
        .write_to(&mut stream)
        .await?;
    info!(client = %peer, dest = %req.dst, "connection established");

    let stats = relay(stream, target).await?;
    debug!(
        client = %peer,
        up = stats.client_to_target,
        down = stats.target_to_client,
        "relay finished"
    );
    Ok(())
}

/// Connects straight to the requested destination.
pub async fn dial_target(target: &AddrPort, timeout: Duration) -> Result<TcpStream, SocksError> {
    let label = target.to_string();
    match target {
        AddrPort::V4(ip, port) => dial((*ip, *port), label, timeout).await,
        AddrPort::V6(ip, port) => dial((*ip, *port), label, timeout).await,
        AddrPort::Domain(host, port) => dial((host.as_str(), *port), label, timeout).await,
    }
}

/// TCP connect bounded by `timeout`; failures name the endpoint.
pub(crate) async fn dial<A>(addr: A, label: String, timeout: Duration) -> Result<TcpStream, SocksError>
where
    A: ToSocketAddrs,
{
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(SocksError::Dial {
            target: label,
            source,
        }),
        Err(_) => Err(SocksError::Dial {
            target: label,
            source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
        }),
    }
}

/// Runs `fut`, bounded by `limit` when one is configured.
pub(crate) async fn within<F, T>(limit: Option<Duration>, fut: F) -> Result<T, SocksError>
where
    F: Future<Output = Result<T, SocksError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SocksError::HandshakeTimeout)?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[tokio::test]
    async fn bind_is_refused_without_relay() {
        let (mut client, server) = duplex(256);
        let task = tokio::spawn(handle_connection(server, peer(), Arc::new(Config::exit())));

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        client
            .write_all(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();

        let mut reply = [0u8; 12];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..2], &[0x05, 0x00]);
        assert_eq!(&reply[2..4], &[0x05, 0x07]);

        task.await.unwrap().unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn udp_associate_is_a_silent_no_op() {
        let (mut client, server) = duplex(256);
        let task = tokio::spawn(handle_connection(server, peer(), Arc::new(Config::exit())));

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        client
            .write_all(&[0x05, 0x03, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();

        task.await.unwrap().unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn unknown_address_type_is_answered() {
        let (mut client, server) = duplex(256);
        let task = tokio::spawn(handle_connection(server, peer(), Arc::new(Config::exit())));

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        client.write_all(&[0x05, 0x01, 0x00, 0x05]).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksError::InvalidAddressType(0x05)));
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(&rest[..4], &[0x05, 0x00, 0x05, 0x08]);
    }

    #[tokio::test]
    async fn failed_login_never_reaches_the_request_phase() {
        let (mut client, server) = duplex(256);
        let config = Config::exit_with_userpass(|u, p| u == "admin" && p == "admin");
        let task = tokio::spawn(handle_connection(server, peer(), Arc::new(config)));

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        client
            .write_all(&[0x01, 0x05, b'a', b'd', b'm', b'i', b'n', 0x01, b'x'])
            .await
            .unwrap();
        client
            .write_all(&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksError::AuthFailed(_)));
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, [0x05, 0x02, 0x01, 0x01]);
    }

    #[tokio::test]
    async fn truncated_request_closes_silently() {
        let (mut client, server) = duplex(256);
        let task = tokio::spawn(handle_connection(server, peer(), Arc::new(Config::exit())));

        client.write_all(&[0x05, 0x01, 0x00, 0x05, 0x01]).await.unwrap();
        client.shutdown().await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksError::Truncated(_)));
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let (_client, server) = duplex(256);
        let config = Config::exit().with_handshake_timeout(Duration::from_millis(50));
        let err = handle_connection(server, peer(), Arc::new(config))
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::HandshakeTimeout));
    }
}
