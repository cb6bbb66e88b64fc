#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chain_socks5::{Config, Socks5};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub const WAIT: Duration = Duration::from_secs(5);

/// Starts a proxy on an ephemeral loopback port.
pub async fn start_proxy(config: Config) -> (SocketAddr, CancellationToken) {
    let server = Socks5::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.run_until(shutdown.clone()));
    (addr, shutdown)
}

/// A TCP server that echoes every connection back to itself.
pub async fn start_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = stream.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

/// A loopback address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub async fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for the proxy")
        .unwrap();
    buf
}

/// Sends the method list and returns the selected method.
pub async fn greet(stream: &mut TcpStream, methods: &[u8]) -> u8 {
    let mut hello = vec![0x05, methods.len() as u8];
    hello.extend_from_slice(methods);
    stream.write_all(&hello).await.unwrap();
    let reply = read_n(stream, 2).await;
    assert_eq!(reply[0], 0x05);
    reply[1]
}

/// Runs the username/password sub-negotiation and returns the status byte.
pub async fn login(stream: &mut TcpStream, user: &str, pass: &str) -> u8 {
    let mut req = vec![0x01, user.len() as u8];
    req.extend_from_slice(user.as_bytes());
    req.push(pass.len() as u8);
    req.extend_from_slice(pass.as_bytes());
    stream.write_all(&req).await.unwrap();
    let reply = read_n(stream, 2).await;
    assert_eq!(reply[0], 0x01);
    reply[1]
}

/// Sends CONNECT for an IPv4 target and returns the reply code.
pub async fn connect(stream: &mut TcpStream, target: SocketAddr) -> u8 {
    let IpAddr::V4(ip) = target.ip() else {
        panic!("IPv4 targets only");
    };
    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    req.extend_from_slice(&ip.octets());
    req.extend_from_slice(&target.port().to_be_bytes());
    stream.write_all(&req).await.unwrap();
    read_reply(stream).await
}

/// Sends CONNECT for a domain target and returns the reply code.
pub async fn connect_domain(stream: &mut TcpStream, host: &str, port: u16) -> u8 {
    let mut req = vec![0x05, 0x01, 0x00, 0x03, host.len() as u8];
    req.extend_from_slice(host.as_bytes());
    req.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&req).await.unwrap();
    read_reply(stream).await
}

/// Reads a reply with an IPv4 placeholder bound address.
async fn read_reply(stream: &mut TcpStream) -> u8 {
    let reply = read_n(stream, 10).await;
    assert_eq!(reply[0], 0x05);
    assert_eq!(reply[3], 0x01);
    reply[1]
}

pub async fn assert_echo(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    assert_eq!(read_n(stream, payload.len()).await, payload);
}

/// Waits for the proxy to close the connection.
pub async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    let read = timeout(WAIT, stream.read_to_end(&mut rest))
        .await
        .expect("connection left open");
    match read {
        Ok(_) => assert!(rest.is_empty(), "unexpected trailing bytes: {rest:?}"),
        // Unread input on the proxy side turns the close into a reset.
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}
