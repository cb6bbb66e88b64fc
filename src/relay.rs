//! Bidirectional relay between two negotiated connections.
//!
//! Each direction runs as its own task. Whichever finishes first (EOF, reset or
//! error) cancels the shared token; the other direction stops at its next read or
//! write, and the relay returns only after both tasks are gone. Both streams are
//! dropped, and thereby closed, by the relay.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::SocksError;

/// Transfer chunk; nothing is buffered beyond one chunk per direction.
const CHUNK_SIZE: usize = 16 * 1024;

/// Bytes moved in each direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_target: u64,
    pub target_to_client: u64,
}

/// Splices `client` and `target` until either side finishes.
///
/// # Errors
/// [`SocksError::Relay`] with the first I/O error seen in either direction,
/// reported after both directions have stopped.
pub async fn relay<C, T>(client: C, target: T) -> Result<RelayStats, SocksError>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_rd, client_wr) = tokio::io::split(client);
    let (target_rd, target_wr) = tokio::io::split(target);
    let cancel = CancellationToken::new();

    let up = tokio::spawn(pipe(client_rd, target_wr, cancel.clone()));
    let down = tokio::spawn(pipe(target_rd, client_wr, cancel.clone()));

    let (up, down) = tokio::join!(up, down);
    let up = up.map_err(io::Error::other).and_then(|r| r);
    let down = down.map_err(io::Error::other).and_then(|r| r);

    match (up, down) {
        (Ok(client_to_target), Ok(target_to_client)) => Ok(RelayStats {
            client_to_target,
            target_to_client,
        }),
        (Err(e), _) | (_, Err(e)) => Err(SocksError::Relay(e)),
    }
}

/// Copies one direction, then cancels the other regardless of outcome.
async fn pipe<R, W>(mut reader: R, mut writer: W, cancel: CancellationToken) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = copy_until_cancelled(&mut reader, &mut writer, &cancel).await;
    cancel.cancel();
    let _ = writer.shutdown().await;
    result
}

async fn copy_until_cancelled<R, W>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(total),
            n = reader.read(&mut buf) => n?,
        };
        if n == 0 {
            return Ok(total);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(total),
            res = writer.write_all(&buf[..n]) => res?,
        }
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::duplex;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn forwards_both_ways() {
        let (mut app, client_side) = duplex(1024);
        let (target_side, mut server) = duplex(1024);
        let relay = tokio::spawn(relay(client_side, target_side));

        app.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        app.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(server);
        let stats = timeout(Duration::from_secs(5), relay)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.client_to_target, 4);
        assert_eq!(stats.target_to_client, 5);
    }

    #[tokio::test]
    async fn closing_one_end_closes_the_other() {
        let (mut app, client_side) = duplex(1024);
        let (target_side, server) = duplex(1024);
        let relay = tokio::spawn(relay(client_side, target_side));

        // The client direction is idle in a read; the target hanging up must still end it.
        drop(server);
        timeout(Duration::from_secs(5), relay)
            .await
            .expect("relay did not stop")
            .unwrap()
            .unwrap();

        let mut buf = [0u8; 1];
        let n = timeout(Duration::from_secs(5), app.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
