//! SOCKS5 client connection request (RFC 1928 §4).
//!
//! After negotiation, the client sends a request message:
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//!
//! o VER      - protocol version: X'05'
//! o CMD      - command code:
//!                0x01 = CONNECT
//!                0x02 = BIND
//!                0x03 = UDP ASSOCIATE
//! o RSV      - reserved, ignored on read and written as 0x00
//! o ATYP     - address type of DST.ADDR
//!                0x01 = IPv4 address
//!                0x03 = Domain name
//!                0x04 = IPv6 address
//! o DST.ADDR - destination address
//! o DST.PORT - destination port in network byte order
//! ```

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::SocksError;
use crate::parse::{AddrPort, Parse, read_exact};
use crate::{ATYP, RSV, SOCKS_VERSION};

/// The command (`CMD`) of a SOCKS5 request (RFC 1928 §4).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CMD {
    /// CONNECT command (0x01): establishes a TCP connection to the target host.
    Connect = 0x01,
    /// BIND command (0x02): rejected with `CommandNotSupported`.
    Bind = 0x02,
    /// UDP ASSOCIATE command (0x03): accepted and ignored.
    UdpAssociate = 0x03,
}

impl TryFrom<u8> for CMD {
    type Error = SocksError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(CMD::Connect),
            0x02 => Ok(CMD::Bind),
            0x03 => Ok(CMD::UdpAssociate),
            other => Err(SocksError::UnsupportedCommand(other)),
        }
    }
}

impl fmt::Display for CMD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CMD::Connect => write!(f, "CONNECT"),
            CMD::Bind => write!(f, "BIND"),
            CMD::UdpAssociate => write!(f, "UDP_ASSOCIATE"),
        }
    }
}

/// Represents a SOCKS5 connection request (RFC 1928 §4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnRequest {
    /// Protocol version (`VER`), must be 0x05.
    pub ver: u8,
    /// Command (`CMD`): CONNECT, BIND, or UDP ASSOCIATE.
    pub cmd: CMD,
    /// Reserved byte (`RSV`) as received.
    pub rsv: u8,
    /// Address type (`ATYP`): IPv4, IPv6, or domain name.
    pub atyp: ATYP,
    /// Destination address and port (`DST.ADDR`, `DST.PORT`).
    pub dst: AddrPort,
}

impl ConnRequest {
    /// Creates a new `ConnRequest`; the address type follows `dst`.
    pub fn new(cmd: CMD, dst: AddrPort) -> Self {
        Self {
            ver: SOCKS_VERSION,
            cmd,
            rsv: RSV,
            atyp: dst.atyp(),
            dst,
        }
    }

    /// Serializes the request into the SOCKS5 wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SocksError> {
        let mut buf = vec![self.ver, self.cmd as u8, RSV, self.atyp as u8];
        self.dst.encode(&mut buf)?;
        Ok(buf)
    }

    /// Reads `VER | CMD | RSV | ATYP`, then the address for that type.
    ///
    /// # Errors
    /// - [`SocksError::UnsupportedVersion`] if `VER != 0x05`.
    /// - [`SocksError::UnsupportedCommand`] for an unknown `CMD`.
    /// - [`SocksError::InvalidAddressType`] for an unknown `ATYP`.
    /// - [`SocksError::Truncated`] if the stream ends early.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; 4];
        read_exact(reader, &mut header, "request header").await?;

        let ver = header[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }
        let cmd = CMD::try_from(header[1])?;
        let rsv = header[2];
        let atyp = ATYP::try_from(header[3])?;
        let dst = AddrPort::read_from(reader, atyp).await?;

        Ok(Self {
            ver,
            cmd,
            rsv,
            atyp,
            dst,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), SocksError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.to_bytes()?).await?;
        Ok(())
    }
}

impl fmt::Display for ConnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.cmd, self.dst, self.atyp)
    }
}

impl TryFrom<&[u8]> for ConnRequest {
    type Error = SocksError;

    /// Parses a SOCKS5 connection request from raw bytes.
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() < 4 {
            return Err(SocksError::Truncated("request header"));
        }

        let ver = buf[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }
        let cmd = CMD::try_from(buf[1])?;
        let rsv = buf[2];
        let atyp = ATYP::try_from(buf[3])?;
        let (dst, _) = Parse::parse_addr_port(&buf[4..], atyp)?;

        Ok(ConnRequest {
            ver,
            cmd,
            rsv,
            atyp,
            dst,
        })
    }
}
