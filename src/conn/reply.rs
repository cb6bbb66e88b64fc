//! SOCKS5 server connection reply (RFC 1928 §6).
//!
//! After processing a request, the server replies with:
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//!
//! o VER       - protocol version: X'05'
//! o REP       - reply field, see below
//! o RSV       - reserved, must be 0x00
//! o ATYP      - address type of BND.ADDR
//! o BND.ADDR  - server bound address
//! o BND.PORT  - server bound port in network byte order
//!
//! The BND fields are meaningful in BIND/UDP_ASSOCIATE, but may be ignored in CONNECT.
//! ```

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::SocksError;
use crate::parse::{AddrPort, Parse, read_exact};
use crate::{ATYP, RSV, SOCKS_VERSION};

/// Reply codes (`REP`) for SOCKS5 connection replies (RFC 1928 §6).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rep {
    /// 0x00 - Succeeded
    Succeeded = 0x00,
    /// 0x01 - General SOCKS server failure
    GeneralFailure = 0x01,
    /// 0x02 - Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// 0x03 - Network unreachable
    NetworkUnreachable = 0x03,
    /// 0x04 - Host unreachable
    HostUnreachable = 0x04,
    /// 0x05 - Connection refused by destination host
    ConnectionRefused = 0x05,
    /// 0x06 - TTL expired
    TTLExpired = 0x06,
    /// 0x07 - Command not supported
    CommandNotSupported = 0x07,
    /// 0x08 - Address type not supported
    AddressTypeNotSupported = 0x08,
    /// 0x09 and above - unassigned
    Unassigned = 0x09,
}

impl From<u8> for Rep {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Rep::Succeeded,
            0x01 => Rep::GeneralFailure,
            0x02 => Rep::ConnectionNotAllowed,
            0x03 => Rep::NetworkUnreachable,
            0x04 => Rep::HostUnreachable,
            0x05 => Rep::ConnectionRefused,
            0x06 => Rep::TTLExpired,
            0x07 => Rep::CommandNotSupported,
            0x08 => Rep::AddressTypeNotSupported,
            _ => Rep::Unassigned,
        }
    }
}

/// Represents a SOCKS5 server reply (RFC 1928 §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnReply {
    /// Protocol version (`VER`), must be 0x05.
    pub ver: u8,
    /// Reply field (`REP`): success or error status.
    pub rep: Rep,
    /// Reserved byte (`RSV`), must be 0x00.
    pub rsv: u8,
    /// Address type (`ATYP`).
    pub atyp: ATYP,
    /// Bound address and port (`BND.ADDR`, `BND.PORT`).
    pub bnd: AddrPort,
}

impl ConnReply {
    /// Creates a new `ConnReply`; the address type follows `bnd`.
    pub fn new(rep: Rep, bnd: AddrPort) -> Self {
        Self {
            ver: SOCKS_VERSION,
            rep,
            rsv: RSV,
            atyp: bnd.atyp(),
            bnd,
        }
    }

    /// A reply carrying the `0.0.0.0:0` placeholder as its bound address.
    pub fn unspecified(rep: Rep) -> Self {
        Self::new(rep, AddrPort::UNSPECIFIED)
    }

    /// Serializes the reply into the SOCKS5 wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SocksError> {
        let mut buf = vec![self.ver, self.rep as u8, RSV, self.atyp as u8];
        self.bnd.encode(&mut buf)?;
        Ok(buf)
    }

    /// Reads a complete reply, including the address-type-dependent bound address.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; 4];
        read_exact(reader, &mut header, "reply header").await?;

        let ver = header[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }
        let rep = Rep::from(header[1]);
        let rsv = header[2];
        let atyp = ATYP::try_from(header[3])?;
        let bnd = AddrPort::read_from(reader, atyp).await?;

        Ok(Self {
            ver,
            rep,
            rsv,
            atyp,
            bnd,
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

impl TryFrom<&[u8]> for ConnReply {
    type Error = SocksError;

    /// Parses a SOCKS5 connection reply from raw bytes.
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() < 4 {
            return Err(SocksError::Truncated("reply header"));
        }

        let ver = buf[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }
        let rep = Rep::from(buf[1]);
        let rsv = buf[2];
        let atyp = ATYP::try_from(buf[3])?;
        let (bnd, _) = Parse::parse_addr_port(&buf[4..], atyp)?;

        Ok(ConnReply {
            ver,
            rep,
            rsv,
            atyp,
            bnd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_reply_is_ten_bytes() {
        let bytes = ConnReply::unspecified(Rep::CommandNotSupported)
            .to_bytes()
            .unwrap();
        assert_eq!(bytes, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn reads_domain_bound_address() {
        let mut bytes: &[u8] = &[0x05, 0x00, 0x00, 0x03, 0x02, b'h', b'q', 0x04, 0x38, 0xEE];
        let reply = ConnReply::read_from(&mut bytes).await.unwrap();
        assert_eq!(reply.rep, Rep::Succeeded);
        assert_eq!(reply.bnd, AddrPort::Domain("hq".into(), 1080));
        assert_eq!(bytes, &[0xEE]);
    }

    #[test]
    fn unknown_codes_are_unassigned() {
        assert_eq!(Rep::from(0x09), Rep::Unassigned);
        assert_eq!(Rep::from(0xAB), Rep::Unassigned);
        let reply = ConnReply::try_from(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0][..]).unwrap();
        assert_eq!(reply.rep, Rep::ConnectionRefused);
    }
}
