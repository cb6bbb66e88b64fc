//! SOCKS5 address and port parsing utilities.
//!
//! This module defines [`AddrPort`], a representation of a destination
//! address and port (IPv4, IPv6, or domain), and [`Parse`], a helper for
//! decoding such addresses from raw SOCKS5 protocol bytes.
//!
//! The address formats are defined in
//! [RFC 1928 §5, "Addressing"](<https://www.rfc-editor.org/rfc/rfc1928#section-5>).
//!
//! Example usage:
//! ```rust
//! use chain_socks5::ATYP;
//! use chain_socks5::parse::Parse;
//!
//! let buf = [127, 0, 0, 1, 0x1F, 0x90]; // 127.0.0.1:8080
//! let (addr, used) = Parse::parse_addr_port(&buf, ATYP::V4).unwrap();
//! assert_eq!(addr.to_string(), "127.0.0.1:8080");
//! assert_eq!(used, 6);
//! ```

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ATYP;
use crate::error::SocksError;

/// Represents a destination address and port.
///
/// SOCKS5 requests and replies contain an address field that may be:
/// - An IPv4 address (`ATYP = 0x01`).
/// - An IPv6 address (`ATYP = 0x04`).
/// - A domain name (`ATYP = 0x03`), which is represented here as [`AddrPort::Domain`].
///
/// The [`Display`](fmt::Display) form is a connectable `host:port` endpoint.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum AddrPort {
    /// An IPv4 address and port.
    V4(Ipv4Addr, u16),

    /// An IPv6 address and port.
    V6(Ipv6Addr, u16),

    /// A domain name and port.
    Domain(String, u16),
}

impl fmt::Display for AddrPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrPort::V4(ip, port) => write!(f, "{}:{}", ip, port),
            AddrPort::V6(ip, port) => write!(f, "[{}]:{}", ip, port),
            AddrPort::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl AddrPort {
    /// The all-zero IPv4 placeholder used in replies whose bound address is meaningless.
    pub const UNSPECIFIED: AddrPort = AddrPort::V4(Ipv4Addr::UNSPECIFIED, 0);

    /// The address type matching this address.
    pub fn atyp(&self) -> ATYP {
        match self {
            AddrPort::V4(..) => ATYP::V4,
            AddrPort::V6(..) => ATYP::V6,
            AddrPort::Domain(..) => ATYP::DomainName,
        }
    }

    /// The port, in host byte order.
    pub fn port(&self) -> u16 {
        match self {
            AddrPort::V4(_, port) | AddrPort::V6(_, port) | AddrPort::Domain(_, port) => *port,
        }
    }

    /// Appends `ADDR | PORT` in wire format (domains carry their length prefix).
    ///
    /// # Errors
    /// [`SocksError::InvalidDomain`] if a domain name is longer than 255 bytes.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), SocksError> {
        match self {
            AddrPort::V4(addr, port) => {
                buf.extend_from_slice(&addr.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::V6(addr, port) => {
                buf.extend_from_slice(&addr.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            AddrPort::Domain(name, port) => {
                let len = u8::try_from(name.len()).map_err(|_| SocksError::InvalidDomain)?;
                buf.push(len);
                buf.extend_from_slice(name.as_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
            }
        }
        Ok(())
    }

    /// Reads `ADDR | PORT` for the given address type with exact-length reads.
    pub async fn read_from<R>(reader: &mut R, atyp: ATYP) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let addr = match atyp {
            ATYP::V4 => {
                let mut buf = [0u8; 6];
                read_exact(reader, &mut buf, "IPv4 address").await?;
                AddrPort::V4(
                    Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]),
                    u16::from_be_bytes([buf[4], buf[5]]),
                )
            }
            ATYP::V6 => {
                let mut buf = [0u8; 18];
                read_exact(reader, &mut buf, "IPv6 address").await?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[..16]);
                AddrPort::V6(
                    Ipv6Addr::from(octets),
                    u16::from_be_bytes([buf[16], buf[17]]),
                )
            }
            ATYP::DomainName => {
                let mut len = [0u8; 1];
                read_exact(reader, &mut len, "domain length").await?;
                let mut buf = vec![0u8; len[0] as usize + 2];
                read_exact(reader, &mut buf, "domain name").await?;
                let port = u16::from_be_bytes([buf[buf.len() - 2], buf[buf.len() - 1]]);
                buf.truncate(buf.len() - 2);
                let domain = String::from_utf8(buf).map_err(|_| SocksError::InvalidDomain)?;
                AddrPort::Domain(domain, port)
            }
        };
        Ok(addr)
    }
}

/// Fills `buf` completely, turning an early EOF into [`SocksError::Truncated`].
pub(crate) async fn read_exact<R>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<(), SocksError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(SocksError::Truncated(what)),
        Err(e) => Err(e.into()),
    }
}

/// Provides parsing utilities for extracting addresses from raw bytes.
pub struct Parse;

impl Parse {
    /// Parses an address and port from a byte slice.
    ///
    /// # Arguments
    ///
    /// * `buf` - The byte slice starting at `DST.ADDR` / `BND.ADDR`.
    /// * `atyp` - The address type announced in the message header.
    ///
    /// # Returns
    ///
    /// The address and the number of bytes consumed.
    ///
    /// # Errors
    /// - [`SocksError::Truncated`] if the buffer ends before the port.
    /// - [`SocksError::InvalidDomain`] if a domain name is not valid UTF-8.
    pub fn parse_addr_port(buf: &[u8], atyp: ATYP) -> Result<(AddrPort, usize), SocksError> {
        match atyp {
            ATYP::V4 => {
                if buf.len() < 6 {
                    return Err(SocksError::Truncated("IPv4 address"));
                }
                let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                let port = u16::from_be_bytes([buf[4], buf[5]]);
                Ok((AddrPort::V4(ip, port), 6))
            }
            ATYP::V6 => {
                if buf.len() < 18 {
                    return Err(SocksError::Truncated("IPv6 address"));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[..16]);
                let port = u16::from_be_bytes([buf[16], buf[17]]);
                Ok((AddrPort::V6(Ipv6Addr::from(octets), port), 18))
            }
            ATYP::DomainName => {
                let Some(&len) = buf.first() else {
                    return Err(SocksError::Truncated("domain length"));
                };
                let len = len as usize;
                if buf.len() < 1 + len + 2 {
                    return Err(SocksError::Truncated("domain name"));
                }
                let domain = std::str::from_utf8(&buf[1..1 + len])
                    .map_err(|_| SocksError::InvalidDomain)?
                    .to_owned();
                let port = u16::from_be_bytes([buf[1 + len], buf[2 + len]]);
                Ok((AddrPort::Domain(domain, port), 3 + len))
            }
        }
    }
}
