//! SOCKS5 handshake messages (RFC 1928).
//!
//! This module defines the messages exchanged during the initial
//! client–server handshake:
//!
//! - [`VersionMessage`] → sent by the client to advertise supported
//!   authentication methods.
//! - [`MethodSelection`] → sent by the server to choose one method.
//!
//! These are defined in [RFC 1928, section 3](https://www.rfc-editor.org/rfc/rfc1928#section-3).

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::method::*;
use crate::SOCKS_VERSION;
use crate::error::SocksError;
use crate::parse::read_exact;

/// Client's version/methods message.
///
/// This message is sent by the client immediately after establishing
/// a TCP connection, and lists the authentication methods it supports.
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
///
/// - `VER`: SOCKS version (`0x05`).
/// - `NMETHODS`: number of methods that follow.
/// - `METHODS`: list of supported authentication methods.
///
/// Defined in RFC 1928, section 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    /// The SOCKS protocol version (must be `0x05`).
    pub ver: u8,
    /// The list of authentication methods supported by the client, in wire order.
    pub methods: Vec<Method>,
}

impl VersionMessage {
    /// Creates a new [`VersionMessage`] with the given supported methods.
    ///
    /// # Example
    /// ```
    /// use chain_socks5::msg::message::VersionMessage;
    /// use chain_socks5::msg::method::Method;
    ///
    /// let msg = VersionMessage::new(vec![Method::NO_AUTH, Method::USER_PASS]);
    /// assert_eq!(msg.to_bytes(), vec![0x05, 0x02, 0x00, 0x02]);
    /// ```
    pub fn new(methods: Vec<Method>) -> Self {
        Self {
            ver: SOCKS_VERSION,
            methods,
        }
    }

    /// Whether the client advertised `method`.
    pub fn offers(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Serializes this message. At most 255 methods are written.
    pub fn to_bytes(&self) -> Vec<u8> {
        let methods = &self.methods[..self.methods.len().min(u8::MAX as usize)];
        let mut buf = Vec::with_capacity(2 + methods.len());
        buf.push(self.ver);
        buf.push(methods.len() as u8);
        buf.extend(methods.iter().map(|m| m.to_u8()));
        buf
    }

    /// Reads the header, then exactly `NMETHODS` method bytes.
    ///
    /// # Errors
    /// - [`SocksError::UnsupportedVersion`] if `VER != 0x05`.
    /// - [`SocksError::Truncated`] if the stream ends early.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; 2];
        read_exact(reader, &mut header, "version message").await?;

        let ver = header[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }

        let mut methods = vec![0u8; header[1] as usize];
        read_exact(reader, &mut methods, "method list").await?;

        Ok(Self {
            ver,
            methods: methods.into_iter().map(Method::from).collect(),
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), SocksError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.to_bytes()).await?;
        Ok(())
    }
}

impl TryFrom<&[u8]> for VersionMessage {
    type Error = SocksError;

    /// Attempts to parse a [`VersionMessage`] from raw bytes.
    ///
    /// Returns an error if:
    /// - the buffer is shorter than 2 bytes
    /// - the version is not `0x05`
    /// - the buffer does not contain the declared number of methods
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(SocksError::Truncated("version message"));
        }

        let ver = bytes[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }

        let nmethods = bytes[1] as usize;
        if bytes.len() < 2 + nmethods {
            return Err(SocksError::Truncated("method list"));
        }

        let methods = bytes[2..2 + nmethods]
            .iter()
            .copied()
            .map(Method::from)
            .collect();

        Ok(Self { ver, methods })
    }
}

/// Server's method selection message.
///
/// This message is sent in response to a [`VersionMessage`],
/// informing the client which authentication method has been chosen.
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
///
/// - `VER`: SOCKS version (`0x05`).
/// - `METHOD`: one of the methods proposed by the client, or `0xFF`
///   if none are acceptable.
///
/// Defined in RFC 1928, section 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSelection {
    /// The SOCKS protocol version (must be `0x05`).
    pub ver: u8,
    /// The authentication method selected by the server.
    pub method: Method,
}

impl MethodSelection {
    /// Creates a new [`MethodSelection`] with the given method.
    ///
    /// # Example
    /// ```
    /// use chain_socks5::msg::message::MethodSelection;
    /// use chain_socks5::msg::method::Method;
    ///
    /// let sel = MethodSelection::new(Method::NO_AUTH);
    /// assert_eq!(sel.to_bytes(), [0x05, 0x00]);
    /// ```
    pub fn new(method: Method) -> Self {
        Self {
            ver: SOCKS_VERSION,
            method,
        }
    }

    /// Serializes this [`MethodSelection`] into a 2-byte array.
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.ver, self.method.to_u8()]
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = [0u8; 2];
        read_exact(reader, &mut buf, "method selection").await?;
        Self::try_from(&buf[..])
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), SocksError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.to_bytes()).await?;
        Ok(())
    }
}

impl TryFrom<&[u8]> for MethodSelection {
    type Error = SocksError;

    /// Attempts to parse a [`MethodSelection`] from raw bytes.
    ///
    /// Returns an error if:
    /// - the buffer is shorter than 2 bytes
    /// - the version is not `0x05`
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(SocksError::Truncated("method selection"));
        }

        let ver = bytes[0];
        if ver != SOCKS_VERSION {
            return Err(SocksError::UnsupportedVersion(ver));
        }

        Ok(Self {
            ver,
            method: Method::from(bytes[1]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_exactly_the_declared_methods() {
        let mut bytes: &[u8] = &[0x05, 0x02, 0x00, 0x02, 0x05, 0x01];
        let msg = VersionMessage::read_from(&mut bytes).await.unwrap();
        assert_eq!(msg.methods, vec![Method::NO_AUTH, Method::USER_PASS]);
        // The trailing bytes belong to the next message.
        assert_eq!(bytes, &[0x05, 0x01]);
    }

    #[tokio::test]
    async fn rejects_socks4() {
        let mut bytes: &[u8] = &[0x04, 0x01, 0x00];
        let err = VersionMessage::read_from(&mut bytes).await.unwrap_err();
        assert!(matches!(err, SocksError::UnsupportedVersion(0x04)));
    }

    #[tokio::test]
    async fn short_method_list_is_truncated() {
        let mut bytes: &[u8] = &[0x05, 0x03, 0x00];
        let err = VersionMessage::read_from(&mut bytes).await.unwrap_err();
        assert!(matches!(err, SocksError::Truncated("method list")));
    }

    #[test]
    fn slice_parse_matches_stream_parse() {
        let msg = VersionMessage::try_from(&[0x05, 0x01, 0x02][..]).unwrap();
        assert!(msg.offers(Method::USER_PASS));
        assert!(!msg.offers(Method::NO_AUTH));
    }
}
