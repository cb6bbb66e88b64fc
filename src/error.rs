use thiserror::Error;

use crate::conn::reply::Rep;
use crate::msg::method::Method;

/// Represents the possible errors that can occur while serving a SOCKS5 connection.
///
/// Every variant is scoped to the connection that produced it; none of them stops the
/// accept loop.
#[derive(Debug, Error)]
pub enum SocksError {
    // ===== Version / Method Selection =====
    /// Occurs when a peer speaks a SOCKS version other than 5.
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Occurs when the peer closes the stream before a message is complete.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// Occurs when no mutually acceptable authentication method exists.
    #[error("authentication method not supported: {0}")]
    MethodNotSupported(Method),

    // ===== Authentication =====
    /// Occurs when the peer uses a username/password sub-negotiation version other than 1.
    #[error("authentication version not supported: {0}")]
    UnsupportedAuthVersion(u8),

    /// Occurs when the credential check fails on either side of the sub-negotiation.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Occurs when locally configured credentials cannot be put on the wire.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    // ===== Connection =====
    /// Occurs when the peer provides an unknown address type.
    #[error("invalid address type: {0}")]
    InvalidAddressType(u8),

    /// Occurs when a domain name is not valid UTF-8 or does not fit in one length byte.
    #[error("invalid domain name")]
    InvalidDomain,

    /// Occurs when the client requests an unknown command.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(u8),

    /// Occurs when the outbound dial (target or upstream) fails or times out.
    #[error("failed to connect to {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Occurs when the upstream exit server answers a chained request with a failure code.
    #[error("upstream rejected request: {0:?}")]
    UpstreamRejected(Rep),

    /// Occurs when the negotiation phase exceeds the configured handshake timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    // ===== Relay =====
    /// Occurs when either direction of the relay fails.
    #[error("relay I/O error: {0}")]
    Relay(#[source] std::io::Error),

    // ===== General =====
    /// Occurs when an I/O error happens.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SocksError {
    /// The reply code a server should send, best effort, before closing after a
    /// failed request phase. `None` means the connection is closed without a reply.
    pub fn reply_code(&self) -> Option<Rep> {
        match self {
            SocksError::UnsupportedCommand(_) => Some(Rep::CommandNotSupported),
            SocksError::InvalidAddressType(_) => Some(Rep::AddressTypeNotSupported),
            SocksError::UnsupportedVersion(_) | SocksError::InvalidDomain => {
                Some(Rep::GeneralFailure)
            }
            SocksError::Dial { .. } | SocksError::UpstreamRejected(_) => {
                Some(Rep::NetworkUnreachable)
            }
            _ => None,
        }
    }
}
