//! An asynchronous SOCKS5 proxy built on Tokio, usable in two roles.
//!
//! As an **exit server** it negotiates with clients (RFC 1928, with optional
//! username/password authentication per RFC 1929) and connects directly to the
//! requested target. As a **chaining client** it accepts unauthenticated local
//! applications and replays their requests through a fully authenticated session
//! with a remote exit server, splicing both conversations into one byte stream.
//!
//! Only `CONNECT` is served. `BIND` is answered with "command not supported";
//! `UDP ASSOCIATE` is accepted and ignored.
//!
//! ```no_run
//! use chain_socks5::{Config, Socks5};
//!
//! # async fn run() -> Result<(), chain_socks5::SocksError> {
//! let config = Config::exit_with_userpass(|u, p| u == "admin" && p == "admin");
//! Socks5::bind("0.0.0.0:1080", config).await?.run().await
//! # }
//! ```

use std::fmt;

pub mod auth;
pub mod chain;
pub mod config;
pub mod conn;
pub mod error;
pub mod handler;
pub mod msg;
pub mod parse;
pub mod relay;
pub mod server;

pub use auth::{AuthPolicy, Authenticator, Credentials};
pub use config::{Config, Role, Upstream};
pub use error::SocksError;
pub use server::Socks5;

/// Protocol version byte (`VER`) of every SOCKS5 message outside sub-negotiation.
pub const SOCKS_VERSION: u8 = 0x05;

/// Reserved byte (`RSV`) as written on the wire.
pub const RSV: u8 = 0x00;

/// Represents the address type in SOCKS5 messages.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ATYP {
    /// IPv4 address
    V4 = 0x01,
    /// Domain name
    DomainName = 0x03,
    /// IPv6 address
    V6 = 0x04,
}

impl TryFrom<u8> for ATYP {
    type Error = SocksError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(ATYP::V4),
            0x03 => Ok(ATYP::DomainName),
            0x04 => Ok(ATYP::V6),
            other => Err(SocksError::InvalidAddressType(other)),
        }
    }
}

impl fmt::Display for ATYP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ATYP::V4 => write!(f, "IPv4"),
            ATYP::V6 => write!(f, "IPv6"),
            ATYP::DomainName => write!(f, "Domain"),
        }
    }
}
