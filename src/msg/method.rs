//! SOCKS5 authentication methods (RFC 1928).
//!
//! This module defines the authentication method identifiers
//! used in the version negotiation phase of the SOCKS5 protocol.
//!
//! - [`FixedMethod`] → reserved values defined in RFC 1928
//! - [`Method`] → general representation, including fixed,
//!   IANA-assigned, and private methods
//!
//! See [RFC 1928, section 3](https://www.rfc-editor.org/rfc/rfc1928#section-3).

use std::fmt;

/// Fixed authentication methods defined in RFC 1928.
///
/// These values are reserved and have well-defined meanings.
///
/// ```text
/// 0x00 → No authentication required
/// 0x01 → GSS-API authentication (never selected by this crate)
/// 0x02 → Username/password authentication
/// 0xFF → No acceptable methods
/// ```
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FixedMethod {
    /// No authentication required (`0x00`).
    NoAuth = 0x00,
    /// GSS-API authentication (`0x01`).
    GssApi = 0x01,
    /// Username/password authentication (`0x02`).
    UsePass = 0x02,
    /// No acceptable methods (`0xFF`).
    NoAcceptable = 0xFF,
}

impl fmt::Display for FixedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FixedMethod::NoAuth => "NO AUTHENTICATION REQUIRED",
            FixedMethod::GssApi => "GSSAPI",
            FixedMethod::UsePass => "USERNAME/PASSWORD",
            FixedMethod::NoAcceptable => "NO ACCEPTABLE METHODS",
        };
        write!(f, "{}", msg)
    }
}

/// Represents any SOCKS5 authentication method.
///
/// This includes:
/// - [`FixedMethod`] values
/// - IANA-assigned methods (`0x03`–`0x7F`)
/// - Private methods (`0x80`–`0xFE`)
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Method {
    /// A fixed, reserved method defined in RFC 1928.
    Fixed(FixedMethod),
    /// An IANA-assigned method (`0x03`–`0x7F`).
    IanaAssigned(u8),
    /// A private-use method (`0x80`–`0xFE`).
    Private(u8),
}

impl Method {
    pub const NO_AUTH: Method = Method::Fixed(FixedMethod::NoAuth);
    pub const USER_PASS: Method = Method::Fixed(FixedMethod::UsePass);
    pub const NO_ACCEPTABLE: Method = Method::Fixed(FixedMethod::NoAcceptable);

    /// Converts a [`Method`] into its byte representation.
    pub fn to_u8(self) -> u8 {
        match self {
            Method::Fixed(f) => f as u8,
            Method::IanaAssigned(b) => b,
            Method::Private(b) => b,
        }
    }
}

impl From<u8> for Method {
    /// Every byte is a method code:
    /// - `0x00`, `0x01`, `0x02`, `0xFF` → [`FixedMethod`]
    /// - `0x03`–`0x7F` → [`Method::IanaAssigned`]
    /// - `0x80`–`0xFE` → [`Method::Private`]
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Method::Fixed(FixedMethod::NoAuth),
            0x01 => Method::Fixed(FixedMethod::GssApi),
            0x02 => Method::Fixed(FixedMethod::UsePass),
            0xFF => Method::Fixed(FixedMethod::NoAcceptable),
            0x03..=0x7F => Method::IanaAssigned(byte),
            0x80..=0xFE => Method::Private(byte),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Fixed(fm) => write!(f, "{}", fm),
            Method::IanaAssigned(b) => write!(f, "IANA ASSIGNED METHOD 0x{:02X}", b),
            Method::Private(b) => write!(f, "PRIVATE METHOD 0x{:02X}", b),
        }
    }
}
