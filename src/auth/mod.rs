//! Username/password authentication (RFC 1929) and the method negotiation driver.
//!
//! Credential checks are pluggable through [`Authenticator`]; any
//! `Fn(&str, &str) -> bool` closure qualifies, as does a static [`Credentials`] pair.

use std::fmt;
use std::sync::Arc;

use crate::error::SocksError;
use crate::msg::method::Method;

pub mod negotiate;
pub mod reply;
pub mod request;

pub use negotiate::{initiate, respond};

/// Sub-negotiation version (`VER`) of RFC 1929.
pub const AUTH_VERSION: u8 = 0x01;

/// Decides whether a username/password pair may use the proxy.
pub trait Authenticator: Send + Sync {
    fn validate(&self, username: &str, password: &str) -> bool;
}

impl<F> Authenticator for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn validate(&self, username: &str, password: &str) -> bool {
        self(username, password)
    }
}

/// A username/password pair that fits the RFC 1929 wire format.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// # Errors
    /// [`SocksError::InvalidCredentials`] unless both fields are 1 to 255 bytes long.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SocksError> {
        let username = username.into();
        let password = password.into();
        if !(1..=255).contains(&username.len()) {
            return Err(SocksError::InvalidCredentials(
                "username must be 1 to 255 bytes",
            ));
        }
        if !(1..=255).contains(&password.len()) {
            return Err(SocksError::InvalidCredentials(
                "password must be 1 to 255 bytes",
            ));
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Authenticator for Credentials {
    fn validate(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// The single method a responder accepts, with the check it implies.
#[derive(Clone)]
pub enum AuthPolicy {
    /// Accept clients that offer `NO AUTHENTICATION REQUIRED`.
    NoAuth,
    /// Require `USERNAME/PASSWORD` and validate every pair.
    UserPass(Arc<dyn Authenticator>),
}

impl AuthPolicy {
    pub fn method(&self) -> Method {
        match self {
            AuthPolicy::NoAuth => Method::NO_AUTH,
            AuthPolicy::UserPass(_) => Method::USER_PASS,
        }
    }
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}
