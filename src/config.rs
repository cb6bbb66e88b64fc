//! Per-server policy, fixed before the listener starts accepting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use crate::auth::AuthPolicy;
use crate::auth::{Authenticator, Credentials};

/// Dial timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote exit server a chaining client forwards to.
#[derive(Clone)]
pub struct Upstream {
    pub addr: String,
    pub credentials: Option<Credentials>,
}

impl Upstream {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            credentials: None,
        }
    }

    /// Credentials presented if the upstream selects `USERNAME/PASSWORD`.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("addr", &self.addr)
            .field(
                "user",
                &self.credentials.as_ref().map(|c| c.username().to_owned()),
            )
            .finish()
    }
}

/// What a listener does with an accepted connection.
#[derive(Clone, Debug)]
pub enum Role {
    /// Terminal server: negotiate with `AuthPolicy`, then dial targets directly.
    Exit(AuthPolicy),
    /// Local client: accept without authentication, parse the request, and replay it
    /// through a freshly authenticated session with the upstream.
    Chain(Upstream),
    /// Local client that only rewrites the authentication phase and relays the
    /// application's request and everything after it unparsed.
    Passthrough(Upstream),
}

/// Immutable server configuration, shared read-only by every connection.
#[derive(Clone, Debug)]
pub struct Config {
    pub role: Role,
    pub connect_timeout: Duration,
    /// Upper bound on negotiation plus request decoding; `None` means unbounded.
    pub handshake_timeout: Option<Duration>,
}

impl Config {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: None,
        }
    }

    /// An exit server that accepts `NO AUTH` clients.
    pub fn exit() -> Self {
        Self::new(Role::Exit(AuthPolicy::NoAuth))
    }

    /// An exit server that requires username/password, validated by `validator`.
    ///
    /// # Example
    /// ```
    /// use chain_socks5::config::Config;
    ///
    /// let config = Config::exit_with_userpass(|u, p| u == "admin" && p == "admin");
    /// ```
    pub fn exit_with_userpass<F>(validator: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self::exit_with_authenticator(validator)
    }

    /// An exit server that requires username/password, validated by any [`Authenticator`].
    pub fn exit_with_authenticator<A>(authenticator: A) -> Self
    where
        A: Authenticator + 'static,
    {
        Self::new(Role::Exit(AuthPolicy::UserPass(Arc::new(authenticator))))
    }

    pub fn chain(upstream: Upstream) -> Self {
        Self::new(Role::Chain(upstream))
    }

    pub fn passthrough(upstream: Upstream) -> Self {
        Self::new(Role::Passthrough(upstream))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// The policy applied to inbound clients. Chaining roles trust the local
    /// application and always negotiate `NO AUTH`.
    pub fn inbound_policy(&self) -> AuthPolicy {
        match &self.role {
            Role::Exit(policy) => policy.clone(),
            Role::Chain(_) | Role::Passthrough(_) => AuthPolicy::NoAuth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::method::Method;

    #[test]
    fn chaining_roles_never_ask_the_application_for_credentials() {
        let upstream =
            Upstream::new("10.0.0.1:1080").with_credentials(Credentials::new("u", "p").unwrap());
        assert_eq!(
            Config::chain(upstream.clone()).inbound_policy().method(),
            Method::NO_AUTH
        );
        assert_eq!(
            Config::passthrough(upstream).inbound_policy().method(),
            Method::NO_AUTH
        );
        assert_eq!(
            Config::exit_with_userpass(|_, _| true)
                .inbound_policy()
                .method(),
            Method::USER_PASS
        );
    }
}
