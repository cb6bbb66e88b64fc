//! Authentication phase, from both ends of the wire.
//!
//! [`respond`] runs whenever this process is the one being connected to.
//! [`initiate`] runs when a chaining client opens its upstream leg.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::reply::{AuthReply, AuthStatus};
use super::request::AuthRequest;
use super::{AuthPolicy, Credentials};
use crate::error::SocksError;
use crate::msg::message::{MethodSelection, VersionMessage};
use crate::msg::method::Method;

/// Methods a chaining client advertises upstream.
const INITIATOR_METHODS: [Method; 2] = [Method::NO_AUTH, Method::USER_PASS];

/// Server side of method negotiation and, if configured, the credential check.
///
/// The configured method is selected only if the client advertised it; otherwise
/// `0xFF` is sent and the connection must be closed. A failed credential check is
/// answered with a failure status and never retried.
pub async fn respond<S>(stream: &mut S, policy: &AuthPolicy) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let version_msg = VersionMessage::read_from(stream).await?;
    let method = policy.method();

    if !version_msg.offers(method) {
        MethodSelection::new(Method::NO_ACCEPTABLE)
            .write_to(stream)
            .await?;
        return Err(SocksError::MethodNotSupported(method));
    }

    MethodSelection::new(method).write_to(stream).await?;

    let authenticator = match policy {
        AuthPolicy::NoAuth => return Ok(()),
        AuthPolicy::UserPass(authenticator) => authenticator,
    };

    let auth_req = match AuthRequest::read_from(stream).await {
        Ok(req) => req,
        Err(e @ (SocksError::UnsupportedAuthVersion(_) | SocksError::AuthFailed(_))) => {
            let _ = AuthReply::new(AuthStatus::Failure).write_to(stream).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if authenticator.validate(&auth_req.uname, &auth_req.passwd) {
        AuthReply::new(AuthStatus::Success).write_to(stream).await?;
        debug!(user = %auth_req.uname, "credentials accepted");
        Ok(())
    } else {
        AuthReply::new(AuthStatus::Failure).write_to(stream).await?;
        Err(SocksError::AuthFailed(format!(
            "invalid credentials for user {:?}",
            auth_req.uname
        )))
    }
}

/// Client side of method negotiation against an upstream SOCKS5 server.
///
/// Advertises both `NO AUTH` and `USERNAME/PASSWORD`, then follows the server's
/// choice. Returns the method the upstream selected.
pub async fn initiate<S>(
    stream: &mut S,
    credentials: Option<&Credentials>,
) -> Result<Method, SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    VersionMessage::new(INITIATOR_METHODS.to_vec())
        .write_to(stream)
        .await?;

    let selection = MethodSelection::read_from(stream).await?;

    match selection.method {
        Method::NO_AUTH => Ok(Method::NO_AUTH),
        Method::USER_PASS => {
            let credentials = credentials.ok_or_else(|| {
                SocksError::AuthFailed("upstream requires credentials but none are set".into())
            })?;

            AuthRequest::new(credentials).write_to(stream).await?;

            match AuthReply::read_from(stream).await?.status {
                AuthStatus::Success => Ok(Method::USER_PASS),
                AuthStatus::Failure => Err(SocksError::AuthFailed(
                    "upstream rejected credentials".into(),
                )),
            }
        }
        other => Err(SocksError::MethodNotSupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    fn userpass() -> AuthPolicy {
        AuthPolicy::UserPass(Arc::new(Credentials::new("admin", "secret").unwrap()))
    }

    #[tokio::test]
    async fn prefers_configured_method_over_first_offered() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x02, 0x00, 0x02]).await.unwrap();
        client
            .write_all(&[0x01, 0x05, b'a', b'd', b'm', b'i', b'n'])
            .await
            .unwrap();
        client
            .write_all(&[0x06, b's', b'e', b'c', b'r', b'e', b't'])
            .await
            .unwrap();

        respond(&mut server, &userpass()).await.unwrap();

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x02, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn missing_method_gets_no_acceptable() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

        let err = respond(&mut server, &userpass()).await.unwrap_err();
        assert!(matches!(err, SocksError::MethodNotSupported(Method::USER_PASS)));

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }

    #[tokio::test]
    async fn status_follows_the_predicate() {
        for (user, pass, ok) in [("admin", "secret", true), ("admin", "guess", false)] {
            let (mut client, mut server) = duplex(64);
            let mut hello = vec![0x05, 0x01, 0x02, 0x01, user.len() as u8];
            hello.extend_from_slice(user.as_bytes());
            hello.push(pass.len() as u8);
            hello.extend_from_slice(pass.as_bytes());
            client.write_all(&hello).await.unwrap();

            let result = respond(&mut server, &userpass()).await;
            assert_eq!(result.is_ok(), ok);

            let mut reply = [0u8; 4];
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply[3], if ok { 0x00 } else { 0x01 });
        }
    }

    #[tokio::test]
    async fn initiator_skips_subnegotiation_on_no_auth() {
        let (mut ours, mut upstream) = duplex(64);
        upstream.write_all(&[0x05, 0x00]).await.unwrap();

        let creds = Credentials::new("admin", "secret").unwrap();
        let method = initiate(&mut ours, Some(&creds)).await.unwrap();
        assert_eq!(method, Method::NO_AUTH);

        let mut hello = [0u8; 4];
        upstream.read_exact(&mut hello).await.unwrap();
        assert_eq!(hello, [0x05, 0x02, 0x00, 0x02]);
    }

    #[tokio::test]
    async fn initiator_against_responder() {
        let (mut ours, mut theirs) = duplex(64);
        let creds = Credentials::new("admin", "secret").unwrap();

        let server = tokio::spawn(async move { respond(&mut theirs, &userpass()).await });
        let method = initiate(&mut ours, Some(&creds)).await.unwrap();

        assert_eq!(method, Method::USER_PASS);
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn initiator_reports_rejected_credentials() {
        let (mut ours, mut theirs) = duplex(64);
        let creds = Credentials::new("admin", "wrong").unwrap();

        let server = tokio::spawn(async move { respond(&mut theirs, &userpass()).await });
        let err = initiate(&mut ours, Some(&creds)).await.unwrap_err();

        assert!(matches!(err, SocksError::AuthFailed(_)));
        assert!(server.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn initiator_refuses_gssapi() {
        let (mut ours, mut upstream) = duplex(64);
        upstream.write_all(&[0x05, 0x01]).await.unwrap();

        let err = initiate(&mut ours, None).await.unwrap_err();
        assert!(matches!(err, SocksError::MethodNotSupported(_)));
    }
}
