//! Username/password authentication request (RFC 1929 §2).
//!
//! ```text
//! +----+------+----------+------+----------+
//! |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
//! +----+------+----------+------+----------+
//! | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
//! +----+------+----------+------+----------+
//! ```

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::{AUTH_VERSION, Credentials};
use crate::error::SocksError;
use crate::parse::read_exact;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub ver: u8,
    pub uname: String,
    pub passwd: String,
}

impl AuthRequest {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            ver: AUTH_VERSION,
            uname: credentials.username().to_owned(),
            passwd: credentials.password().to_owned(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SocksError> {
        let ulen = u8::try_from(self.uname.len())
            .map_err(|_| SocksError::InvalidCredentials("username longer than 255 bytes"))?;
        let plen = u8::try_from(self.passwd.len())
            .map_err(|_| SocksError::InvalidCredentials("password longer than 255 bytes"))?;

        let mut buf = Vec::with_capacity(3 + self.uname.len() + self.passwd.len());
        buf.push(self.ver);
        buf.push(ulen);
        buf.extend_from_slice(self.uname.as_bytes());
        buf.push(plen);
        buf.extend_from_slice(self.passwd.as_bytes());
        Ok(buf)
    }

    /// Reads `VER | ULEN`, the username, `PLEN`, then the password.
    ///
    /// The version is checked before any credential bytes are consumed.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, SocksError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; 2];
        read_exact(reader, &mut header, "auth request").await?;

        let ver = header[0];
        if ver != AUTH_VERSION {
            return Err(SocksError::UnsupportedAuthVersion(ver));
        }

        // Username plus the password length byte that follows it.
        let mut uname = vec![0u8; header[1] as usize + 1];
        read_exact(reader, &mut uname, "username").await?;
        let plen = uname.pop().unwrap_or_default();

        let mut passwd = vec![0u8; plen as usize];
        read_exact(reader, &mut passwd, "password").await?;

        Ok(Self {
            ver,
            uname: String::from_utf8(uname)
                .map_err(|_| SocksError::AuthFailed("username is not valid UTF-8".into()))?,
            passwd: String::from_utf8(passwd)
                .map_err(|_| SocksError::AuthFailed("password is not valid UTF-8".into()))?,
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

impl TryFrom<&[u8]> for AuthRequest {
    type Error = SocksError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 2 {
            return Err(SocksError::Truncated("auth request"));
        }

        let ver = bytes[0];
        if ver != AUTH_VERSION {
            return Err(SocksError::UnsupportedAuthVersion(ver));
        }

        let ulen = bytes[1] as usize;
        if bytes.len() < 2 + ulen + 1 {
            return Err(SocksError::Truncated("username"));
        }

        let uname = String::from_utf8(bytes[2..2 + ulen].to_vec())
            .map_err(|_| SocksError::AuthFailed("username is not valid UTF-8".into()))?;

        let plen_index = 2 + ulen;
        let plen = bytes[plen_index] as usize;

        if bytes.len() < plen_index + 1 + plen {
            return Err(SocksError::Truncated("password"));
        }

        let passwd = String::from_utf8(bytes[plen_index + 1..plen_index + 1 + plen].to_vec())
            .map_err(|_| SocksError::AuthFailed("password is not valid UTF-8".into()))?;

        Ok(Self { ver, uname, passwd })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_credentials() {
        let mut bytes: &[u8] = &[0x01, 0x03, b'b', b'o', b'b', 0x02, b'p', b'w'];
        let req = AuthRequest::read_from(&mut bytes).await.unwrap();
        assert_eq!(req.uname, "bob");
        assert_eq!(req.passwd, "pw");
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn wrong_version_is_rejected() {
        let mut bytes: &[u8] = &[0x05, 0x03, b'b', b'o', b'b', 0x02, b'p', b'w'];
        let err = AuthRequest::read_from(&mut bytes).await.unwrap_err();
        assert!(matches!(err, SocksError::UnsupportedAuthVersion(0x05)));
    }

    #[tokio::test]
    async fn missing_password_is_truncated() {
        let mut bytes: &[u8] = &[0x01, 0x01, b'u', 0x04, b'p'];
        let err = AuthRequest::read_from(&mut bytes).await.unwrap_err();
        assert!(matches!(err, SocksError::Truncated("password")));
    }

    #[test]
    fn encodes_for_the_wire() {
        let creds = Credentials::new("admin", "secret").unwrap();
        let bytes = AuthRequest::new(&creds).to_bytes().unwrap();
        assert_eq!(AuthRequest::try_from(&bytes[..]).unwrap().passwd, "secret");
        assert_eq!(&bytes[..3], &[0x01, 0x05, b'a']);
    }
}
