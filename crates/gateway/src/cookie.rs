//! Signed session cookies.
//!
//! The browser's continuation session id travels in a cookie of the form
//! `<session_id>.<hex hmac-sha256>`. Cookies that fail verification are
//! treated as absent.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use unitypilot_core::message::SessionId;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "unitypilot_session";

#[derive(Clone)]
pub struct CookieSigner {
    key: Vec<u8>,
    secure: bool,
}

impl CookieSigner {
    pub fn new(secret_key: &str, secure: bool) -> Self {
        Self {
            key: secret_key.as_bytes().to_vec(),
            secure,
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key).unwrap_or_else(|_| unreachable!())
    }

    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.mac();
        mac.update(value.as_bytes());
        format!("{value}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// The signed value, if the signature checks out.
    pub fn verify<'a>(&self, cookie: &'a str) -> Option<&'a str> {
        let (value, signature) = cookie.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(value)
    }

    /// The session carried by the request, if it has a valid cookie.
    pub fn session_from(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.verify(value))
            .filter(|id| !id.is_empty())
            .map(SessionId::from)
    }

    /// `Set-Cookie` value issuing `session`.
    pub fn set_cookie(&self, session: &SessionId) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.sign(session.as_str())
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
