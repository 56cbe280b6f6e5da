//! Sealed session cookies.
//!
//! The cookie IS the session: `{id, rut, exp}` is encrypted and authenticated
//! with ChaCha20-Poly1305 under a key derived from the server secret, so there
//! is no server-side session table. Anything that fails to open (tampered,
//! sealed under another secret, expired, not base64) reads as "no session".

use std::fmt;
use std::time::Duration;

use argon2::{Algorithm, Argon2, Params, Version};
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::SessionUser;

pub const SESSION_COOKIE: &str = "financy_session";
pub const MIN_SECRET_LEN: usize = 32;
/// Fourteen days minus a minute, so the cookie dies before the sealed expiry.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(14 * 24 * 3600 - 60);
/// Longest lifetime `Config` accepts for a session cookie.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(5 * 365 * 24 * 3600);

const NONCE_LEN: usize = 12;
const KEY_SALT: &[u8] = b"financy.session-key.v1";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session secret must be at least {} characters", MIN_SECRET_LEN)]
    WeakSecret,
    #[error("invalid cookie name {0:?}")]
    CookieName(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("sealing failed: {0}")]
    Seal(String),
    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

/// Everything the session gate needs, built once at startup.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    /// Adds the `Secure` attribute; on in production only.
    pub secure: bool,
    pub max_age: Duration,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: SESSION_COOKIE.to_string(),
            secure: false,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self { self.secure = secure; self }

    pub fn with_max_age(mut self, max_age: Duration) -> Self { self.max_age = max_age; self }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .field("max_age", &self.max_age)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SealedClaims {
    id: String,
    rut: String,
    /// Unix seconds.
    exp: i64,
}

/// Issues, reads and destroys session cookies.
pub struct SessionGate {
    config: SessionConfig,
    cipher: ChaCha20Poly1305,
}

impl SessionGate {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        if config.secret.chars().count() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret);
        }
        if config.cookie_name.is_empty()
            || !config.cookie_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SessionError::CookieName(config.cookie_name.clone()));
        }
        let key = derive_key(config.secret.as_bytes())?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        Ok(Self { config, cipher })
    }

    /// Seal `user` and return the matching `Set-Cookie` header value.
    pub fn issue(&self, user: &SessionUser) -> Result<HeaderValue, SessionError> {
        let sealed = self.seal(user, chrono::Utc::now().timestamp())?;
        let cookie = format!(
            "{}={}; {}; Max-Age={}",
            self.config.cookie_name,
            sealed,
            self.cookie_attrs(),
            self.config.max_age.as_secs()
        );
        Ok(HeaderValue::from_str(&cookie)?)
    }

    /// The session carried by the request, if any. Every failure is `None`.
    pub fn read(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let value = parse_cookie(headers, &self.config.cookie_name)?;
        self.unseal(&value, chrono::Utc::now().timestamp())
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn destroy(&self) -> Result<HeaderValue, SessionError> {
        let cookie = format!(
            "{}=; {}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.config.cookie_name,
            self.cookie_attrs()
        );
        Ok(HeaderValue::from_str(&cookie)?)
    }

    fn cookie_attrs(&self) -> &'static str {
        if self.config.secure { "Path=/; HttpOnly; SameSite=Lax; Secure" } else { "Path=/; HttpOnly; SameSite=Lax" }
    }

    fn seal(&self, user: &SessionUser, now: i64) -> Result<String, SessionError> {
        let claims = SealedClaims {
            id: user.id.clone(),
            rut: user.rut.clone(),
            exp: i64::try_from(self.config.max_age.as_secs())
                .ok()
                .and_then(|ttl| now.checked_add(ttl))
                .ok_or_else(|| SessionError::Seal(format!("max age {:?} out of range", self.config.max_age)))?,
        };
        let plaintext = serde_json::to_vec(&claims).map_err(|e| SessionError::Seal(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| SessionError::Seal(e.to_string()))?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| SessionError::Seal(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(out))
    }

    fn unseal(&self, value: &str, now: i64) -> Option<SessionUser> {
        let raw = match base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(value) {
            Ok(raw) => raw,
            Err(_) => { debug!("session cookie is not base64"); return None; }
        };
        if raw.len() <= NONCE_LEN {
            debug!("session cookie too short");
            return None;
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = match self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(p) => p,
            Err(_) => { debug!("session cookie failed authentication"); return None; }
        };
        let claims: SealedClaims = serde_json::from_slice(&plaintext).ok()?;
        if claims.exp <= now {
            debug!(rut = %claims.rut, "session cookie expired");
            return None;
        }
        Some(SessionUser { id: claims.id, rut: claims.rut })
    }
}

/// 256-bit cipher key from the configured secret (Argon2id, fixed application salt).
fn derive_key(secret: &[u8]) -> Result<[u8; 32], SessionError> {
    let params = Params::new(Params::DEFAULT_M_COST, Params::DEFAULT_T_COST, Params::DEFAULT_P_COST, Some(32))
        .map_err(|e| SessionError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(secret, KEY_SALT, &mut key)
        .map_err(|e| SessionError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(axum::http::header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-test";

    fn gate() -> SessionGate { SessionGate::new(SessionConfig::new(SECRET)).unwrap() }

    fn user() -> SessionUser { SessionUser { id: "user-1".into(), rut: "123456789".into() } }

    /// Turn a `Set-Cookie` value into the request headers a browser would send back.
    fn request_with(set_cookie: &HeaderValue) -> HeaderMap {
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut h = HeaderMap::new();
        h.insert(COOKIE, HeaderValue::from_str(&format!("theme=dark; {pair}")).unwrap());
        h
    }

    #[test]
    fn issue_then_read_returns_same_user() {
        let g = gate();
        let set = g.issue(&user()).unwrap();
        assert_eq!(g.read(&request_with(&set)), Some(user()));
    }

    #[test]
    fn cookie_flags_depend_on_environment() {
        let dev = gate().issue(&user()).unwrap();
        let dev = dev.to_str().unwrap();
        assert!(dev.starts_with("financy_session="));
        assert!(dev.contains("HttpOnly") && dev.contains("SameSite=Lax") && dev.contains("Path=/"));
        assert!(!dev.contains("Secure"));

        let prod = SessionGate::new(SessionConfig::new(SECRET).with_secure(true)).unwrap();
        assert!(prod.issue(&user()).unwrap().to_str().unwrap().contains("; Secure"));
    }

    #[test]
    fn destroyed_cookie_reads_as_absent() {
        let g = gate();
        let cleared = g.destroy().unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
        assert_eq!(g.read(&request_with(&cleared)), None);
    }

    #[test]
    fn tampering_any_byte_reads_as_absent() {
        let g = gate();
        let sealed = g.seal(&user(), 1_000).unwrap();
        let mut raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        for i in [0, NONCE_LEN, raw.len() - 1] {
            raw[i] ^= 0x01;
            let forged = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&raw);
            assert_eq!(g.unseal(&forged, 1_000), None, "byte {i}");
            raw[i] ^= 0x01;
        }
        assert_eq!(g.unseal(&sealed, 1_000), Some(user()));
    }

    #[test]
    fn garbage_cookie_values_read_as_absent() {
        let g = gate();
        assert_eq!(g.unseal("", 0), None);
        assert_eq!(g.unseal("!!!not base64!!!", 0), None);
        assert_eq!(g.unseal("AAAA", 0), None);
        assert_eq!(g.read(&HeaderMap::new()), None);
    }

    #[test]
    fn other_secret_cannot_open_cookie() {
        let a = gate();
        let b = SessionGate::new(SessionConfig::new("another-secret-that-is-long-enough-xx")).unwrap();
        let sealed = a.seal(&user(), 0).unwrap();
        assert_eq!(b.unseal(&sealed, 0), None);
    }

    #[test]
    fn expiry_is_enforced() {
        let g = SessionGate::new(SessionConfig::new(SECRET).with_max_age(Duration::from_secs(60))).unwrap();
        let sealed = g.seal(&user(), 1_000).unwrap();
        assert!(g.unseal(&sealed, 1_059).is_some());
        assert!(g.unseal(&sealed, 1_060).is_none());
    }

    #[test]
    fn oversized_max_age_is_an_error_not_a_panic() {
        let g = SessionGate::new(SessionConfig::new(SECRET).with_max_age(Duration::from_secs(i64::MAX as u64))).unwrap();
        assert!(matches!(g.issue(&user()), Err(SessionError::Seal(_))));
        let g = SessionGate::new(SessionConfig::new(SECRET).with_max_age(Duration::from_secs(u64::MAX))).unwrap();
        assert!(matches!(g.seal(&user(), 0), Err(SessionError::Seal(_))));
    }

    #[test]
    fn rejects_weak_secret_and_bad_cookie_name() {
        assert!(matches!(SessionGate::new(SessionConfig::new("short")), Err(SessionError::WeakSecret)));
        let mut cfg = SessionConfig::new(SECRET);
        cfg.cookie_name = "bad name;".into();
        assert!(matches!(SessionGate::new(cfg), Err(SessionError::CookieName(_))));
    }

    #[test]
    fn debug_output_hides_secret() {
        let dbg = format!("{:?}", SessionConfig::new(SECRET));
        assert!(!dbg.contains(SECRET));
    }

    #[test]
    fn parse_cookie_picks_named_pair() {
        let mut h = HeaderMap::new();
        h.append(COOKIE, HeaderValue::from_static("a=1; financy_session=xyz"));
        assert_eq!(parse_cookie(&h, "financy_session").as_deref(), Some("xyz"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }
}
