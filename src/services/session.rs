use std::collections::HashSet;
use std::fmt;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Opaque bearer credential issued by the backend at login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Credential(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Reads the embedded claims without checking the signature; only the
    /// backend holds the key, the client just needs `exp`.
    pub fn claims(&self) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Claims>(&self.0, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// An undecodable credential counts as expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.claims() {
            Some(c) => c.exp <= now,
            None => true,
        }
    }
}

// never print the token itself
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    // subject identity, the user's email for this backend
    #[serde(default)]
    pub sub: String,
    // expiry (unix timestamp seconds)
    pub exp: i64,
}

/// The credential (if any) the browser presented with this request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Credential>,
}

impl Session {
    pub fn anonymous() -> Self {
        Session { credential: None }
    }

    pub fn with_credential(credential: Credential) -> Self {
        Session {
            credential: Some(credential),
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.credential.is_some()
    }
}

/// Cookie-backed credential storage: one cookie, one credential.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie_name: String,
    secure: bool,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, secure: bool) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secure,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.session_cookie_name.clone(), settings.cookie_secure)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn get(&self, jar: &CookieJar) -> Session {
        jar.get(&self.cookie_name)
            .and_then(|c| Credential::new(c.value()))
            .map(Session::with_credential)
            .unwrap_or_default()
    }

    /// Replaces whatever credential was stored before.
    pub fn set(&self, jar: CookieJar, credential: &Credential) -> CookieJar {
        let mut cookie = Cookie::new(self.cookie_name.clone(), credential.as_str().to_string());
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_path("/");
        if self.secure {
            cookie.set_secure(true);
        }
        jar.add(cookie)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = Cookie::new(self.cookie_name.clone(), "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.make_removal();
        jar.add(cookie)
    }
}
