use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};

/// Edit tokens are good for about half an hour server-side; we renew well
/// before that (value in microseconds, matching cache timestamps).
const EDIT_TOKEN_TTL_USEC: i64 = 1_500_000_000;

/// Authentication capability for the reader API.
///
/// Holds the long-lived login token (obtained out-of-band; the login
/// handshake and credential storage are not this crate's concern) and caches
/// the short-lived edit token required by mutating endpoints. The token cache
/// is interior-mutable so a shared `Authenticator` can be invalidated from
/// any synchronizer that observes a 403.
pub struct Authenticator {
    login_token: SecretString,
    edit_token: Mutex<Option<EditToken>>,
}

#[derive(Clone)]
struct EditToken {
    token: String,
    expires_at_usec: i64,
}

impl Authenticator {
    pub fn new(login_token: SecretString) -> Self {
        Self {
            login_token,
            edit_token: Mutex::new(None),
        }
    }

    /// Value for the `Authorization` header on every API request.
    pub fn auth_header(&self) -> String {
        format!("GoogleLogin auth={}", self.login_token.expose_secret())
    }

    /// Returns the cached edit token if it has not expired.
    pub fn cached_edit_token(&self, now_usec: i64) -> Option<String> {
        let guard = self.edit_token.lock().expect("edit token lock poisoned");
        guard
            .as_ref()
            .filter(|t| now_usec < t.expires_at_usec)
            .map(|t| t.token.clone())
    }

    /// Caches a freshly fetched edit token.
    pub fn store_edit_token(&self, token: String, now_usec: i64) {
        let mut guard = self.edit_token.lock().expect("edit token lock poisoned");
        *guard = Some(EditToken {
            token,
            expires_at_usec: now_usec + EDIT_TOKEN_TTL_USEC,
        });
    }

    /// Drops the cached edit token. Called when a mutating endpoint answers
    /// 403; the next pass fetches a fresh one.
    pub fn invalidate_edit_token(&self) {
        let mut guard = self.edit_token.lock().expect("edit token lock poisoned");
        *guard = None;
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("login_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
