use std::fmt;

use tokio::time::Instant;

use crate::backend::TokenGrant;

/// Current token state of one driver instance.
#[derive(Clone)]
pub struct SessionCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Instant,
}

impl SessionCredentials {
    /// Builds a session from a fresh grant received at `now`.
    pub fn from_grant(grant: TokenGrant, now: Instant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: now + grant.expires_in,
        }
    }

    /// A token is usable only while its expiry is strictly in the future.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Applies a refresh grant. The refresh token is kept unless the
    /// provider sent a new one.
    pub fn apply_refresh(&mut self, grant: TokenGrant, now: Instant) {
        self.access_token = grant.access_token;
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token;
        }
        self.expires_at = now + grant.expires_in;
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn grant(token: &str, refresh: Option<&str>, secs: u64) -> TokenGrant {
        TokenGrant {
            access_token: token.into(),
            refresh_token: refresh.map(Into::into),
            expires_in: Duration::from_secs(secs),
        }
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Instant::now();
        let s = SessionCredentials::from_grant(grant("a", None, 60), now);
        assert!(!s.is_expired_at(now));
        assert!(!s.is_expired_at(now + Duration::from_secs(59)));
        assert!(s.is_expired_at(now + Duration::from_secs(60)));
    }

    #[test]
    fn refresh_keeps_refresh_token() {
        let now = Instant::now();
        let mut s = SessionCredentials::from_grant(grant("a", Some("rt"), 60), now);
        s.apply_refresh(grant("b", None, 120), now + Duration::from_secs(61));
        assert_eq!(s.access_token, "b");
        assert_eq!(s.refresh_token.as_deref(), Some("rt"));
        assert_eq!(s.expires_at, now + Duration::from_secs(181));
    }

    #[test]
    fn debug_redacts_tokens() {
        let s = SessionCredentials::from_grant(grant("secret-at", Some("secret-rt"), 60), Instant::now());
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("secret-at"));
        assert!(!dbg.contains("secret-rt"));
    }
}
