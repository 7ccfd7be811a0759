//! The upstream access/refresh token pair.

use std::fmt;
use std::time::{Duration, SystemTime};

/// An upstream access token together with the refresh token that renews it.
///
/// Pairs are never mutated; a refresh produces a new pair that supersedes
/// the old one. Token values are redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access_token: String,
    refresh_token: String,
    issued_at: SystemTime,
}

impl CredentialPair {
    /// Creates a pair issued at `issued_at`.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: SystemTime,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at,
        }
    }

    /// Bearer token for upstream API calls (sensitive, never logged).
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Token used to obtain the next pair (sensitive, never logged).
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// When the pair was issued or last updated.
    #[must_use]
    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    /// Age at `now`. A clock that went backwards counts as age zero.
    #[must_use]
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.issued_at).unwrap_or(Duration::ZERO)
    }

    /// `true` once the pair is older than `validity`.
    #[must_use]
    pub fn is_stale(&self, validity: Duration, now: SystemTime) -> bool {
        self.age(now) > validity
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh", SystemTime::now());
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret-access"), "leaked access token: {debug}");
        assert!(!debug.contains("secret-refresh"), "leaked refresh token: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_staleness_window() {
        let now = SystemTime::now();
        let validity = Duration::from_secs(15 * 60);
        let fresh = CredentialPair::new("a", "r", now - Duration::from_secs(60));
        let stale = CredentialPair::new("a", "r", now - Duration::from_secs(16 * 60));
        assert!(!fresh.is_stale(validity, now));
        assert!(stale.is_stale(validity, now));
    }

    #[test]
    fn test_future_issue_time_is_not_stale() {
        let now = SystemTime::now();
        let pair = CredentialPair::new("a", "r", now + Duration::from_secs(30));
        assert_eq!(pair.age(now), Duration::ZERO);
    }
}
