use std::{
    fmt,
    time::{Duration, SystemTime},
};

use veil::Redact;

use crate::error::{Error, Result};

/// Lifetime Spotify documents for implicit-grant tokens, used when a
/// callback omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Longest `expires_in` accepted from a callback.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// A bearer token for the Web API together with its absolute expiry.
///
/// There is no refresh token in the implicit grant: once expired, the user
/// has to log in again.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Redact)]
pub struct AccessToken {
    #[redact]
    pub token: String,
    pub expires_at: SystemTime,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Creates a token that expires `expires_in` after `now`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the expiry is not representable.
    pub fn expiring_in(
        token: impl Into<String>,
        now: SystemTime,
        expires_in: Duration,
    ) -> Result<Self> {
        let expires_at = now.checked_add(expires_in).ok_or_else(|| {
            Error::invalid_argument(format!("token lifetime {expires_in:?} out of range"))
        })?;
        Ok(Self::new(token, expires_at))
    }

    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// A token expiring exactly at `now` counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive() {
        let now = SystemTime::now();
        let token = AccessToken::new("abc", now);
        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::from_secs(1)));
    }

    #[test]
    fn debug_redacts_token() {
        let token =
            AccessToken::expiring_in("secret-value", SystemTime::now(), DEFAULT_TOKEN_LIFETIME)
                .unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret-value"));
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let err = AccessToken::expiring_in("abc", SystemTime::now(), Duration::MAX).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidArgument);
    }
}
