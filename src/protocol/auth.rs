//! Implicit-grant callback parameters.
//!
//! After the user grants or denies access, Spotify redirects the browser to
//! the configured redirect URI. The outcome is encoded in the URL:
//!
//! Granted, in the fragment:
//!
//! ```text
//! http://127.0.0.1:8888/callback#access_token=BQD...&token_type=Bearer&expires_in=3600&state=3Xk9...
//! ```
//!
//! Denied, in the query string:
//!
//! ```text
//! http://127.0.0.1:8888/callback?error=access_denied&state=3Xk9...
//! ```

use std::time::Duration;

use url::Url;
use veil::Redact;

use crate::{
    error::{Error, Result},
    tokens::MAX_TOKEN_LIFETIME,
};

/// Parameters Spotify appends to the redirect URI.
#[derive(Clone, Default, Eq, PartialEq, Hash, Redact)]
pub struct Callback {
    /// Upstream error code from the query string, e.g. `access_denied`.
    pub error: Option<String>,

    #[redact]
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<Duration>,
    pub state: Option<String>,

    /// Whether the URL carried a non-empty fragment at all.
    pub has_fragment: bool,
}

impl Callback {
    /// Extracts the callback parameters from the full redirect URL.
    ///
    /// Errors in the query string take precedence: when present, the fragment
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `expires_in` is present but not a number of
    /// seconds, or exceeds [`MAX_TOKEN_LIFETIME`].
    pub fn from_url(url: &Url) -> Result<Self> {
        let error = url
            .query_pairs()
            .find(|(key, _)| key == "error")
            .map(|(_, value)| value.into_owned());
        if error.is_some() {
            let state = url
                .query_pairs()
                .find(|(key, _)| key == "state")
                .map(|(_, value)| value.into_owned());
            return Ok(Self {
                error,
                state,
                ..Self::default()
            });
        }

        let fragment = url.fragment().unwrap_or_default();
        let mut callback = Self {
            has_fragment: !fragment.is_empty(),
            ..Self::default()
        };

        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "access_token" => callback.access_token = Some(value.into_owned()),
                "token_type" => callback.token_type = Some(value.into_owned()),
                "expires_in" => {
                    let seconds = value.parse::<u64>().map_err(|e| {
                        Error::invalid_argument(format!("expires_in \"{value}\" invalid: {e}"))
                    })?;
                    let expires_in = Duration::from_secs(seconds);
                    if expires_in > MAX_TOKEN_LIFETIME {
                        return Err(Error::invalid_argument(format!(
                            "expires_in {seconds} exceeds {} seconds",
                            MAX_TOKEN_LIFETIME.as_secs()
                        )));
                    }
                    callback.expires_in = Some(expires_in);
                }
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                _ => trace!("ignoring callback parameter {key}"),
            }
        }

        Ok(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment() {
        let url = Url::parse(
            "http://127.0.0.1:8888/callback#access_token=BQD%2Bx&token_type=Bearer&expires_in=3600&state=abc",
        )
        .unwrap();
        let callback = Callback::from_url(&url).unwrap();
        assert_eq!(callback.access_token.as_deref(), Some("BQD+x"));
        assert_eq!(callback.token_type.as_deref(), Some("Bearer"));
        assert_eq!(callback.expires_in, Some(Duration::from_secs(3600)));
        assert_eq!(callback.state.as_deref(), Some("abc"));
        assert!(callback.error.is_none());
        assert!(callback.has_fragment);
    }

    #[test]
    fn query_error_wins() {
        let url = Url::parse(
            "http://127.0.0.1:8888/callback?error=access_denied&state=abc#access_token=x",
        )
        .unwrap();
        let callback = Callback::from_url(&url).unwrap();
        assert_eq!(callback.error.as_deref(), Some("access_denied"));
        assert_eq!(callback.state.as_deref(), Some("abc"));
        assert!(callback.access_token.is_none());
    }

    #[test]
    fn empty_fragment() {
        let url = Url::parse("http://127.0.0.1:8888/callback").unwrap();
        let callback = Callback::from_url(&url).unwrap();
        assert!(!callback.has_fragment);
        assert!(callback.access_token.is_none());
    }

    #[test]
    fn rejects_bad_expiry() {
        let url = Url::parse("http://127.0.0.1:8888/callback#access_token=x&expires_in=soon").unwrap();
        assert!(Callback::from_url(&url).is_err());
    }

    #[test]
    fn rejects_excessive_expiry() {
        let url = Url::parse(&format!(
            "http://127.0.0.1:8888/callback#access_token=x&expires_in={}",
            u64::MAX
        ))
        .unwrap();
        assert!(Callback::from_url(&url).is_err());

        let url = Url::parse(&format!(
            "http://127.0.0.1:8888/callback#access_token=x&expires_in={}",
            MAX_TOKEN_LIFETIME.as_secs()
        ))
        .unwrap();
        assert_eq!(
            Callback::from_url(&url).unwrap().expires_in,
            Some(MAX_TOKEN_LIFETIME)
        );
    }
}
