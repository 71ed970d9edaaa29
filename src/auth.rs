//! Implicit-grant login.
//!
//! Login is a round trip through the browser:
//!
//! 1. [`Authorizer::authorize_url`] stores a fresh CSRF state and returns the
//!    Spotify consent page URL.
//! 2. Spotify redirects to the configured redirect URI, with the token in
//!    the fragment or an error in the query string.
//! 3. [`Authorizer::complete`] checks the state and establishes the session.
//!
//! The stored state is single-use: it is discarded as soon as a callback has
//! been checked against it, whether or not it matched.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use url::Url;

use crate::{
    config::Config,
    error::{Error, Result},
    nonce,
    protocol::auth::Callback,
    session::SessionGuard,
    store::{KeyValueStore, AUTH_STATE_KEY},
    tokens::{AccessToken, DEFAULT_TOKEN_LIFETIME},
};

/// How long a failed login is shown before the user is sent back to login.
pub const LOGIN_REDIRECT_DELAY: Duration = Duration::from_secs(3);

pub struct Authorizer {
    client_id: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    show_dialog: bool,
    authorize_url: Url,

    store: Arc<dyn KeyValueStore>,
    session: Arc<SessionGuard>,
}

impl Authorizer {
    #[must_use]
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>, session: Arc<SessionGuard>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            show_dialog: config.show_dialog,
            authorize_url: config.authorize_url.clone(),
            store,
            session,
        }
    }

    /// Returns the URL of the consent page and remembers its CSRF state.
    ///
    /// Each call replaces the previously stored state.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be stored.
    pub fn authorize_url(&self) -> Result<Url> {
        let state = nonce::generate_state();
        self.store.set(AUTH_STATE_KEY, &state)?;

        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "token")
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("show_dialog", if self.show_dialog { "true" } else { "false" });

        debug!("authorization requested with scopes: {}", self.scopes.join(" "));
        Ok(url)
    }

    /// Completes login from the URL Spotify redirected to.
    ///
    /// On success the session is established and its token returned. A
    /// failed completion never leaves a session behind.
    ///
    /// # Errors
    ///
    /// * `Unauthenticated` if Spotify reported an error, e.g. the user denied
    ///   access
    /// * `InvalidArgument` if the URL carries no authorization data or no
    ///   access token
    /// * `PermissionDenied` if the returned state does not match the stored
    ///   one, which indicates a forged callback
    pub fn complete(&self, callback_url: &Url) -> Result<AccessToken> {
        self.complete_at(callback_url, SystemTime::now())
    }

    fn complete_at(&self, callback_url: &Url, now: SystemTime) -> Result<AccessToken> {
        let callback = Callback::from_url(callback_url)?;
        trace!("callback: {callback:?}");

        if let Some(reason) = callback.error {
            self.take_state()?;
            return Err(Error::unauthenticated(format!(
                "authorization failed: {reason}"
            )));
        }

        if !callback.has_fragment {
            return Err(Error::invalid_argument("no authorization data received"));
        }

        let expected = self.take_state()?;
        match (expected, callback.state.as_deref()) {
            (Some(expected), Some(returned)) if expected == returned => {}
            (None, _) => {
                warn!("callback without pending login, possible forgery");
                return Err(Error::permission_denied("no login in progress"));
            }
            _ => {
                warn!("callback state mismatch, possible forgery");
                return Err(Error::permission_denied("state mismatch"));
            }
        }

        let token = callback
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::invalid_argument("no access token received"))?;
        let expires_in = callback.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME);

        let token = AccessToken::expiring_in(token, now, expires_in)?;
        self.session.establish(&token)?;
        Ok(token)
    }

    fn take_state(&self) -> Result<Option<String>> {
        let state = self.store.get(AUTH_STATE_KEY)?;
        self.store.remove(AUTH_STATE_KEY)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        store::{MemoryStore, ACCESS_TOKEN_KEY, TOKEN_EXPIRATION_KEY},
        tokens::MAX_TOKEN_LIFETIME,
    };

    fn authorizer() -> (Arc<MemoryStore>, Arc<SessionGuard>, Authorizer) {
        let config = Config::new(
            "0123abcd",
            Url::parse("http://127.0.0.1:8888/callback").unwrap(),
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionGuard::new(store.clone()).unwrap());
        let authorizer = Authorizer::new(&config, store.clone(), Arc::clone(&session));
        (store, session, authorizer)
    }

    fn state_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    fn callback(fragment: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:8888/callback#{fragment}")).unwrap()
    }

    #[test]
    fn authorize_url_carries_all_parameters() {
        let (store, _, authorizer) = authorizer();
        let url = authorizer.authorize_url().unwrap();

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(get("client_id"), Some("0123abcd"));
        assert_eq!(get("response_type"), Some("token"));
        assert_eq!(get("redirect_uri"), Some("http://127.0.0.1:8888/callback"));
        assert_eq!(get("show_dialog"), Some("true"));
        assert!(get("scope").unwrap().contains("user-top-read"));

        let state = state_of(&url);
        assert_eq!(state.len(), nonce::STATE_LENGTH);
        assert_eq!(store.get(AUTH_STATE_KEY).unwrap(), Some(state));
    }

    #[test]
    fn matching_state_establishes_session() {
        let (store, session, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        let now = SystemTime::now();
        let token = authorizer
            .complete_at(
                &callback(&format!(
                    "access_token=BQD&token_type=Bearer&expires_in=60&state={state}"
                )),
                now,
            )
            .unwrap();

        assert_eq!(token.as_str(), "BQD");
        assert_eq!(token.expires_at, now + Duration::from_secs(60));
        assert!(session.is_authenticated());
        assert!(store.get(AUTH_STATE_KEY).unwrap().is_none());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("BQD"));
    }

    #[test]
    fn missing_expiry_defaults_to_an_hour() {
        let (_, _, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        let now = SystemTime::now();
        let token = authorizer
            .complete_at(&callback(&format!("access_token=BQD&state={state}")), now)
            .unwrap();
        assert_eq!(token.expires_at, now + DEFAULT_TOKEN_LIFETIME);
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let (store, session, authorizer) = authorizer();
        authorizer.authorize_url().unwrap();

        let err = authorizer
            .complete(&callback("access_token=BQD&expires_in=3600&state=forged"))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert!(!session.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(store.get(TOKEN_EXPIRATION_KEY).unwrap().is_none());
        assert!(store.get(AUTH_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn missing_state_is_rejected() {
        let (store, _, authorizer) = authorizer();
        authorizer.authorize_url().unwrap();

        let err = authorizer
            .complete(&callback("access_token=BQD&expires_in=3600"))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn callback_without_pending_login_is_rejected() {
        let (store, _, authorizer) = authorizer();

        let err = authorizer
            .complete(&callback("access_token=BQD&state=abc"))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn state_is_single_use() {
        let (_, _, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());
        let url = callback(&format!("access_token=BQD&state={state}"));

        authorizer.complete(&url).unwrap();
        let err = authorizer.complete(&url).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[test]
    fn upstream_error_is_unauthenticated() {
        let (store, _, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        let url = Url::parse(&format!(
            "http://127.0.0.1:8888/callback?error=access_denied&state={state}"
        ))
        .unwrap();
        let err = authorizer.complete(&url).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthenticated);
        assert!(err.to_string().contains("access_denied"));
        assert!(store.get(AUTH_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn empty_callback_is_rejected() {
        let (store, _, authorizer) = authorizer();
        authorizer.authorize_url().unwrap();

        let err = authorizer
            .complete(&Url::parse("http://127.0.0.1:8888/callback").unwrap())
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        // Nothing was checked, so the login is still pending.
        assert!(store.get(AUTH_STATE_KEY).unwrap().is_some());
    }

    #[test]
    fn excessive_expiry_is_rejected() {
        let (store, session, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        let err = authorizer
            .complete(&callback(&format!(
                "access_token=BQD&expires_in={}&state={state}",
                u64::MAX
            )))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(!session.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(store.get(TOKEN_EXPIRATION_KEY).unwrap().is_none());
    }

    #[test]
    fn longest_expiry_keeps_the_session() {
        let (_, session, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        authorizer
            .complete(&callback(&format!(
                "access_token=BQD&expires_in={}&state={state}",
                MAX_TOKEN_LIFETIME.as_secs()
            )))
            .unwrap();

        assert!(session.check().unwrap());
        assert!(session.is_authenticated());
    }

    #[test]
    fn missing_token_is_rejected() {
        let (store, _, authorizer) = authorizer();
        let state = state_of(&authorizer.authorize_url().unwrap());

        let err = authorizer
            .complete(&callback(&format!("token_type=Bearer&state={state}")))
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }
}
