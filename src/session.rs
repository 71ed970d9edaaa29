//! Session lifecycle on top of a [`KeyValueStore`].
//!
//! A session is an access token and its absolute expiry, persisted under
//! [`ACCESS_TOKEN_KEY`] and [`TOKEN_EXPIRATION_KEY`]. The [`SessionGuard`]
//! decides whether the session is still valid and clears the store as soon
//! as it is not: on construction, on every [`check`](SessionGuard::check)
//! and on every tick of a [`watch`](SessionGuard::watch) poller.
//!
//! Implicit-grant tokens cannot be refreshed, so expiry is terminal.

use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use crate::{
    error::{Error, Result},
    schedule::Poller,
    store::{KeyValueStore, ACCESS_TOKEN_KEY, TOKEN_EXPIRATION_KEY},
    tokens::AccessToken,
    util,
};

/// Source of bearer tokens for Web API requests.
pub trait TokenProvider: Send + Sync {
    /// Returns a token that has not expired.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unauthenticated`](crate::error::ErrorKind) when
    /// there is no live session.
    fn access_token(&self) -> Result<AccessToken>;

    /// Discards the current token because the server rejected it.
    fn expire(&self);
}

pub struct SessionGuard {
    store: Arc<dyn KeyValueStore>,
    authenticated: AtomicBool,
}

impl SessionGuard {
    /// Creates a guard and validates whatever session the store holds.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be accessed.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let guard = Self {
            store,
            authenticated: AtomicBool::new(false),
        };
        guard.check()?;
        Ok(guard)
    }

    /// Validates the stored session against the current time.
    ///
    /// Returns whether the session is valid. An invalid session is cleared.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be accessed.
    pub fn check(&self) -> Result<bool> {
        self.check_at(SystemTime::now())
    }

    /// Validates the stored session against `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be accessed.
    pub fn check_at(&self, now: SystemTime) -> Result<bool> {
        let valid = self
            .stored_token()?
            .is_some_and(|token| !token.is_expired_at(now));

        if !valid {
            self.clear()?;
        }

        let was = self.authenticated.swap(valid, Ordering::SeqCst);
        if was && !valid {
            info!("session expired");
        }

        Ok(valid)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Persists `token` as the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the expiry cannot be stored, or the store cannot be
    /// written.
    pub fn establish(&self, token: &AccessToken) -> Result<()> {
        let expires_at = util::millis_since_epoch(token.expires_at)?;
        self.store.set(ACCESS_TOKEN_KEY, token.as_str())?;
        self.store
            .set(TOKEN_EXPIRATION_KEY, &expires_at.to_string())?;
        self.authenticated.store(true, Ordering::SeqCst);

        info!(
            "session established, expires in {}",
            util::format_duration(util::whole_minutes(token.time_to_live()))
        );
        Ok(())
    }

    /// Ends the session regardless of its expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written.
    pub fn logout(&self) -> Result<()> {
        self.clear()?;
        if self.authenticated.swap(false, Ordering::SeqCst) {
            info!("logged out");
        }
        Ok(())
    }

    /// Runs [`check`](Self::check) every `interval` until the session ends.
    ///
    /// The poller stops by itself once the session is invalid; drop it to
    /// stop earlier.
    #[must_use]
    pub fn watch(self: Arc<Self>, interval: Duration) -> Poller {
        Poller::spawn("session guard", interval, move || {
            let guard = Arc::clone(&self);
            async move {
                match guard.check() {
                    Ok(true) => ControlFlow::Continue(()),
                    Ok(false) => ControlFlow::Break(()),
                    Err(e) => {
                        error!("session check failed: {e}");
                        ControlFlow::Continue(())
                    }
                }
            }
        })
    }

    fn stored_token(&self) -> Result<Option<AccessToken>> {
        let Some(token) = self.store.get(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(expiration) = self.store.get(TOKEN_EXPIRATION_KEY)? else {
            return Ok(None);
        };

        match expiration.trim().parse::<u64>() {
            Ok(millis) => Ok(Some(AccessToken::new(
                token,
                util::from_millis_since_epoch(millis),
            ))),
            Err(e) => {
                warn!("stored token expiration \"{expiration}\" invalid: {e}");
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(TOKEN_EXPIRATION_KEY)
    }
}

impl TokenProvider for SessionGuard {
    fn access_token(&self) -> Result<AccessToken> {
        match self.stored_token()? {
            Some(token) if !token.is_expired() => Ok(token),
            _ => {
                self.expire();
                Err(Error::unauthenticated("not logged in or session expired"))
            }
        }
    }

    fn expire(&self) {
        if let Err(e) = self.logout() {
            error!("failed to clear session: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, store::MemoryStore, tokens::MAX_TOKEN_LIFETIME};

    fn guard() -> (Arc<MemoryStore>, SessionGuard) {
        let store = Arc::new(MemoryStore::new());
        let guard = SessionGuard::new(store.clone()).unwrap();
        (store, guard)
    }

    #[test]
    fn empty_store_is_unauthenticated() {
        let (_, guard) = guard();
        assert!(!guard.is_authenticated());
        assert_eq!(
            guard.access_token().unwrap_err().kind,
            ErrorKind::Unauthenticated
        );
    }

    #[test]
    fn establish_persists_token_and_expiry() {
        let (store, guard) = guard();
        let expires_at = util::from_millis_since_epoch(4_102_444_800_000);
        guard
            .establish(&AccessToken::new("BQD", expires_at))
            .unwrap();

        assert!(guard.is_authenticated());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("BQD"));
        assert_eq!(
            store.get(TOKEN_EXPIRATION_KEY).unwrap().as_deref(),
            Some("4102444800000")
        );
        assert_eq!(guard.access_token().unwrap().as_str(), "BQD");
    }

    #[test]
    fn unstorable_expiry_leaves_no_session() {
        let (store, guard) = guard();
        let far = util::from_millis_since_epoch(u64::MAX) + Duration::from_secs(1);

        let err = guard.establish(&AccessToken::new("BQD", far)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(!guard.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn longest_lifetime_survives_a_check() {
        let (_, guard) = guard();
        let now = SystemTime::now();
        guard
            .establish(&AccessToken::expiring_in("BQD", now, MAX_TOKEN_LIFETIME).unwrap())
            .unwrap();

        assert!(guard.check_at(now).unwrap());
        assert!(guard.is_authenticated());
    }

    #[test]
    fn expiry_at_or_before_now_clears_the_session() {
        let (store, guard) = guard();
        let now = SystemTime::now();
        guard
            .establish(&AccessToken::expiring_in("BQD", now, Duration::from_secs(60)).unwrap())
            .unwrap();

        assert!(guard.check_at(now).unwrap());
        assert!(!guard.check_at(now + Duration::from_secs(60)).unwrap());
        assert!(!guard.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(store.get(TOKEN_EXPIRATION_KEY).unwrap().is_none());
    }

    #[test]
    fn existing_session_is_validated_on_construction() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "BQD").unwrap();
        store.set(TOKEN_EXPIRATION_KEY, "1000").unwrap();

        let guard = SessionGuard::new(store.clone()).unwrap();
        assert!(!guard.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn garbage_expiry_is_invalid() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "BQD").unwrap();
        store.set(TOKEN_EXPIRATION_KEY, "tomorrow").unwrap();

        let guard = SessionGuard::new(store.clone()).unwrap();
        assert!(!guard.is_authenticated());
        assert!(store.get(TOKEN_EXPIRATION_KEY).unwrap().is_none());
    }

    #[test]
    fn logout_is_unconditional() {
        let (store, guard) = guard();
        guard
            .establish(&AccessToken::expiring_in(
                "BQD",
                SystemTime::now(),
                Duration::from_secs(3600),
            )
            .unwrap())
            .unwrap();

        guard.logout().unwrap();
        assert!(!guard.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn watch_stops_once_the_session_expires() {
        let (store, guard) = guard();
        guard
            .establish(&AccessToken::expiring_in(
                "BQD",
                SystemTime::now(),
                Duration::from_millis(1500),
            )
            .unwrap())
            .unwrap();

        let guard = Arc::new(guard);
        let poller = Arc::clone(&guard).watch(Duration::from_millis(100));
        tokio::time::timeout(Duration::from_secs(10), poller.stopped())
            .await
            .unwrap()
            .unwrap();

        assert!(!guard.is_authenticated());
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }
}
