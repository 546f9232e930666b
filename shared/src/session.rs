//! Credential store: the single source of truth for whether the user is
//! signed in and which bearer token to attach.
//!
//! State sits behind a `std::sync::RwLock` that is never held across an
//! `.await`. Token refresh is serialised by a separate async gate; the
//! generation counter tells a waiter whether someone else already refreshed.
//! The epoch only moves on sign-in and sign-out, so a request begun in one
//! session is never replayed with another session's token.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::models::{UserId, UserProfile};

macro_rules! secret_token {
    ($name:ident) => {
        #[derive(Clone)]
        pub struct $name(Arc<SecretString>);

        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(Arc::new(SecretString::new(token.into())))
            }

            pub fn expose(&self) -> &str {
                self.0.expose_secret()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "([REDACTED])"))
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.expose() == other.expose()
            }
        }

        impl Eq for $name {}
    };
}

secret_token!(AccessToken);
secret_token!(RefreshToken);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access: AccessToken,
    pub refresh: RefreshToken,
    pub user: UserProfile,
}

/// The access token together with the epoch and generation it was read at.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub token: Option<AccessToken>,
    pub epoch: u64,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    SignedIn { user_id: UserId },
    /// The refresh token was rejected; the user must sign in again.
    Expired,
}

/// Exchanges a refresh token for a new pair.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AppError>;
}

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    epoch: u64,
    generation: u64,
}

pub struct SessionStore {
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            state: RwLock::new(SessionState::default()),
            refresh_gate: Mutex::new(()),
            status,
        }
    }

    /// Replaces tokens and user in one step and notifies observers.
    pub fn set_credential(&self, access: AccessToken, refresh: RefreshToken, user: UserProfile) {
        let user_id = user.id.clone();
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.credential = Some(Credential {
                access,
                refresh,
                user,
            });
            state.epoch += 1;
            state.generation += 1;
        }
        info!(user_id = %user_id, "session credential set");
        self.status.send_replace(SessionStatus::SignedIn { user_id });
    }

    pub fn credential(&self) -> Option<Credential> {
        self.read(|state| state.credential.clone())
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.read(|state| state.credential.as_ref().map(|c| c.access.clone()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(|state| SessionSnapshot {
            token: state.credential.as_ref().map(|c| c.access.clone()),
            epoch: state.epoch,
            generation: state.generation,
        })
    }

    pub fn generation(&self) -> u64 {
        self.read(|state| state.generation)
    }

    pub fn epoch(&self) -> u64 {
        self.read(|state| state.epoch)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.read(|state| state.credential.as_ref().map(|c| c.user.clone()))
    }

    /// Replaces the cached profile without touching the tokens. Ignored when
    /// signed out.
    pub fn update_user(&self, user: UserProfile) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.credential.as_mut() {
            Some(credential) => {
                credential.user = user;
                true
            }
            None => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|state| state.credential.is_some())
    }

    pub fn clear(&self) {
        self.clear_with(SessionStatus::SignedOut);
        info!("session cleared");
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Exchanges the refresh token for a new pair, at most once per
    /// generation.
    ///
    /// `observed` is the snapshot the caller's failed request was sent with.
    /// If another caller refreshed in the meantime, the newer token is
    /// returned without a network call. If the user signed out or a different
    /// login replaced the session, nothing is reused and the call fails.
    ///
    /// A failed exchange clears the credential and reports
    /// [`SessionStatus::Expired`].
    #[instrument(skip(self, refresher, observed), fields(epoch = observed.epoch))]
    pub async fn refresh(
        &self,
        refresher: &dyn TokenRefresher,
        observed: &SessionSnapshot,
    ) -> Result<AccessToken, AppError> {
        let _gate = self.refresh_gate.lock().await;

        let (epoch, generation, refresh_token) = self.read(|state| {
            (
                state.epoch,
                state.generation,
                state.credential.as_ref().map(|c| c.refresh.clone()),
            )
        });

        if epoch != observed.epoch {
            debug!(epoch, "session replaced while waiting, not retrying");
            return Err(AppError::unauthorized("Session has ended"));
        }
        if generation != observed.generation {
            debug!(generation, "token refreshed while waiting, reusing it");
            return self
                .access_token()
                .ok_or_else(|| AppError::unauthorized("Session has ended"));
        }

        let refresh_token =
            refresh_token.ok_or_else(|| AppError::unauthorized("Not signed in"))?;

        match refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                if state.epoch != observed.epoch {
                    // The new pair belongs to a session that no longer exists.
                    return Err(AppError::unauthorized("Session has ended"));
                }
                let Some(credential) = state.credential.as_mut() else {
                    return Err(AppError::unauthorized("Not signed in"));
                };
                credential.access = pair.access.clone();
                credential.refresh = pair.refresh;
                state.generation += 1;
                info!(generation = state.generation, "access token refreshed");
                Ok(pair.access)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                self.clear_if_epoch(observed.epoch, SessionStatus::Expired);
                Err(e)
            }
        }
    }

    fn clear_if_epoch(&self, observed: u64, status: SessionStatus) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.epoch != observed {
                return;
            }
            state.credential = None;
            state.epoch += 1;
            state.generation += 1;
        }
        self.status.send_replace(status);
    }

    fn clear_with(&self, status: SessionStatus) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.credential = None;
            state.epoch += 1;
            state.generation += 1;
        }
        self.status.send_replace(status);
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (signed_in, epoch, generation) =
            self.read(|state| (state.credential.is_some(), state.epoch, state.generation));
        f.debug_struct("SessionStore")
            .field("signed_in", &signed_in)
            .field("epoch", &epoch)
            .field("generation", &generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(id),
            username: format!("user-{id}"),
            display_name: None,
            email: None,
            avatar_url: None,
            bio: None,
        }
    }

    struct StaticRefresher {
        calls: AtomicUsize,
        outcome: Result<&'static str, u16>,
    }

    #[async_trait::async_trait]
    impl TokenRefresher for StaticRefresher {
        async fn refresh(&self, _refresh_token: &RefreshToken) -> Result<TokenPair, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(access) => Ok(TokenPair {
                    access: AccessToken::new(access),
                    refresh: RefreshToken::new("r2"),
                }),
                Err(status) => Err(AppError::from_http_status(status, b"")),
            }
        }
    }

    #[test]
    fn test_set_credential_round_trip() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));

        let credential = store.credential().unwrap();
        assert_eq!(credential.access.expose(), "a");
        assert_eq!(credential.refresh.expose(), "r");
        assert_eq!(credential.user, user("1"));
        assert_eq!(
            store.status(),
            SessionStatus::SignedIn {
                user_id: UserId::new("1")
            }
        );
    }

    #[test]
    fn test_debug_never_prints_tokens() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("sekrit-a"), RefreshToken::new("sekrit-r"), user("1"));
        let rendered = format!("{:?} {:?}", store.credential(), store);
        assert!(!rendered.contains("sekrit"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_clear_notifies_and_bumps_generation() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));
        let before = store.generation();
        let rx = store.subscribe();

        store.clear();

        assert!(store.access_token().is_none());
        assert!(store.current_user().is_none());
        assert!(store.generation() > before);
        assert_eq!(*rx.borrow(), SessionStatus::SignedOut);
    }

    #[test]
    fn test_update_user_keeps_tokens() {
        let store = SessionStore::new();
        assert!(!store.update_user(user("1")));
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));
        let mut renamed = user("1");
        renamed.display_name = Some("Renamed".into());
        assert!(store.update_user(renamed.clone()));
        assert_eq!(store.current_user(), Some(renamed));
        assert_eq!(store.access_token().unwrap().expose(), "a");
    }

    #[tokio::test]
    async fn test_refresh_success_swaps_tokens() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));
        let refresher = StaticRefresher {
            calls: AtomicUsize::new(0),
            outcome: Ok("a2"),
        };

        let observed = store.snapshot();
        let token = store.refresh(&refresher, &observed).await.unwrap();
        assert_eq!(token.expose(), "a2");

        let credential = store.credential().unwrap();
        assert_eq!(credential.access.expose(), "a2");
        assert_eq!(credential.refresh.expose(), "r2");
        assert_eq!(credential.user, user("1"));
    }

    #[tokio::test]
    async fn test_refresh_with_stale_generation_skips_exchange() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));
        let stale = store.snapshot();
        let refresher = StaticRefresher {
            calls: AtomicUsize::new(0),
            outcome: Ok("a2"),
        };

        store.refresh(&refresher, &stale).await.unwrap();
        let token = store.refresh(&refresher, &stale).await.unwrap();
        assert_eq!(token.expose(), "a2");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_new_login_does_not_hand_out_new_token() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("alice"), RefreshToken::new("r"), user("1"));
        let stale = store.snapshot();
        store.clear();
        store.set_credential(AccessToken::new("bob"), RefreshToken::new("rb"), user("2"));
        let refresher = StaticRefresher {
            calls: AtomicUsize::new(0),
            outcome: Ok("unused"),
        };

        let err = store.refresh(&refresher, &stale).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.access_token().unwrap().expose(), "bob");
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_and_expires() {
        let store = SessionStore::new();
        store.set_credential(AccessToken::new("a"), RefreshToken::new("r"), user("1"));
        let refresher = StaticRefresher {
            calls: AtomicUsize::new(0),
            outcome: Err(401),
        };

        let result = store.refresh(&refresher, &store.snapshot()).await;
        assert!(result.is_err());
        assert!(!store.is_authenticated());
        assert_eq!(store.status(), SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_refresh_when_signed_out() {
        let store = SessionStore::new();
        let refresher = StaticRefresher {
            calls: AtomicUsize::new(0),
            outcome: Ok("a"),
        };
        let err = store.refresh(&refresher, &store.snapshot()).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
