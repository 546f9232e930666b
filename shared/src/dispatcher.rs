use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::AppResult;
use crate::session::{AccessToken, SessionStore, TokenRefresher};

/// Runs authorised calls and recovers from an expired access token with one
/// silent refresh.
#[derive(Clone)]
pub struct RequestDispatcher {
    session: Arc<SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl RequestDispatcher {
    pub fn new(session: Arc<SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { session, refresher }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Calls `request_fn` with the current access token.
    ///
    /// Only an `Unauthorized` outcome triggers a refresh. After a successful
    /// refresh the call is retried once and that second outcome is returned
    /// whatever it is. If the refresh fails, the original 401 is returned and
    /// the session is left cleared.
    pub async fn request_with_auto_refresh<T, F, Fut>(&self, request_fn: F) -> AppResult<T>
    where
        F: Fn(Option<AccessToken>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let snapshot = self.session.snapshot();
        let first = request_fn(snapshot.token.clone()).await;

        let original = match first {
            Err(e) if e.is_unauthorized() => e,
            other => return other,
        };

        debug!(
            epoch = snapshot.epoch,
            generation = snapshot.generation,
            "request unauthorized, refreshing token"
        );
        match self
            .session
            .refresh(self.refresher.as_ref(), &snapshot)
            .await
        {
            Ok(token) => request_fn(Some(token)).await,
            Err(refresh_error) => {
                warn!(error = %refresh_error, "refresh failed, surfacing original 401");
                Err(original)
            }
        }
    }
}
