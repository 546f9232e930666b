use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::api::{execute_json, join_endpoint, ApiClient};
use crate::envelope;
use crate::error::{AppError, AppResult};
use crate::models::UserProfile;
use crate::session::{AccessToken, RefreshToken, TokenPair, TokenRefresher};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(serialize_with = "expose_password")]
    pub password: Zeroizing<String>,
    #[serde(rename = "full_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn expose_password<S: serde::Serializer>(
    password: &Zeroizing<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(password.as_str())
}

/// Calls the token refresh endpoint directly on the transport. It must not
/// go through the dispatcher, which would recurse on a 401.
pub struct HttpTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    base: Url,
    timeout_ms: u64,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, base: Url, timeout_ms: u64) -> Self {
        Self {
            transport,
            base,
            timeout_ms,
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AppError> {
        let url = join_endpoint(&self.base, &["auth", "token", "refresh"], &[])?;
        let request = HttpRequest::new(HttpMethod::Post, url)
            .with_timeout_ms(self.timeout_ms)?
            .with_json(&json!({ "refresh": refresh_token.expose() }))?;

        let payload = execute_json(self.transport.as_ref(), request).await?;
        let (access, refresh) = token_fields(&payload)
            .ok_or_else(|| AppError::decode("refresh response has no access token"))?;

        Ok(TokenPair {
            access,
            refresh: refresh.unwrap_or_else(|| refresh_token.clone()),
        })
    }
}

pub struct AuthRepository {
    api: Arc<ApiClient>,
}

impl AuthRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: Zeroizing<String>) -> AppResult<UserProfile> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::invalid_request("Username and password are required"));
        }
        #[derive(Serialize)]
        struct LoginBody<'a> {
            username: &'a str,
            password: &'a str,
        }

        let request = self
            .api
            .request(HttpMethod::Post, &["auth", "login"], &[])?
            .with_json(&LoginBody {
                username: username.trim(),
                password: password.as_str(),
            })?;
        let payload = self.api.send_public(request).await?;
        self.establish_session(payload).await
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserProfile> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::invalid_request("Username and password are required"));
        }
        let http = self
            .api
            .request(HttpMethod::Post, &["auth", "register"], &[])?
            .with_json(&request)?;
        let payload = self.api.send_public(http).await?;
        self.establish_session(payload).await
    }

    /// Tells the server to revoke the refresh token, then clears the session
    /// whether or not that call succeeded.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let session = self.api.session();
        if session.is_authenticated() {
            // Read per attempt: a refresh on the way may rotate the token.
            let outcome = self
                .api
                .send_authorized_with(|| {
                    let refresh = session
                        .credential()
                        .map(|c| c.refresh)
                        .ok_or_else(|| AppError::unauthorized("Not signed in"))?;
                    Ok(self
                        .api
                        .request(HttpMethod::Post, &["auth", "logout"], &[])?
                        .with_json(&json!({ "refresh": refresh.expose() }))?)
                })
                .await;
            if let Err(e) = outcome {
                warn!(error = %e, "server-side logout failed, clearing locally anyway");
            }
        }
        session.clear();
    }

    pub async fn current_user(&self) -> AppResult<UserProfile> {
        let user: UserProfile = self.api.get_item(&["auth", "me"], Some("user")).await?;
        self.api.session().update_user(user.clone());
        Ok(user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    async fn establish_session(&self, payload: Value) -> AppResult<UserProfile> {
        let (access, refresh) = token_fields(&payload)
            .ok_or_else(|| AppError::decode("authentication response has no access token"))?;
        let refresh =
            refresh.ok_or_else(|| AppError::decode("authentication response has no refresh token"))?;

        let user = match payload.get("user").cloned() {
            Some(user) if !user.is_null() => envelope::decode_item::<UserProfile>(user, None)?,
            _ => self.fetch_me(&access).await?,
        };

        self.api
            .session()
            .set_credential(access, refresh, user.clone());
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn fetch_me(&self, access: &AccessToken) -> AppResult<UserProfile> {
        let request = self
            .api
            .request(HttpMethod::Get, &["auth", "me"], &[])?
            .with_bearer(access.expose())?;
        let payload = self.api.send_public(request).await?;
        envelope::decode_item(payload, Some("user"))
    }
}

/// Finds the token pair at the top level or under `tokens`/`data`, accepting
/// both `access`/`refresh` and `access_token`/`refresh_token`.
fn token_fields(payload: &Value) -> Option<(AccessToken, Option<RefreshToken>)> {
    let candidates = [
        Some(payload),
        payload.get("tokens"),
        payload.get("data"),
    ];
    candidates.into_iter().flatten().find_map(|value| {
        let text = |keys: [&str; 2]| {
            keys.iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
        };
        let access = text(["access", "access_token"])?;
        let refresh = text(["refresh", "refresh_token"]);
        Some((AccessToken::new(access), refresh.map(RefreshToken::new)))
    })
}
