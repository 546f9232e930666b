use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::api::ApiClient;
use crate::cache::ClearCache;
use crate::config::ClientConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::AppResult;
use crate::repositories::{
    AuthRepository, ConversationRepository, FriendRepository, GroupRepository, HttpTokenRefresher,
    LocationRepository, PlanRepository, UserRepository,
};
use crate::session::{SessionStatus, SessionStore};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Entry point for the native shell: owns the session, the transport and one
/// instance of every repository.
pub struct TravelClient {
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    auth: AuthRepository,
    users: UserRepository,
    groups: GroupRepository,
    plans: PlanRepository,
    friends: FriendRepository,
    conversations: ConversationRepository,
    locations: LocationRepository,
}

impl TravelClient {
    pub fn new(config: ClientConfig) -> AppResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> AppResult<Self> {
        config.validate()?;
        let session = Arc::new(SessionStore::new());
        let refresher = Arc::new(HttpTokenRefresher::new(
            transport.clone(),
            config.base_url()?,
            config.request_timeout_ms,
        ));
        let dispatcher = RequestDispatcher::new(session.clone(), refresher);
        let api = Arc::new(ApiClient::new(transport, dispatcher, config)?);

        info!(base_url = %api.config().base_url, "client initialised");
        Ok(Self {
            session,
            auth: AuthRepository::new(api.clone()),
            users: UserRepository::new(api.clone()),
            groups: GroupRepository::new(api.clone()),
            plans: PlanRepository::new(api.clone()),
            friends: FriendRepository::new(api.clone()),
            conversations: ConversationRepository::new(api.clone()),
            locations: LocationRepository::new(api.clone()),
            api,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn auth(&self) -> &AuthRepository {
        &self.auth
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn groups(&self) -> &GroupRepository {
        &self.groups
    }

    pub fn plans(&self) -> &PlanRepository {
        &self.plans
    }

    pub fn friends(&self) -> &FriendRepository {
        &self.friends
    }

    pub fn conversations(&self) -> &ConversationRepository {
        &self.conversations
    }

    pub fn locations(&self) -> &LocationRepository {
        &self.locations
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.session.subscribe()
    }

    /// Signs out and drops every cached detail so the next user starts clean.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.clear_caches();
    }

    pub fn clear_caches(&self) {
        let caches: [&dyn ClearCache; 3] = [
            &**self.users.cache(),
            &**self.groups.cache(),
            &**self.plans.cache(),
        ];
        for cache in caches {
            cache.clear_all();
        }
    }
}
