use std::sync::Arc;

use tracing::{instrument, warn};

use crate::api::ApiClient;
use crate::cache::DetailCache;
use crate::error::AppResult;
use crate::models::{Attachment, UpdateProfileRequest, UserId, UserProfile};
use crate::transport::{HttpMethod, MultipartForm};

pub struct UserRepository {
    api: Arc<ApiClient>,
    details: Arc<DetailCache<UserId, UserProfile>>,
}

impl UserRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let capacity = api.config().detail_cache_capacity;
        Self {
            api,
            details: Arc::new(DetailCache::new("users", capacity)),
        }
    }

    pub fn cache(&self) -> &Arc<DetailCache<UserId, UserProfile>> {
        &self.details
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &UserId, force_refresh: bool) -> AppResult<UserProfile> {
        self.details
            .get_or_fetch(id.clone(), force_refresh, move || async move {
                self.api.get_item(&["users", id.as_str()], Some("user")).await
            })
            .await
    }

    pub async fn search_users(&self, query: &str) -> AppResult<Vec<UserProfile>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.api
            .get_list(&["users", "search"], &[("q", query.to_string())], "users")
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> AppResult<UserProfile> {
        let result: AppResult<UserProfile> = self
            .api
            .send_json(HttpMethod::Patch, &["auth", "me"], request, Some("user"))
            .await;
        self.after_profile_write(result)
    }

    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn upload_avatar(&self, image: Attachment) -> AppResult<UserProfile> {
        let form = MultipartForm::new().file(image.into_part("avatar"));
        let result: AppResult<UserProfile> = self
            .api
            .upload(HttpMethod::Patch, &["auth", "me", "avatar"], form, Some("user"))
            .await;
        self.after_profile_write(result)
    }

    fn after_profile_write(&self, result: AppResult<UserProfile>) -> AppResult<UserProfile> {
        let session = self.api.session();
        if let Some(me) = session.current_user() {
            self.details.invalidate(&me.id);
        }
        let user = result?;
        if !session.update_user(user.clone()) {
            warn!(user_id = %user.id, "profile saved but the session ended, not caching it");
        }
        Ok(user)
    }
}
