use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::cache::DetailCache;
use crate::error::AppResult;
use crate::models::{Attachment, CreateGroupRequest, Group, GroupId, UpdateGroupRequest, UserProfile};
use crate::transport::{HttpMethod, MultipartForm};

pub struct GroupRepository {
    api: Arc<ApiClient>,
    details: Arc<DetailCache<GroupId, Group>>,
}

impl GroupRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let capacity = api.config().detail_cache_capacity;
        Self {
            api,
            details: Arc::new(DetailCache::new("groups", capacity)),
        }
    }

    pub fn cache(&self) -> &Arc<DetailCache<GroupId, Group>> {
        &self.details
    }

    pub async fn list_groups(&self) -> AppResult<Vec<Group>> {
        self.api.get_list(&["groups"], &[], "groups").await
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn get_group_detail(&self, id: &GroupId, force_refresh: bool) -> AppResult<Group> {
        self.details
            .get_or_fetch(id.clone(), force_refresh, move || async move {
                self.api
                    .get_item(&["groups", id.as_str()], Some("group"))
                    .await
            })
            .await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_group(&self, request: &CreateGroupRequest) -> AppResult<Group> {
        let group: Group = self
            .api
            .send_json(HttpMethod::Post, &["groups"], request, Some("group"))
            .await?;
        info!(group_id = %group.id, "group created");
        Ok(group)
    }

    #[instrument(skip(self, request), fields(group_id = %id))]
    pub async fn update_group(&self, id: &GroupId, request: &UpdateGroupRequest) -> AppResult<Group> {
        let result = self
            .api
            .send_json(HttpMethod::Patch, &["groups", id.as_str()], request, Some("group"))
            .await;
        self.details.invalidate(id);
        result
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn delete_group(&self, id: &GroupId) -> AppResult<()> {
        let result = self
            .api
            .send_unit(HttpMethod::Delete, &["groups", id.as_str()], None)
            .await;
        self.details.invalidate(id);
        result
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn join_group(&self, id: &GroupId) -> AppResult<()> {
        let result = self
            .api
            .send_unit(HttpMethod::Post, &["groups", id.as_str(), "join"], None)
            .await;
        self.details.invalidate(id);
        result
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub async fn leave_group(&self, id: &GroupId) -> AppResult<()> {
        let result = self
            .api
            .send_unit(HttpMethod::Post, &["groups", id.as_str(), "leave"], None)
            .await;
        self.details.invalidate(id);
        result
    }

    pub async fn list_members(&self, id: &GroupId) -> AppResult<Vec<UserProfile>> {
        self.api
            .get_list(&["groups", id.as_str(), "members"], &[], "members")
            .await
    }

    #[instrument(skip(self, image), fields(group_id = %id, size = image.len()))]
    pub async fn upload_cover(&self, id: &GroupId, image: Attachment) -> AppResult<Group> {
        let form = MultipartForm::new().file(image.into_part("cover_image"));
        let result = self
            .api
            .upload(HttpMethod::Post, &["groups", id.as_str(), "cover"], form, Some("group"))
            .await;
        self.details.invalidate(id);
        result
    }
}
