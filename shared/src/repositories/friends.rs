use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::error::AppResult;
use crate::models::{FriendRequest, FriendRequestId, UserId, UserProfile};
use crate::transport::HttpMethod;

pub struct FriendRepository {
    api: Arc<ApiClient>,
}

impl FriendRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list_friends(&self) -> AppResult<Vec<UserProfile>> {
        self.api.get_list(&["friends"], &[], "friends").await
    }

    pub async fn list_requests(&self) -> AppResult<Vec<FriendRequest>> {
        self.api
            .get_list(&["friends", "requests"], &[], "requests")
            .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn send_request(&self, user_id: &UserId) -> AppResult<FriendRequest> {
        let request: FriendRequest = self
            .api
            .send_json(
                HttpMethod::Post,
                &["friends", "requests"],
                &json!({ "to_user": user_id }),
                Some("request"),
            )
            .await?;
        info!(request_id = %request.id, "friend request sent");
        Ok(request)
    }

    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn accept_request(&self, id: &FriendRequestId) -> AppResult<()> {
        self.api
            .send_unit(
                HttpMethod::Post,
                &["friends", "requests", id.as_str(), "accept"],
                None,
            )
            .await
    }

    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reject_request(&self, id: &FriendRequestId) -> AppResult<()> {
        self.api
            .send_unit(
                HttpMethod::Post,
                &["friends", "requests", id.as_str(), "reject"],
                None,
            )
            .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_friend(&self, user_id: &UserId) -> AppResult<()> {
        self.api
            .send_unit(HttpMethod::Delete, &["friends", user_id.as_str()], None)
            .await
    }
}
