use serde::{Deserialize, Serialize};

use super::ids::FriendRequestId;
use super::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: FriendRequestId,
    #[serde(alias = "sender", alias = "requester")]
    pub from_user: UserProfile,
    #[serde(default, alias = "receiver", alias = "recipient")]
    pub to_user: Option<UserProfile>,
    #[serde(default = "pending")]
    pub status: FriendRequestStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn pending() -> FriendRequestStatus {
    FriendRequestStatus::Pending
}
