//! Value objects handed to the shell. Decoding is lenient about field
//! aliases and id representation, strict about required fields.

mod attachment;
mod conversation;
mod friend;
mod group;
mod ids;
mod location;
mod plan;
mod user;

pub use attachment::{Attachment, MAX_ATTACHMENT_BYTES};
pub(crate) use conversation::CreateGroupConversation;
pub use conversation::{Conversation, Message};
pub use friend::{FriendRequest, FriendRequestStatus};
pub use group::{CreateGroupRequest, Group, UpdateGroupRequest};
pub use ids::{
    ActivityId, ConversationId, FriendRequestId, GroupId, LocationId, MessageId, PlanId, UserId,
};
pub use location::{LatLon, Location};
pub use plan::{
    Activity, CreateActivityRequest, CreatePlanRequest, Plan, UpdateActivityRequest,
    UpdatePlanRequest,
};
pub use user::{UpdateProfileRequest, UserProfile};
