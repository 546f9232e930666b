use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, MessageId, UserId};
use super::user::UserProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, alias = "members")]
    pub participants: Vec<UserProfile>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default, alias = "conversation_id")]
    pub conversation: Option<ConversationId>,
    #[serde(alias = "sender_id")]
    pub sender: UserId,
    #[serde(default, alias = "content", alias = "body")]
    pub text: String,
    #[serde(default, alias = "attachment")]
    pub attachment_url: Option<String>,
    #[serde(default, alias = "timestamp")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CreateGroupConversation<'a> {
    pub title: &'a str,
    pub participants: &'a [UserId],
}
