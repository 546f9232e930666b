use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use crate::api::ApiClient;
use crate::envelope::Page;
use crate::error::{AppError, AppResult};
use crate::models::{
    Attachment, Conversation, ConversationId, CreateGroupConversation, Message, UserId,
};
use crate::transport::{HttpMethod, MultipartForm};

pub struct ConversationRepository {
    api: Arc<ApiClient>,
}

impl ConversationRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list_conversations(&self) -> AppResult<Vec<Conversation>> {
        self.api
            .get_list(&["conversations"], &[], "conversations")
            .await
    }

    /// Returns the existing one-to-one conversation with `user_id`, or the
    /// one the server creates.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn open_direct(&self, user_id: &UserId) -> AppResult<Conversation> {
        self.api
            .send_json(
                HttpMethod::Post,
                &["conversations", "direct"],
                &json!({ "user_id": user_id }),
                Some("conversation"),
            )
            .await
    }

    #[instrument(skip(self, participants), fields(count = participants.len()))]
    pub async fn create_group_conversation(
        &self,
        title: &str,
        participants: &[UserId],
    ) -> AppResult<Conversation> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_request("Conversation title is required"));
        }
        if participants.is_empty() {
            return Err(AppError::invalid_request(
                "A group conversation needs at least one participant",
            ));
        }
        self.api
            .send_json(
                HttpMethod::Post,
                &["conversations"],
                &CreateGroupConversation {
                    title,
                    participants,
                },
                Some("conversation"),
            )
            .await
    }

    /// `page` is 1-based, matching the server's paginator.
    pub async fn list_messages(
        &self,
        conversation_id: &ConversationId,
        page: u32,
    ) -> AppResult<Page<Message>> {
        self.api
            .get_page(
                &["conversations", conversation_id.as_str(), "messages"],
                &[("page", page.max(1).to_string())],
                "messages",
            )
            .await
    }

    #[instrument(skip(self, text), fields(conversation_id = %conversation_id))]
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> AppResult<Message> {
        if text.trim().is_empty() {
            return Err(AppError::invalid_request("Message cannot be empty"));
        }
        self.api
            .send_json(
                HttpMethod::Post,
                &["conversations", conversation_id.as_str(), "messages"],
                &json!({ "text": text }),
                Some("message"),
            )
            .await
    }

    #[instrument(
        skip(self, attachment, caption),
        fields(conversation_id = %conversation_id, size = attachment.len())
    )]
    pub async fn send_attachment(
        &self,
        conversation_id: &ConversationId,
        attachment: Attachment,
        caption: Option<&str>,
    ) -> AppResult<Message> {
        let mut form = MultipartForm::new();
        if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
            form = form.text("text", caption);
        }
        let form = form.file(attachment.into_part("attachment"));
        self.api
            .upload(
                HttpMethod::Post,
                &["conversations", conversation_id.as_str(), "messages"],
                form,
                Some("message"),
            )
            .await
    }

    pub async fn mark_read(&self, conversation_id: &ConversationId) -> AppResult<()> {
        self.api
            .send_unit(
                HttpMethod::Post,
                &["conversations", conversation_id.as_str(), "read"],
                None,
            )
            .await
    }
}
