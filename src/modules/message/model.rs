use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::message::schema::{
    AttachmentEntity, MessageType, ReactionEmoji, ReactionEntity, ReadReceiptEntity,
};

#[derive(Debug, Clone)]
pub struct InsertMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    pub _type: MessageType,
    pub content: String,
}

/// Window selector handed to the repository after cursor parsing. At most
/// one of `before`/`after` is set.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub conversation_id: Uuid,
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub after: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AttachmentInput {
    #[validate(length(min = 1, max = 255, message = "File name must be between 1 and 255 characters"))]
    pub file_name: String,
    #[validate(length(min = 1, max = 128, message = "Mime type must be between 1 and 128 characters"))]
    pub mime_type: String,
    #[validate(range(min = 1, message = "Attachment size must be at least 1 byte"))]
    pub size_bytes: i64,
    #[validate(length(min = 1, message = "Attachment URL cannot be empty"))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageBody {
    #[validate(length(min = 1, max = 2000, message = "Content must be between 1 and 2000 characters"))]
    pub content: String,
    pub message_type: Option<MessageType>,
    pub reply_to: Option<Uuid>,
    #[validate(length(max = 10, message = "A message can carry at most 10 attachments"), nested)]
    pub attachments: Option<Vec<AttachmentInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageBody {
    #[validate(length(min = 1, max = 2000, message = "Content must be between 1 and 2000 characters"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReactionBody {
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageHistoryQuery {
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl MessageHistoryQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageSearchQuery {
    #[validate(length(min = 1, max = 200, message = "Search term must be between 1 and 200 characters"))]
    pub q: String,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl MessageSearchQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AttachmentEntity> for AttachmentView {
    fn from(entity: AttachmentEntity) -> Self {
        AttachmentView {
            id: entity.id,
            file_name: entity.file_name,
            mime_type: entity.mime_type,
            size_bytes: entity.size_bytes,
            url: entity.url,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionView {
    pub user_id: Uuid,
    pub emoji: ReactionEmoji,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ReactionEntity> for ReactionView {
    fn from(entity: ReactionEntity) -> Self {
        ReactionView { user_id: entity.user_id, emoji: entity.emoji, created_at: entity.created_at }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadReceiptView {
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}

impl From<ReadReceiptEntity> for ReadReceiptView {
    fn from(entity: ReadReceiptEntity) -> Self {
        ReadReceiptView { user_id: entity.user_id, read_at: entity.read_at }
    }
}

/// What a reply points at. Deleted targets keep the link but drop the
/// content, so clients can render a tombstone.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplyTarget {
    Message {
        id: Uuid,
        sender_id: Uuid,
        content: String,
        message_type: MessageType,
        created_at: chrono::DateTime<chrono::Utc>,
    },
    Deleted { id: Uuid },
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: MessageType,
    pub content: String,
    pub reply_to: Option<ReplyTarget>,
    pub attachments: Vec<AttachmentView>,
    pub reactions: Vec<ReactionView>,
    pub read_by: Vec<ReadReceiptView>,
    pub is_edited: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageHistoryResponse {
    pub messages: Vec<MessageResponse>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_body(content: &str) -> SendMessageBody {
        SendMessageBody {
            content: content.to_string(),
            message_type: None,
            reply_to: None,
            attachments: None,
        }
    }

    #[test]
    fn test_send_body_content_bounds() {
        assert!(send_body("").validate().is_err());
        assert!(send_body("hi").validate().is_ok());
        assert!(send_body(&"x".repeat(2000)).validate().is_ok());
        assert!(send_body(&"x".repeat(2001)).validate().is_err());
    }

    #[test]
    fn test_send_body_attachment_validation() {
        let mut body = send_body("with attachment");
        body.attachments = Some(vec![AttachmentInput {
            file_name: "notes.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            url: "https://files.example.com/notes.pdf".to_string(),
        }]);
        assert!(body.validate().is_ok());

        body.attachments.as_mut().unwrap()[0].size_bytes = 0;
        assert!(body.validate().is_err());

        let attachment = AttachmentInput {
            file_name: "a.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size_bytes: 1,
            url: "https://files.example.com/a.bin".to_string(),
        };
        body.attachments = Some(vec![attachment; 11]);
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_history_query_bounds() {
        let query = MessageHistoryQuery { limit: None, before: None, after: None };
        assert!(query.validate().is_ok());
        assert_eq!(query.limit(), 50);

        let query = MessageHistoryQuery { limit: Some(0), before: None, after: None };
        assert!(query.validate().is_err());

        let query = MessageHistoryQuery { limit: Some(101), before: None, after: None };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_search_query_bounds_and_offset() {
        let query = MessageSearchQuery { q: "".to_string(), page: None, limit: None };
        assert!(query.validate().is_err());

        let query = MessageSearchQuery { q: "sql".to_string(), page: Some(2), limit: Some(25) };
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), 25);
    }

    #[test]
    fn test_reply_target_serialization() {
        let deleted = ReplyTarget::Deleted { id: Uuid::now_v7() };
        let json = serde_json::to_value(&deleted).unwrap();
        assert_eq!(json["status"], "deleted");
        assert!(json.get("content").is_none());

        let target = ReplyTarget::Message {
            id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            content: "original".to_string(),
            message_type: MessageType::Text,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["status"], "message");
        assert_eq!(json["content"], "original");
    }

    #[test]
    fn test_send_body_deserializes_snake_case() {
        let body: SendMessageBody = serde_json::from_str(
            r#"{"content":"hey","message_type":"text","reply_to":null}"#,
        )
        .unwrap();
        assert_eq!(body.content, "hey");
        assert_eq!(body.message_type, Some(MessageType::Text));
        assert!(body.reply_to.is_none());
    }
}
