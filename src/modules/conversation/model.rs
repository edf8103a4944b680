use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    conversation::schema::{ConversationEntity, ParticipantEntity, ParticipantRole},
    message::schema::MessageType,
};

pub struct NewConversation {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
}

pub struct NewParticipant {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
}

/// A conversation joined with the caller's own participant row, if any.
/// `participant: None` means the caller can see that the row exists but is
/// not a member of it.
pub struct ConversationAccess {
    pub conversation: ConversationEntity,
    pub participant: Option<ParticipantEntity>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UnreadRecipient {
    pub user_id: Uuid,
    pub unread_count: i32,
}

/// Flat projection produced by the conversation list query. One row per
/// conversation the user participates in, with the counterpart and the
/// newest live message already joined in.
#[derive(Debug, FromRow)]
pub struct ConversationListRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub title: String,
    pub is_active: bool,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,

    pub my_role: ParticipantRole,
    pub unread_count: i32,
    pub is_pinned: bool,
    pub last_seen_at: Option<chrono::DateTime<chrono::Utc>>,

    pub counterpart_id: Uuid,
    pub counterpart_role: ParticipantRole,
    pub counterpart_name: String,
    pub counterpart_avatar_url: Option<String>,

    pub last_message_id: Option<Uuid>,
    pub last_sender_id: Option<Uuid>,
    pub last_content: Option<String>,
    pub last_type: Option<MessageType>,
    pub last_created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterpartInfo {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastMessagePreview {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub title: String,
    pub is_active: bool,
    pub my_role: ParticipantRole,
    pub counterpart: CounterpartInfo,
    pub unread_count: i32,
    pub is_pinned: bool,
    pub last_seen_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_message: Option<LastMessagePreview>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ConversationListRow> for ConversationResponse {
    fn from(row: ConversationListRow) -> Self {
        let last_message = match (
            row.last_message_id,
            row.last_sender_id,
            row.last_content,
            row.last_type,
            row.last_created_at,
        ) {
            (Some(id), Some(sender_id), Some(content), Some(message_type), Some(created_at)) => {
                Some(LastMessagePreview { id, sender_id, content, message_type, created_at })
            }
            _ => None,
        };

        ConversationResponse {
            id: row.id,
            course_id: row.course_id,
            course_title: row.course_title,
            title: row.title,
            is_active: row.is_active,
            my_role: row.my_role,
            counterpart: CounterpartInfo {
                user_id: row.counterpart_id,
                role: row.counterpart_role,
                display_name: row.counterpart_name,
                avatar_url: row.counterpart_avatar_url,
            },
            unread_count: row.unread_count,
            is_pinned: row.is_pinned,
            last_seen_at: row.last_seen_at,
            last_message,
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct ConversationQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "Search term must be between 1 and 200 characters"))]
    pub q: Option<String>,
    pub course_id: Option<Uuid>,
}

impl ConversationQuery {
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

#[derive(Serialize)]
pub struct ReadResponse {
    pub unread_count: i32,
}

#[derive(Serialize)]
pub struct PinResponse {
    pub is_pinned: bool,
}
