use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    System,
}

/// The reaction palette is a closed set. Clients send the glyph itself and
/// anything outside the palette fails deserialization.
#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "reaction_emoji", rename_all = "snake_case")]
pub enum ReactionEmoji {
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "❤️")]
    Heart,
    #[serde(rename = "😂")]
    Laugh,
    #[serde(rename = "😮")]
    Surprised,
    #[serde(rename = "😢")]
    Sad,
    #[serde(rename = "😡")]
    Angry,
    #[serde(rename = "🎉")]
    Party,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageEntity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    pub _type: MessageType,
    pub content: String,
    pub is_edited: bool,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl MessageEntity {
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[inline]
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AttachmentEntity {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReadReceiptEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReactionEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: ReactionEmoji,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_serde_lowercase() {
        assert_eq!(serde_json::to_string(&MessageType::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&MessageType::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::from_str::<MessageType>("\"image\"").unwrap(), MessageType::Image);
        assert!(serde_json::from_str::<MessageType>("\"video\"").is_err());
    }

    #[test]
    fn test_reaction_emoji_glyph_roundtrip() {
        let cases = [
            (ReactionEmoji::ThumbsUp, "\"👍\""),
            (ReactionEmoji::Heart, "\"❤️\""),
            (ReactionEmoji::Laugh, "\"😂\""),
            (ReactionEmoji::Surprised, "\"😮\""),
            (ReactionEmoji::Sad, "\"😢\""),
            (ReactionEmoji::Angry, "\"😡\""),
            (ReactionEmoji::Party, "\"🎉\""),
        ];

        for (emoji, json) in cases {
            assert_eq!(serde_json::to_string(&emoji).unwrap(), json);
            assert_eq!(serde_json::from_str::<ReactionEmoji>(json).unwrap(), emoji);
        }
    }

    #[test]
    fn test_reaction_emoji_rejects_unknown_glyph() {
        assert!(serde_json::from_str::<ReactionEmoji>("\"🙂\"").is_err());
        assert!(serde_json::from_str::<ReactionEmoji>("\"thumbs_up\"").is_err());
    }

    #[test]
    fn test_entity_flags() {
        let now = chrono::Utc::now();
        let mut message = MessageEntity {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_id: None,
            _type: MessageType::Text,
            content: "hello".to_string(),
            is_edited: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        assert!(!message.is_deleted());
        assert!(!message.is_reply());

        message.deleted_at = Some(now);
        message.reply_to_id = Some(Uuid::now_v7());
        assert!(message.is_deleted());
        assert!(message.is_reply());
    }
}
