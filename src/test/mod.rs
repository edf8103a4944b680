#![allow(dead_code)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::modules::message::schema::{MessageEntity, MessageType};
use crate::modules::user::schema::UserRole;
use crate::utils::Claims;

pub const TEST_SECRET: &[u8] = b"test-only-secret";

pub fn claims_for(user_id: Uuid, role: UserRole) -> Claims {
    Claims::new(&user_id, &role, 3600)
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

pub fn message_fixture(
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    created_at: DateTime<Utc>,
) -> MessageEntity {
    MessageEntity {
        id: Uuid::now_v7(),
        conversation_id,
        sender_id,
        reply_to_id: None,
        _type: MessageType::Text,
        content: content.to_string(),
        is_edited: false,
        deleted_at: None,
        created_at,
        updated_at: created_at,
    }
}
