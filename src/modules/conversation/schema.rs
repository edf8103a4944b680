#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "participant_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Student,
    Teacher,
}

#[derive(Debug, Clone, FromRow)]
pub struct ConversationEntity {
    pub id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub is_active: bool,
    pub last_message_id: Option<Uuid>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ConversationEntity {
    /// The other side of this two-party conversation.
    pub fn counterpart_of(&self, user_id: &Uuid) -> Uuid {
        if self.student_id == *user_id {
            self.teacher_id
        } else {
            self.student_id
        }
    }

    pub fn role_of(&self, user_id: &Uuid) -> Option<ParticipantRole> {
        if self.student_id == *user_id {
            Some(ParticipantRole::Student)
        } else if self.teacher_id == *user_id {
            Some(ParticipantRole::Teacher)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantEntity {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub unread_count: i32,
    pub is_pinned: bool,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub last_seen_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(student_id: Uuid, teacher_id: Uuid) -> ConversationEntity {
        let now = chrono::Utc::now();
        ConversationEntity {
            id: Uuid::now_v7(),
            course_id: Uuid::now_v7(),
            student_id,
            teacher_id,
            title: "Rust 101".to_string(),
            is_active: true,
            last_message_id: None,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_counterpart_of() {
        let student = Uuid::now_v7();
        let teacher = Uuid::now_v7();
        let conv = conversation(student, teacher);

        assert_eq!(conv.counterpart_of(&student), teacher);
        assert_eq!(conv.counterpart_of(&teacher), student);
    }

    #[test]
    fn test_role_of() {
        let student = Uuid::now_v7();
        let teacher = Uuid::now_v7();
        let conv = conversation(student, teacher);

        assert_eq!(conv.role_of(&student), Some(ParticipantRole::Student));
        assert_eq!(conv.role_of(&teacher), Some(ParticipantRole::Teacher));
        assert_eq!(conv.role_of(&Uuid::now_v7()), None);
    }

    #[test]
    fn test_participant_role_serde() {
        assert_eq!(serde_json::to_string(&ParticipantRole::Student).unwrap(), "\"student\"");
        assert_eq!(serde_json::to_string(&ParticipantRole::Teacher).unwrap(), "\"teacher\"");
        assert!(serde_json::from_str::<ParticipantRole>("\"admin\"").is_err());
    }
}
