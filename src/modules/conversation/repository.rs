use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::{ConversationAccess, ConversationListRow, NewConversation, NewParticipant, UnreadRecipient},
        schema::{ConversationEntity, ParticipantEntity},
    },
};

#[async_trait::async_trait]
pub trait ConversationRepository {
    fn get_pool(&self) -> &sqlx::Pool<sqlx::Postgres>;

    async fn find_by_id<'e, E>(
        &self,
        conversation_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_by_course_pair<'e, E>(
        &self,
        course_id: &Uuid,
        student_id: &Uuid,
        teacher_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    /// Insert guarded by the (course, student, teacher) unique key. Returns
    /// `None` when a concurrent insert already created the row; the caller
    /// re-selects the winner in that case.
    async fn insert<'e, E>(
        &self,
        conversation: &NewConversation,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_with_participant<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationAccess>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn list_for_user<'e, E>(
        &self,
        user_id: &Uuid,
        course_id: Option<&Uuid>,
        pattern: Option<&str>,
        limit: i64,
        offset: i64,
        tx: E,
    ) -> Result<Vec<ConversationListRow>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_detail_row<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationListRow>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn set_last_message<'e, E>(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
        activity_at: &chrono::DateTime<chrono::Utc>,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    /// After a soft delete, move `last_message_id` back to the newest live
    /// message. Only fires when the deleted message was the current tip.
    async fn repoint_last_message<'e, E>(
        &self,
        conversation_id: &Uuid,
        removed_message_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;
}

#[async_trait::async_trait]
pub trait ParticipantRepository {
    async fn create_participant<'e, E>(
        &self,
        participant: &NewParticipant,
        tx: E,
    ) -> Result<ParticipantEntity, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn increment_unread_for_others<'e, E>(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        tx: E,
    ) -> Result<Vec<UnreadRecipient>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn reset_unread_count<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn touch_last_seen<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn toggle_pin<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<bool>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;
}
