use uuid::Uuid;

use crate::modules::message::model::{AttachmentInput, InsertMessage, MessageQuery};
use crate::modules::message::schema::{
    AttachmentEntity, MessageEntity, ReactionEmoji, ReactionEntity, ReadReceiptEntity,
};
use crate::api::error;

#[async_trait::async_trait]
pub trait MessageRepository {
    fn get_pool(&self) -> &sqlx::Pool<sqlx::Postgres>;

    async fn insert<'e, E>(
        &self,
        message: &InsertMessage,
        tx: E,
    ) -> Result<MessageEntity, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn insert_attachments<'e>(
        &self,
        message_id: &Uuid,
        attachments: &[AttachmentInput],
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
    ) -> Result<Vec<AttachmentEntity>, error::SystemError>;

    async fn find_by_id<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    /// Resolve a reply target inside one conversation. Deleted rows are
    /// returned too; the caller decides how to render them.
    async fn find_in_conversation<'e, E>(
        &self,
        message_id: &Uuid,
        conversation_id: &Uuid,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_page<'e, E>(
        &self,
        query: &MessageQuery,
        limit: i64,
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn search<'e, E>(
        &self,
        conversation_id: &Uuid,
        pattern: &str,
        limit: i64,
        offset: i64,
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn append_edit<'e, E>(
        &self,
        message_id: &Uuid,
        prior_content: &str,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    /// Guarded by `deleted_at IS NULL`; a concurrent delete wins and this
    /// returns `None`.
    async fn update_content<'e, E>(
        &self,
        message_id: &Uuid,
        content: &str,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn soft_delete<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<bool, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    /// Insert a read receipt for every live message the reader has not
    /// receipted yet, excluding the reader's own messages.
    async fn backfill_receipts<'e, E>(
        &self,
        conversation_id: &Uuid,
        reader_id: &Uuid,
        tx: E,
    ) -> Result<u64, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn upsert_reaction<'e, E>(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &ReactionEmoji,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn delete_reaction<'e, E>(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<bool, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_reactions<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<Vec<ReactionEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_attachments_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<AttachmentEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_reactions_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<ReactionEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_receipts_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;

    async fn find_reply_targets<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>;
}
