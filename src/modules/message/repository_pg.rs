use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{
        model::{AttachmentInput, InsertMessage, MessageQuery},
        repository::MessageRepository,
        schema::{AttachmentEntity, MessageEntity, ReactionEmoji, ReactionEntity, ReadReceiptEntity},
    },
};

#[derive(Clone)]
pub struct MessageRepositoryPg {
    pool: sqlx::PgPool,
}

impl MessageRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageRepositoryPg {
    fn get_pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    async fn insert<'e, E>(
        &self,
        message: &InsertMessage,
        tx: E,
    ) -> Result<MessageEntity, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let id = Uuid::now_v7();
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, reply_to_id, type, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.reply_to_id)
        .bind(&message._type)
        .bind(&message.content)
        .fetch_one(tx)
        .await?;

        Ok(message)
    }

    async fn insert_attachments<'e>(
        &self,
        message_id: &Uuid,
        attachments: &[AttachmentInput],
        tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
    ) -> Result<Vec<AttachmentEntity>, error::SystemError> {
        let mut inserted = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let entity = sqlx::query_as::<_, AttachmentEntity>(
                r#"
                INSERT INTO message_attachments (id, message_id, file_name, mime_type, size_bytes, url)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(message_id)
            .bind(&attachment.file_name)
            .bind(&attachment.mime_type)
            .bind(attachment.size_bytes)
            .bind(&attachment.url)
            .fetch_one(tx.as_mut())
            .await?;

            inserted.push(entity);
        }

        Ok(inserted)
    }

    async fn find_by_id<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let message =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(tx)
                .await?;

        Ok(message)
    }

    async fn find_in_conversation<'e, E>(
        &self,
        message_id: &Uuid,
        conversation_id: &Uuid,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let message = sqlx::query_as::<_, MessageEntity>(
            "SELECT * FROM messages WHERE id = $1 AND conversation_id = $2",
        )
        .bind(message_id)
        .bind(conversation_id)
        .fetch_optional(tx)
        .await?;

        Ok(message)
    }

    async fn find_page<'e, E>(
        &self,
        query: &MessageQuery,
        limit: i64,
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        // Walks idx_messages_conversation_live in both directions.
        let messages = if let Some(before) = query.before {
            sqlx::query_as::<_, MessageEntity>(
                r#"
                SELECT * FROM messages
                WHERE conversation_id = $1
                AND deleted_at IS NULL
                AND created_at < $2
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#,
            )
            .bind(query.conversation_id)
            .bind(before)
            .bind(limit)
            .fetch_all(tx)
            .await?
        } else if let Some(after) = query.after {
            sqlx::query_as::<_, MessageEntity>(
                r#"
                SELECT * FROM messages
                WHERE conversation_id = $1
                AND deleted_at IS NULL
                AND created_at > $2
                ORDER BY created_at ASC, id ASC
                LIMIT $3
                "#,
            )
            .bind(query.conversation_id)
            .bind(after)
            .bind(limit)
            .fetch_all(tx)
            .await?
        } else {
            sqlx::query_as::<_, MessageEntity>(
                r#"
                SELECT * FROM messages
                WHERE conversation_id = $1
                AND deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(query.conversation_id)
            .bind(limit)
            .fetch_all(tx)
            .await?
        };

        Ok(messages)
    }

    async fn search<'e, E>(
        &self,
        conversation_id: &Uuid,
        pattern: &str,
        limit: i64,
        offset: i64,
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let messages = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            AND deleted_at IS NULL
            AND content ILIKE $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(conversation_id)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(tx)
        .await?;

        Ok(messages)
    }

    async fn append_edit<'e, E>(
        &self,
        message_id: &Uuid,
        prior_content: &str,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO message_edits (id, message_id, content)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(message_id)
        .bind(prior_content)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn update_content<'e, E>(
        &self,
        message_id: &Uuid,
        content: &str,
        tx: E,
    ) -> Result<Option<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET content = $2,
                is_edited = TRUE,
                updated_at = NOW()
            WHERE id = $1
            AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(content)
        .fetch_optional(tx)
        .await?;

        Ok(message)
    }

    async fn soft_delete<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<bool, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows = sqlx::query(
            r#"
            UPDATE messages
            SET deleted_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .execute(tx)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn backfill_receipts<'e, E>(
        &self,
        conversation_id: &Uuid,
        reader_id: &Uuid,
        tx: E,
    ) -> Result<u64, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows = sqlx::query(
            r#"
            INSERT INTO message_reads (message_id, user_id)
            SELECT m.id, $2
            FROM messages m
            WHERE m.conversation_id = $1
            AND m.sender_id <> $2
            AND m.deleted_at IS NULL
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(tx)
        .await?
        .rows_affected();

        Ok(rows)
    }

    async fn upsert_reaction<'e, E>(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &ReactionEmoji,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO message_reactions (message_id, user_id, emoji)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET emoji = EXCLUDED.emoji,
                created_at = NOW()
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn delete_reaction<'e, E>(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<bool, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows = sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2",
        )
        .bind(message_id)
        .bind(user_id)
        .execute(tx)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn find_reactions<'e, E>(
        &self,
        message_id: &Uuid,
        tx: E,
    ) -> Result<Vec<ReactionEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let reactions = sqlx::query_as::<_, ReactionEntity>(
            r#"
            SELECT * FROM message_reactions
            WHERE message_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(tx)
        .await?;

        Ok(reactions)
    }

    async fn find_attachments_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<AttachmentEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let attachments = sqlx::query_as::<_, AttachmentEntity>(
            r#"
            SELECT * FROM message_attachments
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(tx)
        .await?;

        Ok(attachments)
    }

    async fn find_reactions_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<ReactionEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let reactions = sqlx::query_as::<_, ReactionEntity>(
            r#"
            SELECT * FROM message_reactions
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(tx)
        .await?;

        Ok(reactions)
    }

    async fn find_receipts_for<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let receipts = sqlx::query_as::<_, ReadReceiptEntity>(
            r#"
            SELECT * FROM message_reads
            WHERE message_id = ANY($1)
            ORDER BY read_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(tx)
        .await?;

        Ok(receipts)
    }

    async fn find_reply_targets<'e, E>(
        &self,
        message_ids: &[Uuid],
        tx: E,
    ) -> Result<Vec<MessageEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let targets =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = ANY($1)")
                .bind(message_ids)
                .fetch_all(tx)
                .await?;

        Ok(targets)
    }
}
