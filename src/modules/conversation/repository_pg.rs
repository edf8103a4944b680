use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::modules::conversation::model::{
    ConversationAccess, ConversationListRow, NewConversation, NewParticipant, UnreadRecipient,
};
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::conversation::schema::ParticipantEntity;
use crate::{api::error, modules::conversation::schema::ConversationEntity};

/// Column list shared by the list and detail queries. `$1` is always the
/// requesting user; callers append their own WHERE clause.
const CONVERSATION_DETAIL_SELECT: &str = r#"
    SELECT
        c.id,
        c.course_id,
        co.title AS course_title,
        c.title,
        c.is_active,
        c.last_activity_at,
        c.created_at,

        me.role AS my_role,
        me.unread_count,
        me.is_pinned,
        me.last_seen_at,

        other.user_id AS counterpart_id,
        other.role AS counterpart_role,
        u.display_name AS counterpart_name,
        u.avatar_url AS counterpart_avatar_url,

        lm.id AS last_message_id,
        lm.sender_id AS last_sender_id,
        lm.content AS last_content,
        lm.type AS last_type,
        lm.created_at AS last_created_at

    FROM conversations c

    JOIN courses co ON co.id = c.course_id

    JOIN participants me
        ON me.conversation_id = c.id
    AND me.user_id = $1

    JOIN participants other
        ON other.conversation_id = c.id
    AND other.user_id <> $1

    JOIN users u ON u.id = other.user_id

    LEFT JOIN LATERAL (
        SELECT id, sender_id, content, type, created_at
        FROM messages m
        WHERE m.conversation_id = c.id
        AND m.deleted_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
    ) lm ON TRUE
"#;

#[derive(Clone)]
pub struct ConversationRepositoryPg {
    pool: sqlx::PgPool,
}

impl ConversationRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationRepositoryPg {
    fn get_pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    async fn find_by_id<'e, E>(
        &self,
        conversation_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let conversation =
            sqlx::query_as::<_, ConversationEntity>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(tx)
                .await?;

        Ok(conversation)
    }

    async fn find_by_course_pair<'e, E>(
        &self,
        course_id: &Uuid,
        student_id: &Uuid,
        teacher_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            SELECT * FROM conversations
            WHERE course_id = $1
            AND student_id = $2
            AND teacher_id = $3
            "#,
        )
        .bind(course_id)
        .bind(student_id)
        .bind(teacher_id)
        .fetch_optional(tx)
        .await?;

        Ok(conversation)
    }

    async fn insert<'e, E>(
        &self,
        conversation: &NewConversation,
        tx: E,
    ) -> Result<Option<ConversationEntity>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let id = Uuid::now_v7();
        let inserted = sqlx::query_as::<_, ConversationEntity>(
            r#"
            INSERT INTO conversations (id, course_id, student_id, teacher_id, title)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (course_id, student_id, teacher_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(conversation.course_id)
        .bind(conversation.student_id)
        .bind(conversation.teacher_id)
        .bind(&conversation.title)
        .fetch_optional(tx)
        .await?;

        Ok(inserted)
    }

    async fn find_with_participant<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationAccess>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query(
            r#"
            SELECT c.*, p.conversation_id, p.user_id, p.role,
                p.unread_count, p.is_pinned, p.joined_at, p.last_seen_at
            FROM conversations c
            LEFT JOIN participants p
                ON p.conversation_id = c.id
            AND p.user_id = $2
            WHERE c.id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        if let Some(row) = row {
            let conversation = ConversationEntity::from_row(&row)?;
            let member_id: Option<Uuid> = row.try_get("user_id")?;
            let participant = match member_id {
                Some(_) => Some(ParticipantEntity::from_row(&row)?),
                None => None,
            };
            Ok(Some(ConversationAccess { conversation, participant }))
        } else {
            Ok(None)
        }
    }

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
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            r#"
            {CONVERSATION_DETAIL_SELECT}
            WHERE ($2::uuid IS NULL OR c.course_id = $2)
            AND (
                $3::text IS NULL
                OR c.title ILIKE $3
                OR co.title ILIKE $3
                OR u.display_name ILIKE $3
            )
            ORDER BY me.is_pinned DESC, c.last_activity_at DESC
            LIMIT $4 OFFSET $5
            "#
        );

        let rows = sqlx::query_as::<_, ConversationListRow>(&sql)
            .bind(user_id)
            .bind(course_id)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(tx)
            .await?;

        Ok(rows)
    }

    async fn find_detail_row<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<ConversationListRow>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            r#"
            {CONVERSATION_DETAIL_SELECT}
            WHERE c.id = $2
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, ConversationListRow>(&sql)
            .bind(user_id)
            .bind(conversation_id)
            .fetch_optional(tx)
            .await?;

        Ok(row)
    }

    async fn set_last_message<'e, E>(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
        activity_at: &chrono::DateTime<chrono::Utc>,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = $2,
                last_activity_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(activity_at)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn repoint_last_message<'e, E>(
        &self,
        conversation_id: &Uuid,
        removed_message_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = (
                    SELECT m.id
                    FROM messages m
                    WHERE m.conversation_id = $1
                    AND m.deleted_at IS NULL
                    ORDER BY m.created_at DESC, m.id DESC
                    LIMIT 1
                ),
                updated_at = NOW()
            WHERE id = $1
            AND last_message_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(removed_message_id)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ParticipantRepositoryPg {}

#[async_trait::async_trait]
impl ParticipantRepository for ParticipantRepositoryPg {
    async fn create_participant<'e, E>(
        &self,
        participant: &NewParticipant,
        tx: E,
    ) -> Result<ParticipantEntity, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let entity = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            INSERT INTO participants (conversation_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(participant.conversation_id)
        .bind(participant.user_id)
        .bind(&participant.role)
        .fetch_one(tx)
        .await?;

        Ok(entity)
    }

    async fn increment_unread_for_others<'e, E>(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        tx: E,
    ) -> Result<Vec<UnreadRecipient>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let recipients = sqlx::query_as::<_, UnreadRecipient>(
            r#"
            UPDATE participants
            SET unread_count = unread_count + 1
            WHERE conversation_id = $1
            AND user_id <> $2
            RETURNING user_id, unread_count
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .fetch_all(tx)
        .await?;

        Ok(recipients)
    }

    async fn reset_unread_count<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE participants
            SET unread_count = 0
            WHERE conversation_id = $1
            AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn touch_last_seen<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE participants
            SET last_seen_at = NOW()
            WHERE conversation_id = $1
            AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn toggle_pin<'e, E>(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        tx: E,
    ) -> Result<Option<bool>, error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let pinned = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE participants
            SET is_pinned = NOT is_pinned
            WHERE conversation_id = $1
            AND user_id = $2
            RETURNING is_pinned
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(pinned)
    }
}
