use actix::Addr;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::error,
    configs::RedisCache,
    modules::{
        conversation::{
            model::{
                ConversationQuery, ConversationResponse, NewConversation, NewParticipant,
                PinResponse, ReadResponse,
            },
            repository::{ConversationRepository, ParticipantRepository},
            schema::{ConversationEntity, ParticipantEntity, ParticipantRole},
        },
        course::{model::CourseInfo, repository::CourseRepository},
        message::repository::MessageRepository,
        user::repository::UserRepository,
        websocket::{events::SendToUser, message::ServerMessage, server::WebSocketServer},
    },
    utils::escape_like,
};

const COURSE_CACHE_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct ConversationService<C, P, M, K, U>
where
    C: ConversationRepository + Send + Sync + 'static,
    P: ParticipantRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    K: CourseRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    conversation_repo: Arc<C>,
    participant_repo: Arc<P>,
    message_repo: Arc<M>,
    course_repo: Arc<K>,
    user_repo: Arc<U>,
    cache: Arc<RedisCache>,
    ws_server: Arc<Addr<WebSocketServer>>,
}

impl<C, P, M, K, U> ConversationService<C, P, M, K, U>
where
    C: ConversationRepository + Send + Sync + 'static,
    P: ParticipantRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    K: CourseRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        conversation_repo: Arc<C>,
        participant_repo: Arc<P>,
        message_repo: Arc<M>,
        course_repo: Arc<K>,
        user_repo: Arc<U>,
        cache: Arc<RedisCache>,
        ws_server: Arc<Addr<WebSocketServer>>,
    ) -> Self {
        ConversationService {
            conversation_repo,
            participant_repo,
            message_repo,
            course_repo,
            user_repo,
            cache,
            ws_server,
        }
    }

    /// Find or create the caller's conversation with the instructor of a
    /// course. The caller joins as the student; the unique key on
    /// (course, student, teacher) collapses concurrent creates to one row.
    pub async fn start_with_instructor(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<ConversationResponse, error::SystemError> {
        let course = self.cached_course(&course_id).await?;

        if course.instructor_id == user_id {
            return Err(error::SystemError::bad_request(
                "You cannot start a conversation with yourself",
            ));
        }

        self.user_repo
            .find_by_id(&course.instructor_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Instructor not found"))?;

        let pool = self.conversation_repo.get_pool();

        let existing = self
            .conversation_repo
            .find_by_course_pair(&course.id, &user_id, &course.instructor_id, pool)
            .await?;

        let conversation = match existing {
            Some(conversation) => conversation,
            None => self.create_for_course(&course, &user_id).await?,
        };

        if !conversation.is_active {
            return Err(error::SystemError::forbidden("This conversation has been disabled"));
        }

        self.detail(&conversation.id, &user_id).await
    }

    async fn create_for_course(
        &self,
        course: &CourseInfo,
        student_id: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        let new_conversation = NewConversation {
            course_id: course.id,
            student_id: *student_id,
            teacher_id: course.instructor_id,
            title: format!("Course chat: {}", course.title),
        };

        let mut tx = self.conversation_repo.get_pool().begin().await?;

        let inserted = self.conversation_repo.insert(&new_conversation, tx.as_mut()).await?;

        let conversation = match inserted {
            Some(conversation) => {
                self.participant_repo
                    .create_participant(
                        &NewParticipant {
                            conversation_id: conversation.id,
                            user_id: *student_id,
                            role: ParticipantRole::Student,
                        },
                        tx.as_mut(),
                    )
                    .await?;

                self.participant_repo
                    .create_participant(
                        &NewParticipant {
                            conversation_id: conversation.id,
                            user_id: course.instructor_id,
                            role: ParticipantRole::Teacher,
                        },
                        tx.as_mut(),
                    )
                    .await?;

                log::info!(
                    "Created conversation {} for course {}",
                    conversation.id,
                    course.id
                );
                conversation
            }
            // Lost the unique-key race; pick up the winner's row.
            None => self
                .conversation_repo
                .find_by_course_pair(&course.id, student_id, &course.instructor_id, tx.as_mut())
                .await?
                .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?,
        };

        tx.commit().await?;

        Ok(conversation)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: ConversationQuery,
    ) -> Result<Vec<ConversationResponse>, error::SystemError> {
        let pattern = query.q.as_deref().map(|q| format!("%{}%", escape_like(q)));

        let rows = self
            .conversation_repo
            .list_for_user(
                &user_id,
                query.course_id.as_ref(),
                pattern.as_deref(),
                query.limit(),
                query.offset(),
                self.conversation_repo.get_pool(),
            )
            .await?;

        Ok(rows.into_iter().map(ConversationResponse::from).collect())
    }

    /// Zero the caller's unread counter and backfill read receipts for
    /// everything they had not seen, in one transaction.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReadResponse, error::SystemError> {
        let (conversation, _) = self.require_participant(&conversation_id, &user_id).await?;

        let mut tx = self.conversation_repo.get_pool().begin().await?;
        self.participant_repo.reset_unread_count(&conversation_id, &user_id, tx.as_mut()).await?;
        self.message_repo.backfill_receipts(&conversation_id, &user_id, tx.as_mut()).await?;
        self.participant_repo.touch_last_seen(&conversation_id, &user_id, tx.as_mut()).await?;
        tx.commit().await?;

        self.ws_server.do_send(SendToUser {
            user_id: conversation.counterpart_of(&user_id),
            message: ServerMessage::MessagesRead { conversation_id, user_id },
        });

        Ok(ReadResponse { unread_count: 0 })
    }

    pub async fn toggle_pin(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<PinResponse, error::SystemError> {
        self.require_participant(&conversation_id, &user_id).await?;

        let is_pinned = self
            .participant_repo
            .toggle_pin(&conversation_id, &user_id, self.conversation_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        Ok(PinResponse { is_pinned })
    }

    pub async fn is_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, error::SystemError> {
        let access = self
            .conversation_repo
            .find_with_participant(&conversation_id, &user_id, self.conversation_repo.get_pool())
            .await?;

        Ok(access.map(|a| a.participant.is_some()).unwrap_or(false))
    }

    async fn cached_course(&self, course_id: &Uuid) -> Result<CourseInfo, error::SystemError> {
        let cache_key = format!("course:{}", course_id);

        if let Some(course) = self.cache.get::<CourseInfo>(&cache_key).await? {
            return Ok(course);
        }

        let course = self
            .course_repo
            .find_by_id(course_id)
            .await?
            .map(CourseInfo::from)
            .ok_or_else(|| error::SystemError::not_found("Course not found"))?;

        self.cache.set(&cache_key, &course, COURSE_CACHE_TTL_SECS).await?;

        Ok(course)
    }

    async fn detail(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ConversationResponse, error::SystemError> {
        let row = self
            .conversation_repo
            .find_detail_row(conversation_id, user_id, self.conversation_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        Ok(ConversationResponse::from(row))
    }

    async fn require_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(ConversationEntity, ParticipantEntity), error::SystemError> {
        let access = self
            .conversation_repo
            .find_with_participant(conversation_id, user_id, self.conversation_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        let participant = access.participant.ok_or_else(|| {
            error::SystemError::forbidden("You are not a participant of this conversation")
        })?;

        Ok((access.conversation, participant))
    }
}
