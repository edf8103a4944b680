use actix::Addr;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::conversation::schema::{ConversationEntity, ParticipantEntity};
use crate::modules::message::model::{
    AttachmentView, InsertMessage, MessageHistoryQuery, MessageHistoryResponse, MessageQuery,
    MessageResponse, MessageSearchQuery, ReactionView, ReadReceiptView, ReplyTarget,
    SendMessageBody,
};
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::{
    AttachmentEntity, MessageEntity, MessageType, ReactionEmoji, ReactionEntity, ReadReceiptEntity,
};
use crate::modules::user::schema::UserRole;
use crate::modules::websocket::events::{BroadcastToRoom, SendToUser};
use crate::modules::websocket::message::ServerMessage;
use crate::modules::websocket::server::WebSocketServer;
use crate::utils::escape_like;
use crate::ENV;

/// True while a message can still be edited by its sender.
pub fn within_edit_window(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window_secs: i64,
) -> bool {
    now.signed_duration_since(created_at).num_seconds() <= window_secs
}

/// Trim a limit+1 fetch down to one page. The extra row only proves more
/// history exists; the cursor points at the last row actually kept.
/// Pages fetched newest-first are flipped so responses are always ascending.
fn page_with_cursor(
    mut messages: Vec<MessageEntity>,
    limit: i64,
    newest_first: bool,
) -> (Vec<MessageEntity>, Option<String>) {
    let mut next_cursor = None;

    if messages.len() as i64 > limit {
        messages.pop();
        next_cursor = messages.last().map(|m| m.created_at.to_rfc3339());
    }

    if newest_first {
        messages.reverse();
    }

    (messages, next_cursor)
}

fn reply_target_view(target: &MessageEntity) -> ReplyTarget {
    if target.is_deleted() {
        ReplyTarget::Deleted { id: target.id }
    } else {
        ReplyTarget::Message {
            id: target.id,
            sender_id: target.sender_id,
            content: target.content.clone(),
            message_type: target._type.clone(),
            created_at: target.created_at,
        }
    }
}

/// Join one page of messages with their batch-fetched attachments,
/// reactions, receipts and reply targets.
fn assemble_responses(
    messages: Vec<MessageEntity>,
    attachments: Vec<AttachmentEntity>,
    reactions: Vec<ReactionEntity>,
    receipts: Vec<ReadReceiptEntity>,
    reply_targets: Vec<MessageEntity>,
) -> Vec<MessageResponse> {
    let mut attachment_map: HashMap<Uuid, Vec<AttachmentView>> = HashMap::new();
    for row in attachments {
        attachment_map.entry(row.message_id).or_default().push(AttachmentView::from(row));
    }

    let mut reaction_map: HashMap<Uuid, Vec<ReactionView>> = HashMap::new();
    for row in reactions {
        reaction_map.entry(row.message_id).or_default().push(ReactionView::from(row));
    }

    let mut receipt_map: HashMap<Uuid, Vec<ReadReceiptView>> = HashMap::new();
    for row in receipts {
        receipt_map.entry(row.message_id).or_default().push(ReadReceiptView::from(row));
    }

    let target_map: HashMap<Uuid, MessageEntity> =
        reply_targets.into_iter().map(|m| (m.id, m)).collect();

    messages
        .into_iter()
        .map(|message| {
            let reply_to =
                message.reply_to_id.and_then(|id| target_map.get(&id)).map(reply_target_view);

            MessageResponse {
                id: message.id,
                conversation_id: message.conversation_id,
                sender_id: message.sender_id,
                message_type: message._type,
                content: message.content,
                reply_to,
                attachments: attachment_map.remove(&message.id).unwrap_or_default(),
                reactions: reaction_map.remove(&message.id).unwrap_or_default(),
                read_by: receipt_map.remove(&message.id).unwrap_or_default(),
                is_edited: message.is_edited,
                created_at: message.created_at,
                updated_at: message.updated_at,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct MessageService<M, C, P>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ConversationRepository + Send + Sync + 'static,
    P: ParticipantRepository + Send + Sync + 'static,
{
    message_repo: Arc<M>,
    conversation_repo: Arc<C>,
    participant_repo: Arc<P>,
    ws_server: Arc<Addr<WebSocketServer>>,
}

impl<M, C, P> MessageService<M, C, P>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ConversationRepository + Send + Sync + 'static,
    P: ParticipantRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        participant_repo: Arc<P>,
        ws_server: Arc<Addr<WebSocketServer>>,
    ) -> Self {
        MessageService { message_repo, conversation_repo, participant_repo, ws_server }
    }

    /// Persist a message and everything that hangs off it in one
    /// transaction, then push it to the other participant's live sessions.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: SendMessageBody,
    ) -> Result<MessageResponse, error::SystemError> {
        let (conversation, _) = self.require_active_member(&conversation_id, &sender_id).await?;

        if let Some(reply_to) = body.reply_to {
            // Deleted targets are fine, they render as a placeholder.
            self.message_repo
                .find_in_conversation(&reply_to, &conversation_id, self.message_repo.get_pool())
                .await?
                .ok_or_else(|| {
                    error::SystemError::bad_request(
                        "Reply target does not belong to this conversation",
                    )
                })?;
        }

        let insert = InsertMessage {
            conversation_id,
            sender_id,
            reply_to_id: body.reply_to,
            _type: body.message_type.unwrap_or(MessageType::Text),
            content: body.content,
        };

        let mut tx = self.message_repo.get_pool().begin().await?;

        let message = self.message_repo.insert(&insert, tx.as_mut()).await?;

        if let Some(attachments) = &body.attachments {
            self.message_repo.insert_attachments(&message.id, attachments, &mut tx).await?;
        }

        let recipients = self
            .participant_repo
            .increment_unread_for_others(&conversation_id, &sender_id, tx.as_mut())
            .await?;

        self.conversation_repo
            .set_last_message(&conversation_id, &message.id, &message.created_at, tx.as_mut())
            .await?;

        tx.commit().await?;

        let response = self.hydrate_one(message).await?;
        let payload = serde_json::to_value(&response)?;

        for recipient in recipients {
            self.ws_server.do_send(SendToUser {
                user_id: recipient.user_id,
                message: ServerMessage::NewMessage {
                    conversation_id: conversation.id,
                    message: payload.clone(),
                    unread_count: recipient.unread_count,
                },
            });
        }

        Ok(response)
    }

    /// One page of history, ascending. Viewing implies reading: the
    /// caller's unread state is reconciled after the fetch and the
    /// counterpart is told.
    pub async fn get_history(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        query: MessageHistoryQuery,
    ) -> Result<MessageHistoryResponse, error::SystemError> {
        let (conversation, _) = self.require_member(&conversation_id, &user_id).await?;

        if query.before.is_some() && query.after.is_some() {
            return Err(error::SystemError::bad_request(
                "Specify either before or after, not both",
            ));
        }

        let before = parse_cursor(query.before.as_deref())?;
        let after = parse_cursor(query.after.as_deref())?;
        let limit = query.limit();

        let window = MessageQuery { conversation_id, before, after };
        let rows = self
            .message_repo
            .find_page(&window, limit + 1, self.message_repo.get_pool())
            .await?;

        let (page, next_cursor) = page_with_cursor(rows, limit, after.is_none());
        let messages = self.hydrate(page).await?;

        self.mark_conversation_read(&conversation, &user_id).await?;

        Ok(MessageHistoryResponse { messages, next_cursor })
    }

    pub async fn search(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        query: MessageSearchQuery,
    ) -> Result<Vec<MessageResponse>, error::SystemError> {
        self.require_member(&conversation_id, &user_id).await?;

        let pattern = format!("%{}%", escape_like(&query.q));
        let rows = self
            .message_repo
            .search(
                &conversation_id,
                &pattern,
                query.limit(),
                query.offset(),
                self.message_repo.get_pool(),
            )
            .await?;

        self.hydrate(rows).await
    }

    /// Sender-only, inside the edit window. The prior content goes to the
    /// edit history before the row is updated; the update's `deleted_at IS
    /// NULL` guard lets a concurrent delete win.
    pub async fn edit_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        new_content: String,
    ) -> Result<MessageResponse, error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(&message_id, self.message_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.is_deleted() {
            return Err(error::SystemError::not_found("Message not found"));
        }

        if message.sender_id != user_id {
            return Err(error::SystemError::forbidden("You can only edit your own messages"));
        }

        let conversation = self.require_active_conversation(&message.conversation_id).await?;

        if !within_edit_window(message.created_at, Utc::now(), ENV.message_edit_window_secs) {
            return Err(error::SystemError::bad_request(
                "The edit window for this message has closed",
            ));
        }

        if message.content == new_content {
            return self.hydrate_one(message).await;
        }

        let mut tx = self.message_repo.get_pool().begin().await?;

        self.message_repo.append_edit(&message_id, &message.content, tx.as_mut()).await?;

        let updated = self
            .message_repo
            .update_content(&message_id, &new_content, tx.as_mut())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        tx.commit().await?;

        self.ws_server.do_send(BroadcastToRoom {
            conversation_id: conversation.id,
            message: ServerMessage::MessageEdited {
                conversation_id: conversation.id,
                message_id,
                content: new_content,
            },
            skip_user_id: None,
        });

        self.hydrate_one(updated).await
    }

    /// Soft delete by the sender or an admin. Works on disabled
    /// conversations too, moderation has to be able to take content down.
    pub async fn delete_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<(), error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(&message_id, self.message_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.sender_id != user_id && role != UserRole::Admin {
            return Err(error::SystemError::forbidden("You can only delete your own messages"));
        }

        let mut tx = self.message_repo.get_pool().begin().await?;

        let deleted = self.message_repo.soft_delete(&message_id, tx.as_mut()).await?;
        if !deleted {
            return Err(error::SystemError::not_found("Message not found or already deleted"));
        }

        self.conversation_repo
            .repoint_last_message(&message.conversation_id, &message_id, tx.as_mut())
            .await?;

        tx.commit().await?;

        self.ws_server.do_send(BroadcastToRoom {
            conversation_id: message.conversation_id,
            message: ServerMessage::MessageDeleted {
                conversation_id: message.conversation_id,
                message_id,
            },
            skip_user_id: None,
        });

        Ok(())
    }

    /// Add or replace the caller's reaction, then return the message's
    /// full reaction list.
    pub async fn add_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: ReactionEmoji,
    ) -> Result<Vec<ReactionView>, error::SystemError> {
        let message = self.require_live_message(&message_id).await?;
        self.require_active_member(&message.conversation_id, &user_id).await?;

        let pool = self.message_repo.get_pool();
        self.message_repo.upsert_reaction(&message_id, &user_id, &emoji, pool).await?;

        let reactions = self.message_repo.find_reactions(&message_id, pool).await?;

        Ok(reactions.into_iter().map(ReactionView::from).collect())
    }

    pub async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(&message_id, self.message_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        self.require_member(&message.conversation_id, &user_id).await?;

        // Removing a reaction that is not there is a no-op.
        self.message_repo
            .delete_reaction(&message_id, &user_id, self.message_repo.get_pool())
            .await?;

        Ok(())
    }

    async fn mark_conversation_read(
        &self,
        conversation: &ConversationEntity,
        user_id: &Uuid,
    ) -> Result<(), error::SystemError> {
        let mut tx = self.message_repo.get_pool().begin().await?;
        self.participant_repo.reset_unread_count(&conversation.id, user_id, tx.as_mut()).await?;
        self.message_repo.backfill_receipts(&conversation.id, user_id, tx.as_mut()).await?;
        self.participant_repo.touch_last_seen(&conversation.id, user_id, tx.as_mut()).await?;
        tx.commit().await?;

        self.ws_server.do_send(SendToUser {
            user_id: conversation.counterpart_of(user_id),
            message: ServerMessage::MessagesRead {
                conversation_id: conversation.id,
                user_id: *user_id,
            },
        });

        Ok(())
    }

    async fn hydrate(
        &self,
        messages: Vec<MessageEntity>,
    ) -> Result<Vec<MessageResponse>, error::SystemError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let pool = self.message_repo.get_pool();
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        let reply_ids: Vec<Uuid> = messages.iter().filter_map(|m| m.reply_to_id).collect();

        let (attachments, reactions, receipts, reply_targets) = tokio::try_join!(
            self.message_repo.find_attachments_for(&ids, pool),
            self.message_repo.find_reactions_for(&ids, pool),
            self.message_repo.find_receipts_for(&ids, pool),
            self.message_repo.find_reply_targets(&reply_ids, pool),
        )?;

        Ok(assemble_responses(messages, attachments, reactions, receipts, reply_targets))
    }

    async fn hydrate_one(
        &self,
        message: MessageEntity,
    ) -> Result<MessageResponse, error::SystemError> {
        let mut responses = self.hydrate(vec![message]).await?;
        responses.pop().ok_or_else(|| error::SystemError::not_found("Message not found"))
    }

    async fn require_live_message(
        &self,
        message_id: &Uuid,
    ) -> Result<MessageEntity, error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(message_id, self.message_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.is_deleted() {
            return Err(error::SystemError::not_found("Message not found"));
        }

        Ok(message)
    }

    async fn require_member(
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

    async fn require_active_member(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(ConversationEntity, ParticipantEntity), error::SystemError> {
        let (conversation, participant) = self.require_member(conversation_id, user_id).await?;

        if !conversation.is_active {
            return Err(error::SystemError::forbidden("This conversation has been disabled"));
        }

        Ok((conversation, participant))
    }

    async fn require_active_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        let conversation = self
            .conversation_repo
            .find_by_id(conversation_id, self.conversation_repo.get_pool())
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if !conversation.is_active {
            return Err(error::SystemError::forbidden("This conversation has been disabled"));
        }

        Ok(conversation)
    }
}

fn parse_cursor(
    cursor: Option<&str>,
) -> Result<Option<DateTime<Utc>>, error::SystemError> {
    cursor
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| error::SystemError::bad_request("Invalid cursor format"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{message_fixture, minutes_ago};
    use chrono::Duration;

    fn entity(created_at: DateTime<Utc>) -> MessageEntity {
        message_fixture(Uuid::now_v7(), Uuid::now_v7(), "hello", created_at)
    }

    #[test]
    fn test_within_edit_window_boundaries() {
        let created = Utc::now();

        assert!(within_edit_window(created, created, 900));
        assert!(within_edit_window(created, created + Duration::seconds(900), 900));
        assert!(!within_edit_window(created, created + Duration::seconds(901), 900));
    }

    #[test]
    fn test_page_with_cursor_descending_fetch() {
        // Rows arrive newest first, as the no-cursor query returns them.
        let rows = vec![entity(Utc::now()), entity(minutes_ago(1)), entity(minutes_ago(2))];
        let oldest_kept = rows[1].created_at;

        let (page, cursor) = page_with_cursor(rows, 2, true);

        assert_eq!(page.len(), 2);
        assert_eq!(cursor, Some(oldest_kept.to_rfc3339()));
        // Flipped to ascending.
        assert!(page[0].created_at < page[1].created_at);
    }

    #[test]
    fn test_page_with_cursor_last_page() {
        let rows = vec![entity(Utc::now()), entity(minutes_ago(1))];

        let (page, cursor) = page_with_cursor(rows, 2, true);

        assert_eq!(page.len(), 2);
        assert_eq!(cursor, None);
    }

    #[test]
    fn test_page_with_cursor_ascending_fetch() {
        let rows = vec![entity(minutes_ago(2)), entity(minutes_ago(1)), entity(Utc::now())];
        let newest_kept = rows[1].created_at;

        let (page, cursor) = page_with_cursor(rows, 2, false);

        assert_eq!(page.len(), 2);
        assert_eq!(cursor, Some(newest_kept.to_rfc3339()));
        assert!(page[0].created_at < page[1].created_at);
    }

    #[test]
    fn test_parse_cursor() {
        assert_eq!(parse_cursor(None).unwrap(), None);

        let parsed = parse_cursor(Some("2025-06-01T12:00:00+00:00")).unwrap();
        assert!(parsed.is_some());

        assert!(parse_cursor(Some("yesterday")).is_err());
    }

    #[test]
    fn test_reply_target_view_tombstones_deleted() {
        let now = Utc::now();
        let live = entity(now);
        let mut deleted = entity(now);
        deleted.deleted_at = Some(now);

        match reply_target_view(&live) {
            ReplyTarget::Message { id, content, .. } => {
                assert_eq!(id, live.id);
                assert_eq!(content, "hello");
            }
            ReplyTarget::Deleted { .. } => panic!("live target should not tombstone"),
        }

        match reply_target_view(&deleted) {
            ReplyTarget::Deleted { id } => assert_eq!(id, deleted.id),
            ReplyTarget::Message { .. } => panic!("deleted target should tombstone"),
        }
    }

    #[test]
    fn test_assemble_responses_groups_by_message() {
        let now = Utc::now();
        let first = entity(now - Duration::minutes(1));
        let target = entity(now - Duration::minutes(5));
        let mut second = entity(now);
        second.reply_to_id = Some(target.id);

        let attachment = AttachmentEntity {
            id: Uuid::now_v7(),
            message_id: first.id,
            file_name: "slides.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 2048,
            url: "https://files.example.com/slides.pdf".to_string(),
            created_at: now,
        };
        let reaction = ReactionEntity {
            message_id: first.id,
            user_id: Uuid::now_v7(),
            emoji: ReactionEmoji::ThumbsUp,
            created_at: now,
        };
        let receipt = ReadReceiptEntity {
            message_id: second.id,
            user_id: Uuid::now_v7(),
            read_at: now,
        };

        let responses = assemble_responses(
            vec![first.clone(), second.clone()],
            vec![attachment],
            vec![reaction],
            vec![receipt],
            vec![target.clone()],
        );

        assert_eq!(responses.len(), 2);

        assert_eq!(responses[0].id, first.id);
        assert_eq!(responses[0].attachments.len(), 1);
        assert_eq!(responses[0].attachments[0].created_at, now);
        assert_eq!(responses[0].reactions.len(), 1);
        assert!(responses[0].read_by.is_empty());
        assert!(responses[0].reply_to.is_none());

        assert_eq!(responses[1].id, second.id);
        assert!(responses[1].attachments.is_empty());
        assert_eq!(responses[1].read_by.len(), 1);
        match &responses[1].reply_to {
            Some(ReplyTarget::Message { id, .. }) => assert_eq!(*id, target.id),
            other => panic!("expected resolved reply target, got {:?}", other),
        }
    }
}
