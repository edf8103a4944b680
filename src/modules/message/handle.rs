use actix_web::{delete, get, post, put, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        conversation::repository_pg::{ConversationRepositoryPg, ParticipantRepositoryPg},
        message::{
            model::{
                EditMessageBody, MessageHistoryQuery, MessageHistoryResponse, MessageResponse,
                MessageSearchQuery, ReactionBody, ReactionView, SendMessageBody,
            },
            repository_pg::MessageRepositoryPg,
            service::MessageService,
        },
    },
    utils::{ValidatedJson, ValidatedQuery},
};

type MessageSvc =
    MessageService<MessageRepositoryPg, ConversationRepositoryPg, ParticipantRepositoryPg>;

#[get("/{conversation_id}/messages")]
pub async fn get_messages(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    query: ValidatedQuery<MessageHistoryQuery>,
    req: HttpRequest,
) -> Result<success::Success<MessageHistoryResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let history = message_service.get_history(*conversation_id, user_id, query.0).await?;

    Ok(success::Success::ok(Some(history)).message("Successfully retrieved messages"))
}

#[post("/{conversation_id}/messages")]
pub async fn send_message(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    body: ValidatedJson<SendMessageBody>,
    req: HttpRequest,
) -> Result<success::Success<MessageResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let message = message_service.send_message(*conversation_id, user_id, body.0).await?;

    Ok(success::Success::created(Some(message)).message("Successfully sent message"))
}

#[get("/{conversation_id}/search")]
pub async fn search_messages(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    query: ValidatedQuery<MessageSearchQuery>,
    req: HttpRequest,
) -> Result<success::Success<Vec<MessageResponse>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let messages = message_service.search(*conversation_id, user_id, query.0).await?;

    Ok(success::Success::ok(Some(messages)).message("Successfully searched messages"))
}

#[put("/{message_id}")]
pub async fn edit_message(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    body: ValidatedJson<EditMessageBody>,
    req: HttpRequest,
) -> Result<success::Success<MessageResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let message = message_service.edit_message(*message_id, user_id, body.0.content).await?;

    Ok(success::Success::ok(Some(message)).message("Successfully edited message"))
}

#[delete("/{message_id}")]
pub async fn delete_message(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let claims = get_claims(&req)?;

    message_service.delete_message(*message_id, claims.sub, claims.role).await?;

    Ok(success::Success::no_content())
}

#[post("/{message_id}/reaction")]
pub async fn add_reaction(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    body: ValidatedJson<ReactionBody>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReactionView>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let reactions = message_service.add_reaction(*message_id, user_id, body.0.emoji).await?;

    Ok(success::Success::ok(Some(reactions)).message("Successfully added reaction"))
}

#[delete("/{message_id}/reaction")]
pub async fn remove_reaction(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    message_service.remove_reaction(*message_id, user_id).await?;

    Ok(success::Success::no_content())
}
