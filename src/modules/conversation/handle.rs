use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        conversation::{
            model::{ConversationQuery, ConversationResponse, PinResponse, ReadResponse},
            repository_pg::{ConversationRepositoryPg, ParticipantRepositoryPg},
            service::ConversationService,
        },
        course::repository_pg::CourseRepositoryPg,
        message::repository_pg::MessageRepositoryPg,
        user::repository_pg::UserRepositoryPg,
    },
    utils::ValidatedQuery,
};

type ConversationSvc = ConversationService<
    ConversationRepositoryPg,
    ParticipantRepositoryPg,
    MessageRepositoryPg,
    CourseRepositoryPg,
    UserRepositoryPg,
>;

#[get("")]
pub async fn list_conversations(
    conversation_svc: web::Data<ConversationSvc>,
    query: ValidatedQuery<ConversationQuery>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ConversationResponse>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversations = conversation_svc.list(user_id, query.0).await?;

    Ok(success::Success::ok(Some(conversations)).message("Successfully retrieved conversations"))
}

#[get("/{course_id}/instructor")]
pub async fn start_with_instructor(
    conversation_svc: web::Data<ConversationSvc>,
    course_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ConversationResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversation = conversation_svc.start_with_instructor(*course_id, user_id).await?;

    Ok(success::Success::ok(Some(conversation)).message("Successfully retrieved conversation"))
}

#[post("/{conversation_id}/read")]
pub async fn mark_conversation_read(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ReadResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let read = conversation_svc.mark_read(*conversation_id, user_id).await?;

    Ok(success::Success::ok(Some(read)).message("Successfully marked conversation as read"))
}

#[post("/{conversation_id}/pin")]
pub async fn toggle_pin(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<PinResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let pin = conversation_svc.toggle_pin(*conversation_id, user_id).await?;

    Ok(success::Success::ok(Some(pin)).message("Successfully toggled pin"))
}
