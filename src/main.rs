use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::sync::{Arc, LazyLock};

use crate::{
    configs::{RedisCache, connect_database},
    middlewares::authentication,
    modules::{
        conversation::{
            repository_pg::{ConversationRepositoryPg, ParticipantRepositoryPg},
            service::ConversationService,
        },
        course::repository_pg::CourseRepositoryPg,
        message::{repository_pg::MessageRepositoryPg, service::MessageService},
        user::repository_pg::UserRepositoryPg,
        websocket::{handler::websocket_handler, server::WebSocketServer},
    },
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    let redis_cache = Arc::new(
        RedisCache::new().await.map_err(|_| std::io::Error::other("Redis connection error"))?,
    );

    let ws_server = Arc::new(WebSocketServer::new().start());

    let conversation_repo = Arc::new(ConversationRepositoryPg::new(db_pool.clone()));
    let participant_repo = Arc::new(ParticipantRepositoryPg::default());
    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let course_repo = Arc::new(CourseRepositoryPg::new(db_pool.clone()));
    let user_repo = Arc::new(UserRepositoryPg::new(db_pool));

    let conversation_service = ConversationService::with_dependencies(
        conversation_repo.clone(),
        participant_repo.clone(),
        message_repo.clone(),
        course_repo,
        user_repo,
        redis_cache,
        ws_server.clone(),
    );

    let message_service = MessageService::with_dependencies(
        message_repo,
        conversation_repo,
        participant_repo,
        ws_server.clone(),
    );

    println!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(ENV.frontend_url.as_str())
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(conversation_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(ws_server.as_ref().clone()))
            .service(health_check)
            .route("/ws", web::get().to(websocket_handler))
            .service(
                web::scope("/api")
                    .wrap(from_fn(authentication))
                    .configure(modules::conversation::route::configure)
                    .configure(modules::message::route::configure),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
