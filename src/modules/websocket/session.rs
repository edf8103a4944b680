/// Per-connection actor. Holds the auth state and the set of rooms this
/// socket joined, and forwards frames to the client through the mpsc
/// bridge owned by `handler.rs`.
///
/// DB work (the join membership check) runs via `ctx.spawn()` +
/// `into_actor()` so the actor mailbox stays responsive.
use actix::prelude::*;
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::conversation::repository_pg::{
    ConversationRepositoryPg, ParticipantRepositoryPg,
};
use crate::modules::conversation::service::ConversationService;
use crate::modules::course::repository_pg::CourseRepositoryPg;
use crate::modules::message::repository_pg::MessageRepositoryPg;
use crate::modules::user::repository_pg::UserRepositoryPg;
use crate::utils::Claims;
use crate::ENV;

use super::events::*;
use super::message::{ClientMessage, ServerMessage};
use super::server::WebSocketServer;

/// ConversationService with the concrete Postgres repositories.
pub type ConversationSvc = ConversationService<
    ConversationRepositoryPg,
    ParticipantRepositoryPg,
    MessageRepositoryPg,
    CourseRepositoryPg,
    UserRepositoryPg,
>;

pub struct WebSocketSession {
    pub id: Uuid,

    /// Set once the client has authenticated in-band.
    pub user_id: Option<Uuid>,

    pub server: Addr<WebSocketServer>,

    /// Outbound JSON frames to the client, drained by handler.rs.
    pub tx: mpsc::UnboundedSender<String>,

    /// Used for the membership check on join (None in actor unit tests).
    pub conversation_service: Option<actix_web::web::Data<ConversationSvc>>,

    /// Rooms this socket joined; typing events are gated on it.
    pub joined: HashSet<Uuid>,
}

impl WebSocketSession {
    pub fn new(
        server: Addr<WebSocketServer>,
        tx: mpsc::UnboundedSender<String>,
        conversation_service: actix_web::web::Data<ConversationSvc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            server,
            tx,
            conversation_service: Some(conversation_service),
            joined: HashSet::new(),
        }
    }

    fn send_to_client(&self, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = self.tx.send(json) {
                    tracing::error!("Failed to queue frame for session {}: {}", self.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize frame for session {}: {}", self.id, e);
            }
        }
    }

    fn send_error(&self, message: &str) {
        self.send_to_client(&ServerMessage::Error { message: message.to_string() });
    }

    fn require_auth(&self) -> Option<Uuid> {
        if self.user_id.is_none() {
            self.send_error("Authenticate before using this connection");
            tracing::warn!("Session {} rejected, not authenticated", self.id);
        }
        self.user_id
    }

    fn handle_client_message(&mut self, msg: &ClientMessage, ctx: &mut Context<Self>) {
        match msg {
            ClientMessage::Auth { token } => self.handle_auth(token),
            ClientMessage::JoinConversation { conversation_id } => {
                self.handle_join(*conversation_id, ctx);
            }
            ClientMessage::LeaveConversation { conversation_id } => {
                self.handle_leave(*conversation_id);
            }
            ClientMessage::TypingStart { conversation_id } => {
                self.handle_typing(*conversation_id, true);
            }
            ClientMessage::TypingStop { conversation_id } => {
                self.handle_typing(*conversation_id, false);
            }
            ClientMessage::Ping => self.send_to_client(&ServerMessage::Pong),
        }
    }

    fn handle_auth(&mut self, token: &str) {
        if self.user_id.is_some() {
            self.send_error("Session is already authenticated");
            return;
        }

        let claims = match Claims::decode(token, ENV.jwt_secret.as_ref()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("JWT verification failed on session {}: {}", self.id, e);
                self.send_to_client(&ServerMessage::AuthFailed {
                    reason: "Token invalid or expired".to_string(),
                });
                return;
            }
        };

        let user_id = claims.sub;
        self.user_id = Some(user_id);

        self.server.do_send(Authenticate { session_id: self.id, user_id });
        self.send_to_client(&ServerMessage::AuthSuccess { user_id });

        tracing::info!("User {} authenticated on session {}", user_id, self.id);
    }

    /// Joining needs a DB round-trip: only participants may subscribe to
    /// a conversation's events.
    fn handle_join(&mut self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        let Some(service) = self.conversation_service.clone() else {
            self.send_error("Conversation service unavailable");
            return;
        };

        let fut = async move { service.is_participant(conversation_id, user_id).await };

        ctx.spawn(fut.into_actor(self).map(move |result, act, _ctx| match result {
            Ok(true) => {
                act.joined.insert(conversation_id);
                act.server.do_send(JoinRoom { user_id, conversation_id });
                tracing::debug!("User {} joined conversation {}", user_id, conversation_id);
            }
            Ok(false) => {
                act.send_error("You are not a participant of this conversation");
            }
            Err(e) => {
                tracing::error!(
                    "Membership check failed (session {}, conversation {}): {}",
                    act.id,
                    conversation_id,
                    e
                );
                act.send_error("Could not join conversation");
            }
        }));
    }

    fn handle_leave(&mut self, conversation_id: Uuid) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        self.joined.remove(&conversation_id);
        self.server.do_send(LeaveRoom { user_id, conversation_id });
    }

    fn handle_typing(&self, conversation_id: Uuid, started: bool) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        if !self.joined.contains(&conversation_id) {
            self.send_error("Join the conversation before sending typing events");
            return;
        }

        let message = if started {
            ServerMessage::UserTyping { conversation_id, user_id }
        } else {
            ServerMessage::UserStoppedTyping { conversation_id, user_id }
        };

        self.server.do_send(BroadcastToRoom {
            conversation_id,
            message,
            skip_user_id: Some(user_id),
        });
    }
}

impl Actor for WebSocketSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session started: {}", self.id);
        self.server.do_send(Connect { session_id: self.id, addr: ctx.address() });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session stopped: {}", self.id);
        self.server.do_send(Disconnect { session_id: self.id });
    }
}

impl Message for ClientMessage {
    type Result = ();
}

/// Sent by the upgrade handler once the socket pump ends. Stopping the
/// actor runs `stopped()`, which deregisters the session; without it the
/// registry's stored `Addr` would keep a dead session alive forever.
#[derive(Message)]
#[rtype(result = "()")]
pub struct TransportClosed;

impl Handler<TransportClosed> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, _msg: TransportClosed, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}

/// Inbound frames, parsed by handler.rs.
impl Handler<ClientMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        self.handle_client_message(&msg, ctx);
    }
}

/// Outbound frames from the server actor.
impl Handler<ServerMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, _ctx: &mut Context<Self>) {
        self.send_to_client(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::rt::time::sleep;
    use std::time::Duration;

    fn new_session(
        server: Addr<WebSocketServer>,
        user_id: Option<Uuid>,
    ) -> (WebSocketSession, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = WebSocketSession {
            id: Uuid::now_v7(),
            user_id,
            server,
            tx,
            conversation_service: None,
            joined: HashSet::new(),
        };
        (session, rx)
    }

    #[actix_web::test]
    async fn test_transport_end_unregisters_the_session() {
        let server = WebSocketServer::new().start();
        let user_id = Uuid::now_v7();
        let conversation_id = Uuid::now_v7();

        let (session, mut rx) = new_session(server.clone(), Some(user_id));
        let session_id = session.id;
        let addr = session.start();

        server.send(Connect { session_id, addr: addr.clone() }).await.unwrap();
        server.send(Authenticate { session_id, user_id }).await.unwrap();
        server.send(JoinRoom { user_id, conversation_id }).await.unwrap();

        // The socket pump finished; the actor must stop and deregister.
        addr.do_send(TransportClosed);
        sleep(Duration::from_millis(100)).await;

        assert!(!addr.connected());

        // The registry must no longer route frames at this session.
        server
            .send(BroadcastToRoom {
                conversation_id,
                message: ServerMessage::Pong,
                skip_user_id: None,
            })
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        assert!(rx.try_recv().is_err());
    }

    #[actix_web::test]
    async fn test_typing_requires_a_joined_room() {
        let server = WebSocketServer::new().start();
        let (session, mut rx) = new_session(server, Some(Uuid::now_v7()));

        session.handle_typing(Uuid::now_v7(), true);

        let frame = rx.try_recv().expect("a rejection frame");
        assert!(frame.contains("Join the conversation before sending typing events"));
    }

    #[actix_web::test]
    async fn test_unauthenticated_frames_are_rejected() {
        let server = WebSocketServer::new().start();
        let (mut session, mut rx) = new_session(server, None);

        session.handle_leave(Uuid::now_v7());

        let frame = rx.try_recv().expect("a rejection frame");
        assert!(frame.contains("Authenticate before using this connection"));
    }
}
