/// Connection registry actor. Owns which sessions exist, which user each
/// one belongs to and which conversations each user is subscribed to.
/// All of it is plain actor state; the rest of the system talks to it
/// exclusively through the events in `events.rs`.
use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::events::*;
use super::message::ServerMessage;
use super::session::WebSocketSession;

pub struct WebSocketServer {
    /// session_id -> session actor address
    sessions: HashMap<Uuid, Addr<WebSocketSession>>,

    /// user_id -> session set. One user can hold several sockets at once
    /// (phone + laptop), all of them get every push.
    users: HashMap<Uuid, HashSet<Uuid>>,

    /// conversation_id -> subscribed user set
    rooms: HashMap<Uuid, HashSet<Uuid>>,
}

impl WebSocketServer {
    pub fn new() -> Self {
        Self { sessions: HashMap::new(), users: HashMap::new(), rooms: HashMap::new() }
    }

    fn send_to_session(&self, session_id: &Uuid, message: ServerMessage) {
        if let Some(session_addr) = self.sessions.get(session_id) {
            session_addr.do_send(message);
        }
    }

    fn send_to_user(&self, user_id: &Uuid, message: ServerMessage) {
        if let Some(session_ids) = self.users.get(user_id) {
            for session_id in session_ids {
                self.send_to_session(session_id, message.clone());
            }
        }
    }

    fn connect(&mut self, session_id: Uuid, addr: Addr<WebSocketSession>) {
        self.sessions.insert(session_id, addr);
    }

    fn disconnect(&mut self, session_id: Uuid) {
        self.sessions.remove(&session_id);

        // Find the user this session belonged to, if it had authenticated.
        let mut emptied_user: Option<Uuid> = None;
        for (&user_id, sessions) in self.users.iter_mut() {
            if sessions.remove(&session_id) {
                if sessions.is_empty() {
                    emptied_user = Some(user_id);
                }
                break;
            }
        }

        // Last socket gone: drop the user and every room subscription.
        if let Some(user_id) = emptied_user {
            self.users.remove(&user_id);
            for room_users in self.rooms.values_mut() {
                room_users.remove(&user_id);
            }
            self.rooms.retain(|_, users| !users.is_empty());

            tracing::info!("User {} has no remaining sessions, unsubscribed everywhere", user_id);
        }
    }

    /// Returns how many sessions the user now holds.
    fn authenticate(&mut self, session_id: Uuid, user_id: Uuid) -> usize {
        let sessions = self.users.entry(user_id).or_default();
        sessions.insert(session_id);
        sessions.len()
    }

    fn join_room(&mut self, user_id: Uuid, conversation_id: Uuid) {
        self.rooms.entry(conversation_id).or_default().insert(user_id);
    }

    fn leave_room(&mut self, user_id: Uuid, conversation_id: Uuid) {
        if let Some(room) = self.rooms.get_mut(&conversation_id) {
            room.remove(&user_id);

            if room.is_empty() {
                self.rooms.remove(&conversation_id);
            }

            tracing::debug!("User {} unsubscribed from conversation {}", user_id, conversation_id);
        }
    }
}

impl Actor for WebSocketServer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server stopped");
    }
}

impl Handler<Connect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        tracing::debug!("Session connected: {}", msg.session_id);
        self.connect(msg.session_id, msg.addr);
    }
}

impl Handler<Disconnect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        tracing::debug!("Session disconnected: {}", msg.session_id);
        self.disconnect(msg.session_id);
    }
}

impl Handler<Authenticate> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Authenticate, _: &mut Context<Self>) {
        let active = self.authenticate(msg.session_id, msg.user_id);

        tracing::info!(
            "User {} authenticated on session {} ({} active session(s))",
            msg.user_id,
            msg.session_id,
            active
        );
    }
}

impl Handler<JoinRoom> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: JoinRoom, _: &mut Context<Self>) {
        self.join_room(msg.user_id, msg.conversation_id);

        tracing::debug!(
            "User {} subscribed to conversation {} ({} in room)",
            msg.user_id,
            msg.conversation_id,
            self.rooms.get(&msg.conversation_id).map_or(0, HashSet::len)
        );
    }
}

impl Handler<LeaveRoom> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: LeaveRoom, _: &mut Context<Self>) {
        self.leave_room(msg.user_id, msg.conversation_id);
    }
}

impl Handler<BroadcastToRoom> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: BroadcastToRoom, _: &mut Context<Self>) {
        let Some(room_users) = self.rooms.get(&msg.conversation_id) else {
            tracing::debug!("Broadcast to empty room {}, dropped", msg.conversation_id);
            return;
        };

        let mut sent = 0;
        for &user_id in room_users {
            if msg.skip_user_id == Some(user_id) {
                continue;
            }

            if let Some(session_ids) = self.users.get(&user_id) {
                for session_id in session_ids {
                    self.send_to_session(session_id, msg.message.clone());
                    sent += 1;
                }
            }
        }

        tracing::debug!("Broadcast to room {}: {} session(s)", msg.conversation_id, sent);
    }
}

impl Handler<SendToUser> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: SendToUser, _: &mut Context<Self>) {
        if self.users.contains_key(&msg.user_id) {
            self.send_to_user(&msg.user_id, msg.message);
        } else {
            // Push is best-effort, an offline user just misses it.
            tracing::debug!("User {} not connected, push dropped", msg.user_id);
        }
    }
}

/// Lets the server hand ServerMessage frames straight to session actors.
impl Message for ServerMessage {
    type Result = ();
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::rt::time::sleep;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn session_stub(
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
    async fn test_registry_lifecycle_across_connect_auth_disconnect() {
        // The anchor actor only exists so the stub sessions have a server
        // to report to; the registry under test is a plain value.
        let anchor = WebSocketServer::new().start();
        let (session_a, _rx_a) = session_stub(anchor.clone(), None);
        let (session_b, _rx_b) = session_stub(anchor, None);
        let addr_a = session_a.start();
        let addr_b = session_b.start();

        let mut registry = WebSocketServer::new();
        let (first, second) = (Uuid::now_v7(), Uuid::now_v7());
        let user_id = Uuid::now_v7();
        let conversation_id = Uuid::now_v7();

        registry.connect(first, addr_a);
        registry.connect(second, addr_b);
        registry.authenticate(first, user_id);
        registry.authenticate(second, user_id);
        registry.join_room(user_id, conversation_id);

        assert_eq!(registry.sessions.len(), 2);
        assert_eq!(registry.users.get(&user_id).map(HashSet::len), Some(2));
        assert!(registry.rooms.get(&conversation_id).is_some_and(|r| r.contains(&user_id)));

        // Phone goes away, laptop stays: the user must remain reachable.
        registry.disconnect(first);
        assert_eq!(registry.sessions.len(), 1);
        assert_eq!(registry.users.get(&user_id).map(HashSet::len), Some(1));
        assert!(registry.rooms.contains_key(&conversation_id));

        // Last socket gone: the user and every room subscription go too.
        registry.disconnect(second);
        assert!(registry.sessions.is_empty());
        assert!(registry.users.is_empty());
        assert!(registry.rooms.is_empty());
    }

    #[test]
    fn test_leave_room_drops_empty_rooms() {
        let mut registry = WebSocketServer::new();
        let user_id = Uuid::now_v7();
        let conversation_id = Uuid::now_v7();

        registry.join_room(user_id, conversation_id);
        assert_eq!(registry.rooms.len(), 1);

        registry.leave_room(user_id, conversation_id);
        assert!(registry.rooms.is_empty());
    }

    #[test]
    fn test_disconnect_of_unknown_session_is_harmless() {
        let mut registry = WebSocketServer::new();
        let user_id = Uuid::now_v7();

        registry.authenticate(Uuid::now_v7(), user_id);
        registry.disconnect(Uuid::now_v7());

        assert_eq!(registry.users.len(), 1);
    }

    #[actix_web::test]
    async fn test_broadcast_reaches_members_but_not_the_skipped_user() {
        let server = WebSocketServer::new().start();

        let sender = Uuid::now_v7();
        let recipient = Uuid::now_v7();
        let conversation_id = Uuid::now_v7();

        let (session_a, mut rx_a) = session_stub(server.clone(), Some(sender));
        let (session_b, mut rx_b) = session_stub(server.clone(), Some(recipient));
        let (first, second) = (session_a.id, session_b.id);
        let addr_a = session_a.start();
        let addr_b = session_b.start();

        server.send(Connect { session_id: first, addr: addr_a }).await.unwrap();
        server.send(Connect { session_id: second, addr: addr_b }).await.unwrap();
        server.send(Authenticate { session_id: first, user_id: sender }).await.unwrap();
        server.send(Authenticate { session_id: second, user_id: recipient }).await.unwrap();
        server.send(JoinRoom { user_id: sender, conversation_id }).await.unwrap();
        server.send(JoinRoom { user_id: recipient, conversation_id }).await.unwrap();

        server
            .send(BroadcastToRoom {
                conversation_id,
                message: ServerMessage::MessagesRead { conversation_id, user_id: sender },
                skip_user_id: Some(sender),
            })
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        let frame = rx_b.try_recv().expect("room member should receive the frame");
        assert!(frame.contains("messagesRead"));
        assert!(rx_a.try_recv().is_err());
    }
}
