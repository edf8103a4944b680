/// Best-effort realtime push over WebSocket:
///
/// - wire protocol (ClientMessage & ServerMessage)
/// - server actor (connection registry and rooms)
/// - session actor (one per socket)
/// - HTTP upgrade handler and message pump
pub mod events;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;
