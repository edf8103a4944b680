/// HTTP upgrade endpoint and the bidirectional pump:
/// - inbound:  client -> WebSocket -> parse ClientMessage -> session actor
/// - outbound: server actor -> session actor -> mpsc -> WebSocket -> client
use actix::Actor;
use actix::Addr;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use tokio::sync::mpsc;

use super::message::ClientMessage;
use super::server::WebSocketServer;
use super::session::{ConversationSvc, TransportClosed, WebSocketSession};

/// GET /ws
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<WebSocketServer>>,
    conversation_service: web::Data<ConversationSvc>,
) -> Result<HttpResponse, Error> {
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    // Session actor pushes JSON here; the spawned task drains it into the
    // socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let addr =
        WebSocketSession::new(server.get_ref().clone(), tx, conversation_service).start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let raw = text.to_string();

                            match serde_json::from_str::<ClientMessage>(&raw) {
                                Ok(client_msg) => addr.do_send(client_msg),
                                Err(e) => {
                                    tracing::warn!(
                                        "Unparseable client frame: {} - raw: {}",
                                        e,
                                        &raw[..100.min(raw.len())]
                                    );
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Failed to send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {}

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary frames are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Failed to write to WebSocket client");
                        break;
                    }
                }
            }
        }

        let _ = ws_session.close(None).await;
        // Stop the session actor; its stopped() hook deregisters it.
        addr.do_send(TransportClosed);
        tracing::debug!("WebSocket pump finished");
    });

    tracing::info!("WebSocket connection established");
    Ok(response)
}
