/// Wire protocol for the realtime channel. Everything is camelCase-tagged
/// JSON. Pushes are best-effort hints; the HTTP API stays the source of
/// truth for clients that miss one.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// In-band authentication with the platform JWT.
    #[serde(rename_all = "camelCase")]
    Auth { token: String },

    /// Subscribe to a conversation's events. Membership is verified first.
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },

    #[serde(rename_all = "camelCase")]
    TypingStart { conversation_id: Uuid },

    #[serde(rename_all = "camelCase")]
    TypingStop { conversation_id: Uuid },

    /// Application-level keepalive.
    Ping,
}

/// Frames pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    AuthFailed { reason: String },

    /// A new message landed in a conversation the user participates in.
    /// `message` carries the full hydrated DTO; `unread_count` is the
    /// recipient's fresh counter after the insert.
    #[serde(rename_all = "camelCase")]
    NewMessage { conversation_id: Uuid, message: serde_json::Value, unread_count: i32 },

    #[serde(rename_all = "camelCase")]
    MessageEdited { conversation_id: Uuid, message_id: Uuid, content: String },

    #[serde(rename_all = "camelCase")]
    MessageDeleted { conversation_id: Uuid, message_id: Uuid },

    /// The counterpart caught up on the conversation.
    #[serde(rename_all = "camelCase")]
    MessagesRead { conversation_id: Uuid, user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    UserTyping { conversation_id: Uuid, user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    UserStoppedTyping { conversation_id: Uuid, user_id: Uuid },

    Pong,

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // === ClientMessage deserialization ===

    #[test]
    fn test_client_auth_deserialize() {
        let json = r#"{"type":"auth","token":"some-jwt"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { token } if token == "some-jwt"));
    }

    #[test]
    fn test_client_join_conversation_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"joinConversation","conversationId":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(msg, ClientMessage::JoinConversation { conversation_id } if conversation_id == id)
        );
    }

    #[test]
    fn test_client_leave_conversation_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"leaveConversation","conversationId":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(msg, ClientMessage::LeaveConversation { conversation_id } if conversation_id == id)
        );
    }

    #[test]
    fn test_client_typing_deserialize() {
        let id = Uuid::now_v7();

        let json = format!(r#"{{"type":"typingStart","conversationId":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(msg, ClientMessage::TypingStart { conversation_id } if conversation_id == id)
        );

        let json = format!(r#"{{"type":"typingStop","conversationId":"{}"}}"#, id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(msg, ClientMessage::TypingStop { conversation_id } if conversation_id == id)
        );
    }

    #[test]
    fn test_client_ping_deserialize() {
        let json = r#"{"type":"ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_unknown_type_returns_error() {
        let json = r#"{"type":"sendMessage","conversationId":"550e8400-e29b-41d4-a716-446655440000","content":"hi"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_missing_required_field_returns_error() {
        let json = r#"{"type":"joinConversation"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_snake_case_field_rejected() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"joinConversation","conversation_id":"{}"}}"#, id);
        assert!(serde_json::from_str::<ClientMessage>(&json).is_err());
    }

    // === ServerMessage serialization ===

    #[test]
    fn test_server_auth_success_serialize() {
        let uid = Uuid::now_v7();
        let msg = ServerMessage::AuthSuccess { user_id: uid };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"authSuccess\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains(&uid.to_string()));
    }

    #[test]
    fn test_server_auth_failed_serialize() {
        let msg = ServerMessage::AuthFailed { reason: "Token expired".to_string() };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"authFailed\""));
        assert!(json.contains("Token expired"));
    }

    #[test]
    fn test_server_new_message_serialize() {
        let conv_id = Uuid::now_v7();
        let msg = ServerMessage::NewMessage {
            conversation_id: conv_id,
            message: serde_json::json!({"content": "Hello"}),
            unread_count: 4,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"newMessage\""));
        assert!(json.contains("\"content\":\"Hello\""));
        assert!(json.contains("\"unreadCount\":4"));
    }

    #[test]
    fn test_server_message_edited_serialize() {
        let msg = ServerMessage::MessageEdited {
            conversation_id: Uuid::now_v7(),
            message_id: Uuid::now_v7(),
            content: "fixed".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"messageEdited\""));
        assert!(json.contains("\"messageId\""));
    }

    #[test]
    fn test_server_messages_read_serialize() {
        let msg = ServerMessage::MessagesRead {
            conversation_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"messagesRead\""));
        assert!(json.contains("\"conversationId\""));
    }

    #[test]
    fn test_server_pong_serialize() {
        let msg = ServerMessage::Pong;
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_server_error_serialize() {
        let msg = ServerMessage::Error { message: "Something broke".to_string() };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("Something broke"));
    }

    // === Roundtrips ===

    #[test]
    fn test_client_message_roundtrip() {
        let id = Uuid::now_v7();
        let original = ClientMessage::TypingStart { conversation_id: id };
        let json = serde_json::to_string(&original).unwrap();
        let deserialized: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(deserialized, ClientMessage::TypingStart { conversation_id } if conversation_id == id)
        );
    }

    #[test]
    fn test_server_message_roundtrip() {
        let uid = Uuid::now_v7();
        let original = ServerMessage::AuthSuccess { user_id: uid };
        let json = serde_json::to_string(&original).unwrap();
        let deserialized: ServerMessage = serde_json::from_str(&json).unwrap();
        match deserialized {
            ServerMessage::AuthSuccess { user_id } => assert_eq!(user_id, uid),
            _ => panic!("Roundtrip failed"),
        }
    }
}
