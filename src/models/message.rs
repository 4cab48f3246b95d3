/// Message model for the chat dock.
/// Represents one entry in a two-party conversation thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery status of a message as seen by this client.
///
/// Locally created messages move `Sending -> {Sent, Failed}` while connected,
/// or `Pending -> Sending -> {Sent, Failed}` across a reconnect. Messages
/// fetched from the server are always `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Pending,
    Sent,
    Failed,
}

impl Default for MessageStatus {
    fn default() -> Self {
        MessageStatus::Sent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id. For an optimistic message this temporarily holds
    /// the client message id until the ack adopts the real one.
    pub message_id: String,
    /// Client-generated idempotency key, stable across retries. Absent on
    /// purely historical messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    #[serde(default)]
    pub sender_id: String,
    /// Authoritative ordering key within a conversation.
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub error_message: String,
}

impl Message {
    /// Create an optimistic local message ahead of server confirmation.
    pub fn optimistic(sender_id: String, content: String, connected: bool) -> Self {
        let client_message_id = Uuid::new_v4().to_string();
        Message {
            message_id: client_message_id.clone(),
            client_message_id: Some(client_message_id),
            sender_id,
            sent_at: Utc::now(),
            content,
            status: if connected {
                MessageStatus::Sending
            } else {
                MessageStatus::Pending
            },
            error_message: String::new(),
        }
    }

    /// De-duplication key: the client message id when present, otherwise the
    /// server id. A locally sent message and its server echo share the former.
    pub fn merge_key(&self) -> &str {
        self.client_message_id
            .as_deref()
            .unwrap_or(&self.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_message_status_tracks_connection() {
        let online = Message::optimistic("u1".to_string(), "hi".to_string(), true);
        let offline = Message::optimistic("u1".to_string(), "hi".to_string(), false);

        assert_eq!(online.status, MessageStatus::Sending);
        assert_eq!(offline.status, MessageStatus::Pending);
    }

    #[test]
    fn test_optimistic_message_ids_match() {
        let msg = Message::optimistic("u1".to_string(), "hi".to_string(), true);
        assert_eq!(Some(msg.message_id.as_str()), msg.client_message_id.as_deref());
    }

    #[test]
    fn test_merge_key_prefers_client_id() {
        let mut msg = Message::optimistic("u1".to_string(), "hi".to_string(), true);
        msg.message_id = "server-1".to_string();
        assert_ne!(msg.merge_key(), "server-1");

        msg.client_message_id = None;
        assert_eq!(msg.merge_key(), "server-1");
    }

    #[test]
    fn test_historical_message_deserializes_as_sent() {
        let json = r#"{
            "messageId": "m1",
            "senderId": "u2",
            "sentAt": "2026-03-01T10:00:00Z",
            "content": "hello"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.client_message_id.is_none());
        assert!(msg.error_message.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let msg = Message::optimistic("u1".to_string(), "hi".to_string(), false);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
    }
}
