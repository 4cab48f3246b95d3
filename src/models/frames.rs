/// Wire frames for the real-time chat connection.
/// Inbound frames are JSON discriminated by `type`; outbound publishes carry
/// an `action` field the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Message, MessageStatus};

/// Inbound frame from the server, discriminated by `type`.
/// Anything that fails to parse into one of these is dropped by the
/// connection manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Message(DeliveredFrame),
    Ack(AckFrame),
    Error(SendErrorFrame),
}

/// A message delivered to this user. `conversationId`, `messageId` and
/// `sentAt` are required for the frame to be accepted at all.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredFrame {
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default)]
    pub client_message_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
}

impl DeliveredFrame {
    /// Convert into a store entry. The server copy is authoritative, so the
    /// status is `Sent`; the client message id is carried through so the echo
    /// of a local send collapses onto the optimistic entry during merge.
    pub fn into_message(self) -> Message {
        Message {
            message_id: self.message_id,
            client_message_id: self.client_message_id,
            sender_id: self.sender_id.unwrap_or_default(),
            sent_at: self.sent_at,
            content: self.content,
            status: MessageStatus::Sent,
            error_message: String::new(),
        }
    }
}

/// Acknowledgement of a send previously published by this client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckFrame {
    pub client_message_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Server-side rejection of a send. `clientMessageId` may be absent, in which
/// case the most recently sent message is assumed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendErrorFrame {
    #[serde(default)]
    pub client_message_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field_errors: Option<HashMap<String, String>>,
}

impl SendErrorFrame {
    /// Human-readable reason for the message bubble.
    pub fn reason(&self) -> String {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return message.clone();
        }
        if let Some(errors) = &self.field_errors {
            if let Some(first) = errors.values().next() {
                return first.clone();
            }
        }
        "Message failed to send.".to_string()
    }
}

/// Payload for the `send` publish. Kept verbatim in the pending map so a
/// reconnect can replay it with the same `clientMessageId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    pub client_message_id: String,
    pub to: String,
    pub content: String,
}

/// Outbound publish, discriminated by `action`. Struct-variant fields need
/// their own camelCase rename; `rename_all` covers only the variant names.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum OutboundFrame {
    Send(SendPayload),
    Read { conversation_id: String },
}
