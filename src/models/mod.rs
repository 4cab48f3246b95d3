/// Data models for the OmniOne chat client.
/// Defines Conversation, Message, and the real-time wire frames.

pub mod conversation;
pub mod frames;
pub mod message;

pub use conversation::{Conversation, ConversationDetail, MessagePage, Person};
pub use frames::{
    AckFrame, DeliveredFrame, InboundFrame, OutboundFrame, SendErrorFrame, SendPayload,
};
pub use message::{Message, MessageStatus};

use serde::{Deserialize, Serialize};

/// Role of the authenticated user; decides which identity lookup resolves the
/// chat counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Coach,
    Client,
}

/// The authenticated session owner.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_coach(&self) -> bool {
        self.role == Role::Coach
    }
}
