/// Conversation model for the chat dock.
/// A two-party thread plus the summary fields shown in the chat list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub other_user_id: String,
    #[serde(default)]
    pub other_first_name: String,
    #[serde(default)]
    pub other_last_name: String,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_sender_id: Option<String>,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn other_name(&self) -> String {
        format!("{} {}", self.other_first_name, self.other_last_name)
            .trim()
            .to_string()
    }
}

/// One page of historical messages, oldest page last.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub content: Vec<Message>,
    /// True when the server reports this as the final (oldest) page.
    #[serde(default)]
    pub last: bool,
}

/// Conversation detail used by the non-dock detail view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Chat counterpart returned by the identity lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_deserializes_sparse_payload() {
        let json = r#"{"conversationId": "c1", "otherUserId": "u2"}"#;
        let chat: Conversation = serde_json::from_str(json).unwrap();

        assert_eq!(chat.conversation_id, "c1");
        assert!(chat.last_message_at.is_none());
        assert!(chat.last_read_at.is_none());
        assert_eq!(chat.other_name(), "");
    }

    #[test]
    fn test_other_name_trims_missing_parts() {
        let json = r#"{"conversationId": "c1", "otherUserId": "u2", "otherFirstName": "Ada"}"#;
        let chat: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(chat.other_name(), "Ada");
    }

    #[test]
    fn test_message_page_defaults() {
        let page: MessagePage = serde_json::from_str("{}").unwrap();
        assert!(page.content.is_empty());
        assert!(!page.last);
    }

    #[test]
    fn test_conversation_detail_flattens_summary() {
        let json = r#"{
            "conversationId": "c1",
            "otherUserId": "u2",
            "messages": [
                {"messageId": "m1", "senderId": "u2", "sentAt": "2026-03-01T10:00:00Z", "content": "hi"}
            ]
        }"#;
        let detail: ConversationDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.conversation.conversation_id, "c1");
        assert_eq!(detail.messages.len(), 1);
    }
}
