/// Unread and read-receipt tracking.
/// Derives the set of unread conversations from message timestamps and
/// throttles read-receipt emission to once per second per conversation.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::Conversation;

pub struct UnreadTracker {
    current_user_id: String,
    notified: HashSet<String>,
    last_receipt_at: HashMap<String, DateTime<Utc>>,
}

impl UnreadTracker {
    pub fn new(current_user_id: String) -> Self {
        UnreadTracker {
            current_user_id,
            notified: HashSet::new(),
            last_receipt_at: HashMap::new(),
        }
    }

    /// A conversation is unread when its last message exists, was not
    /// authored by the current user, and postdates `lastReadAt` (or no
    /// read marker exists at all).
    pub fn is_unread(&self, chat: &Conversation) -> bool {
        let Some(last_message_at) = chat.last_message_at else {
            return false;
        };
        if chat.last_message_sender_id.as_deref() == Some(self.current_user_id.as_str()) {
            return false;
        }
        match chat.last_read_at {
            None => true,
            Some(last_read_at) => last_message_at > last_read_at,
        }
    }

    /// Wholesale recompute from a freshly fetched conversation list. Uses the
    /// same predicate as the incremental path.
    pub fn recompute(&mut self, chats: &[Conversation]) {
        self.notified = chats
            .iter()
            .filter(|chat| self.is_unread(chat))
            .map(|chat| chat.conversation_id.clone())
            .collect();
    }

    pub fn insert(&mut self, conversation_id: &str) {
        self.notified.insert(conversation_id.to_string());
    }

    pub fn remove(&mut self, conversation_id: &str) {
        self.notified.remove(conversation_id);
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.notified.contains(conversation_id)
    }

    pub fn has_unread(&self) -> bool {
        !self.notified.is_empty()
    }

    pub fn unread_ids(&self) -> Vec<String> {
        self.notified.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.notified.clear();
        self.last_receipt_at.clear();
    }

    /// Local throttle for read-receipt emission: at most one per second per
    /// conversation. Records the emission time when it returns true.
    pub fn should_send_receipt(&mut self, conversation_id: &str, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_receipt_at.get(conversation_id) {
            if now - *last < Duration::seconds(1) {
                return false;
            }
        }
        self.last_receipt_at
            .insert(conversation_id.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chat(
        id: &str,
        last_message_at: Option<DateTime<Utc>>,
        sender: Option<&str>,
        last_read_at: Option<DateTime<Utc>>,
    ) -> Conversation {
        Conversation {
            conversation_id: id.to_string(),
            other_user_id: "u2".to_string(),
            other_first_name: String::new(),
            other_last_name: String::new(),
            last_message_at,
            last_message_preview: None,
            last_message_sender_id: sender.map(str::to_string),
            last_read_at,
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_unread_when_message_after_read_marker() {
        let tracker = UnreadTracker::new("me".to_string());
        let c = chat("c1", Some(at(10)), Some("u2"), Some(at(5)));
        assert!(tracker.is_unread(&c));
    }

    #[test]
    fn test_read_when_marker_at_or_after_message() {
        let tracker = UnreadTracker::new("me".to_string());
        let c = chat("c1", Some(at(10)), Some("u2"), Some(at(10)));
        assert!(!tracker.is_unread(&c));
    }

    #[test]
    fn test_unread_when_never_read() {
        let tracker = UnreadTracker::new("me".to_string());
        let c = chat("c1", Some(at(10)), Some("u2"), None);
        assert!(tracker.is_unread(&c));
    }

    #[test]
    fn test_own_messages_never_unread() {
        let tracker = UnreadTracker::new("me".to_string());
        let c = chat("c1", Some(at(10)), Some("me"), None);
        assert!(!tracker.is_unread(&c));
    }

    #[test]
    fn test_no_messages_never_unread() {
        let tracker = UnreadTracker::new("me".to_string());
        let c = chat("c1", None, None, None);
        assert!(!tracker.is_unread(&c));
    }

    #[test]
    fn test_recompute_and_incremental_agree() {
        let mut tracker = UnreadTracker::new("me".to_string());
        let chats = vec![
            chat("c1", Some(at(10)), Some("u2"), Some(at(5))),
            chat("c2", Some(at(10)), Some("me"), None),
            chat("c3", Some(at(10)), Some("u3"), Some(at(20))),
        ];
        tracker.recompute(&chats);

        assert!(tracker.contains("c1"));
        assert!(!tracker.contains("c2"));
        assert!(!tracker.contains("c3"));

        // Read marker moves past the last message: incremental removal.
        tracker.remove("c1");
        assert!(!tracker.has_unread());
    }

    #[test]
    fn test_receipt_throttle_once_per_second() {
        let mut tracker = UnreadTracker::new("me".to_string());
        let t0 = at(0);

        assert!(tracker.should_send_receipt("c1", t0));
        assert!(!tracker.should_send_receipt("c1", t0 + Duration::milliseconds(400)));
        assert!(tracker.should_send_receipt("c1", t0 + Duration::milliseconds(1200)));
    }

    #[test]
    fn test_receipt_throttle_is_per_conversation() {
        let mut tracker = UnreadTracker::new("me".to_string());
        let t0 = at(0);

        assert!(tracker.should_send_receipt("c1", t0));
        assert!(tracker.should_send_receipt("c2", t0));
    }
}
