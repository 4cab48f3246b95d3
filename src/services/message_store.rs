/// Message store: per-conversation ordered message vectors.
/// All mutations go through the keyed merge so ordering and de-duplication
/// hold for every interleaving of live deliveries and historical page loads.

use std::collections::{HashMap, HashSet};

use crate::models::Message;

pub struct MessageStore {
    conversations: HashMap<String, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        MessageStore {
            conversations: HashMap::new(),
        }
    }

    /// Merge `incoming` into `existing`. Entries are keyed by client message
    /// id when present, else server message id; existing entries win on
    /// conflict so a historical copy never clobbers a locally reconciled
    /// status. The result is sorted ascending by `sentAt`.
    pub fn merge(incoming: &[Message], existing: &[Message]) -> Vec<Message> {
        let mut seen: HashSet<String> = existing
            .iter()
            .map(|message| message.merge_key().to_string())
            .collect();

        let mut merged: Vec<Message> = existing.to_vec();
        for message in incoming {
            if seen.insert(message.merge_key().to_string()) {
                merged.push(message.clone());
            }
        }
        merged.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        merged
    }

    /// Merge `incoming` into the conversation's vector, replacing it
    /// wholesale. Used for live deliveries, optimistic sends, and older-page
    /// prepends alike.
    pub fn merge_into(&mut self, conversation_id: &str, incoming: &[Message]) {
        let existing = self
            .conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let merged = Self::merge(incoming, existing);
        self.conversations
            .insert(conversation_id.to_string(), merged);
    }

    /// Replace a conversation's messages with a freshly fetched first page.
    pub fn replace(&mut self, conversation_id: &str, messages: Vec<Message>) {
        let ordered = Self::merge(&messages, &[]);
        self.conversations
            .insert(conversation_id.to_string(), ordered);
    }

    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    /// Apply `update` to the message matching `client_message_id`, if loaded.
    /// Reconciliation of acks and send errors is keyed on the client id, never
    /// the server id, which does not exist at creation time.
    pub fn update_by_client_id<F>(
        &mut self,
        conversation_id: &str,
        client_message_id: &str,
        update: F,
    ) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let Some(messages) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        for message in messages.iter_mut() {
            if message.client_message_id.as_deref() == Some(client_message_id) {
                update(message);
                messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
