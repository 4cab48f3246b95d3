/// Chat dock orchestrator.
/// Session-scoped context constructed at login and torn down at logout. Owns
/// the message store, pagination cursors, unread tracking, and viewport
/// state, and applies the connection manager's event stream to them.

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    AckFrame, Conversation, CurrentUser, DeliveredFrame, Message, MessageStatus, OutboundFrame,
    Person, SendPayload,
};
use crate::services::connection::{ChatEvent, ConnectionManager, PendingRef};
use crate::services::message_store::MessageStore;
use crate::services::pagination::PaginationManager;
use crate::services::server_client::ServerClient;
use crate::services::unread::UnreadTracker;
use crate::services::viewport::ViewportCoordinator;
use crate::storage::{DockSession, SessionStore};

pub const PAGE_SIZE: usize = 25;

pub struct ChatDock {
    user: CurrentUser,
    server: Arc<ServerClient>,
    connection: Arc<ConnectionManager>,
    session: SessionStore,
    store: MessageStore,
    paging: PaginationManager,
    unread: UnreadTracker,
    viewport: ViewportCoordinator,
    conversations: Vec<Conversation>,
    open: bool,
    /// Narrow layout shows either the list or the thread, not both; the
    /// thread is only "visible" for read receipts when the list is not
    /// covering it.
    narrow: bool,
    show_list: bool,
    active_conversation_id: Option<String>,
    active_target_id: Option<String>,
    active_target_name: String,
    chat_error: Option<String>,
    message_error: Option<String>,
    refresh_in_flight: bool,
}

impl ChatDock {
    pub fn new(
        user: CurrentUser,
        server: Arc<ServerClient>,
        connection: Arc<ConnectionManager>,
        session: SessionStore,
    ) -> Self {
        // Restore the persisted dock selection; it is advisory only.
        let restored = session.load_dock_state().unwrap_or_else(|e| {
            warn!("Failed to load dock session state: {}", e);
            None
        });
        let (open, active_conversation_id, active_target_id, active_target_name) = match restored {
            Some(state) => (
                state.open,
                state.active_conversation_id,
                state.active_target_id,
                state.active_target_name,
            ),
            None => (false, None, None, String::new()),
        };

        ChatDock {
            unread: UnreadTracker::new(user.id.clone()),
            user,
            server,
            connection,
            session,
            store: MessageStore::new(),
            paging: PaginationManager::new(),
            viewport: ViewportCoordinator::new(),
            conversations: Vec::new(),
            open,
            narrow: false,
            show_list: true,
            active_conversation_id,
            active_target_id,
            active_target_name,
            chat_error: None,
            message_error: None,
            refresh_in_flight: false,
        }
    }

    // ---- event stream ----

    /// Apply one connection event to local state. Failures inside this path
    /// become status flags and error strings, never propagated errors.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Connected => {
                // Resynchronize state that may have changed while offline.
                self.refresh_conversations().await;
            }
            ChatEvent::Disconnected => {
                debug!("connection lost; pending sends will be replayed");
            }
            ChatEvent::SendsMarkedPending(refs) => {
                self.apply_send_state(&refs, MessageStatus::Pending);
            }
            ChatEvent::SendsReplayed(refs) => {
                self.apply_send_state(&refs, MessageStatus::Sending);
            }
            ChatEvent::Acked(ack) => self.handle_ack(ack),
            ChatEvent::SendFailed {
                conversation_id,
                client_message_id,
                reason,
            } => {
                self.store
                    .update_by_client_id(&conversation_id, &client_message_id, |message| {
                        message.status = MessageStatus::Failed;
                        message.error_message = reason.clone();
                    });
            }
            ChatEvent::Delivered(frame) => self.handle_delivered(frame).await,
        }
    }

    fn apply_send_state(&mut self, refs: &[PendingRef], status: MessageStatus) {
        for entry in refs {
            self.store.update_by_client_id(
                &entry.conversation_id,
                &entry.client_message_id,
                |message| {
                    message.status = status;
                    message.error_message.clear();
                },
            );
        }
    }

    fn handle_ack(&mut self, ack: AckFrame) {
        self.store
            .update_by_client_id(&ack.conversation_id, &ack.client_message_id, |message| {
                if let Some(message_id) = &ack.message_id {
                    message.message_id = message_id.clone();
                }
                if let Some(sent_at) = ack.sent_at {
                    message.sent_at = sent_at;
                }
                message.status = MessageStatus::Sent;
                message.error_message.clear();
            });

        if let Some(chat) = self
            .conversations
            .iter_mut()
            .find(|chat| chat.conversation_id == ack.conversation_id)
        {
            if let Some(sent_at) = ack.sent_at {
                chat.last_message_at = Some(sent_at);
                chat.last_read_at = Some(sent_at);
            }
            chat.last_message_sender_id = Some(self.user.id.clone());
        }
    }

    async fn handle_delivered(&mut self, frame: DeliveredFrame) {
        let conversation_id = frame.conversation_id.clone();
        let is_active = self.active_conversation_id.as_deref() == Some(conversation_id.as_str());
        let is_self = frame.sender_id.as_deref() == Some(self.user.id.as_str());
        let known = self
            .conversations
            .iter()
            .any(|chat| chat.conversation_id == conversation_id);
        if !known {
            self.refresh_conversations().await;
        }

        let at_bottom = self.viewport.is_at_bottom();
        let read_here = is_active && self.open && at_bottom;
        let sent_at = frame.sent_at;
        let preview = frame.content.clone();
        let sender_id = frame.sender_id.clone();

        // Merge only into loaded conversations; others are fetched on open.
        if is_active || self.store.contains(&conversation_id) {
            let message = frame.into_message();
            self.store.merge_into(&conversation_id, &[message]);
        }

        if is_active {
            if self.open && at_bottom {
                self.viewport.request_scroll_to_bottom();
            } else if !is_self {
                self.viewport.show_new_messages_indicator();
            }
        }

        if let Some(chat) = self
            .conversations
            .iter_mut()
            .find(|chat| chat.conversation_id == conversation_id)
        {
            chat.last_message_at = Some(sent_at);
            chat.last_message_preview = Some(preview);
            if sender_id.is_some() {
                chat.last_message_sender_id = sender_id;
            }
            if read_here {
                chat.last_read_at = Some(sent_at);
            }
        }

        if is_self || read_here {
            self.unread.remove(&conversation_id);
        } else {
            self.unread.insert(&conversation_id);
        }

        if read_here {
            self.send_read_receipt(conversation_id).await;
        }
    }

    // ---- conversation list ----

    /// Refresh the conversation list from the server. Single-flight; errors
    /// are swallowed (the stale list stays).
    pub async fn refresh_conversations(&mut self) {
        if self.refresh_in_flight {
            return;
        }
        self.refresh_in_flight = true;
        match self.server.list_conversations().await {
            Ok(list) => {
                self.conversations = list;
                self.unread.recompute(&self.conversations);
                self.backfill_active_target();
                self.chat_error = None;
            }
            Err(e) => {
                debug!("conversation list refresh failed: {}", e);
            }
        }
        self.refresh_in_flight = false;
    }

    /// Restore the counterpart's name after a session restore, once a fresh
    /// list is available.
    fn backfill_active_target(&mut self) {
        if self.active_target_name.is_empty() {
            if let Some(active_id) = self.active_conversation_id.as_deref() {
                if let Some(chat) = self
                    .conversations
                    .iter()
                    .find(|chat| chat.conversation_id == active_id)
                {
                    self.active_target_id = Some(chat.other_user_id.clone());
                    self.active_target_name = chat.other_name();
                }
            }
        }
    }

    /// Conversation list sorted by recency for display.
    pub fn sorted_conversations(&self) -> Vec<&Conversation> {
        let mut chats: Vec<&Conversation> = self.conversations.iter().collect();
        chats.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        chats
    }

    // ---- selection / start chat ----

    pub async fn select_conversation(&mut self, conversation_id: &str) {
        let Some(chat) = self
            .conversations
            .iter()
            .find(|chat| chat.conversation_id == conversation_id)
            .cloned()
        else {
            return;
        };

        self.active_conversation_id = Some(chat.conversation_id.clone());
        self.active_target_id = Some(chat.other_user_id.clone());
        self.active_target_name = chat.other_name();
        if self.narrow {
            self.show_list = false;
        }
        self.message_error = None;
        self.viewport.reset_for_switch();
        self.paging.reset_flight();
        self.unread.remove(conversation_id);
        self.persist_session();

        self.load_active_conversation().await;
        self.send_read_receipt(conversation_id.to_string()).await;
    }

    /// Open the dock on a conversation with `target_id`, starting one
    /// server-side if none exists yet.
    pub async fn open_with_target(&mut self, target_id: &str, target_name: Option<&str>) {
        if target_id.is_empty() {
            return;
        }
        self.open = true;
        self.chat_error = None;

        if let Some(existing) = self
            .conversations
            .iter()
            .find(|chat| chat.other_user_id == target_id)
            .map(|chat| chat.conversation_id.clone())
        {
            self.select_conversation(&existing).await;
            if let Some(name) = target_name {
                self.active_target_name = name.to_string();
                self.persist_session();
            }
            return;
        }

        match self.server.start_conversation(target_id).await {
            Ok(chat) => {
                let conversation_id = chat.conversation_id.clone();
                self.refresh_conversations().await;
                self.active_conversation_id = Some(conversation_id);
                self.active_target_id = Some(target_id.to_string());
                self.active_target_name = match target_name {
                    Some(name) => name.to_string(),
                    None => self.resolve_target_name(target_id).await,
                };
                self.viewport.reset_for_switch();
                self.persist_session();
                self.load_active_conversation().await;
            }
            Err(e) => {
                self.chat_error = Some(format!("Failed to start chat: {}", e));
            }
        }
    }

    async fn resolve_target_name(&self, target_id: &str) -> String {
        let person = if self.user.is_coach() {
            self.server.get_client_of_coach(target_id).await
        } else {
            self.server.get_coach_of_client().await
        };
        match person {
            Ok(person) => person.full_name(),
            Err(e) => {
                debug!("counterpart lookup failed: {}", e);
                String::new()
            }
        }
    }

    /// Coach-only: clients without an existing conversation, for the
    /// start-chat menu.
    pub async fn start_chat_targets(&mut self) -> Result<Vec<Person>> {
        let clients = self.server.get_coach_clients().await?;
        let existing: Vec<&str> = self
            .conversations
            .iter()
            .map(|chat| chat.other_user_id.as_str())
            .collect();
        Ok(clients
            .into_iter()
            .filter(|person| !existing.contains(&person.id.as_str()))
            .collect())
    }

    // ---- message loading ----

    /// Load the active conversation's thread: from cache when present,
    /// otherwise the newest page from the server.
    pub async fn load_active_conversation(&mut self) {
        let Some(conversation_id) = self.active_conversation_id.clone() else {
            return;
        };
        self.message_error = None;

        if self.store.contains(&conversation_id) {
            self.paging.ensure_state(&conversation_id);
            self.viewport.request_scroll_to_bottom();
            return;
        }

        match self
            .server
            .get_message_page(&conversation_id, PAGE_SIZE, None)
            .await
        {
            Ok(page) => {
                self.store.replace(&conversation_id, page.content);
                let cursor = self
                    .store
                    .messages(&conversation_id)
                    .first()
                    .map(|message| message.sent_at);
                self.paging.set_state(&conversation_id, cursor, !page.last);
                self.viewport.request_scroll_to_bottom();
            }
            Err(e) => {
                self.message_error = Some(format!("Failed to load messages: {}", e));
            }
        }
    }

    /// Load the next older page for the active conversation. Returns true if
    /// a request was actually issued (single-flight guard and cursor rules
    /// otherwise make this a no-op).
    pub async fn load_older(&mut self) -> bool {
        let Some(conversation_id) = self.active_conversation_id.clone() else {
            return false;
        };
        let Some(cursor) = self.paging.try_begin(&conversation_id) else {
            return false;
        };

        self.viewport.record_anchor();
        match self
            .server
            .get_message_page(&conversation_id, PAGE_SIZE, Some(cursor))
            .await
        {
            Ok(page) => {
                let incoming = MessageStore::merge(&page.content, &[]);
                let next_cursor = incoming.first().map(|message| message.sent_at);
                self.store.merge_into(&conversation_id, &incoming);
                self.paging
                    .complete(&conversation_id, next_cursor, !page.last);
                true
            }
            Err(e) => {
                self.paging.abort();
                self.viewport.clear_anchor();
                self.message_error = Some(format!("Failed to load older messages: {}", e));
                false
            }
        }
    }

    // ---- sending ----

    /// Optimistic send. Empty content or a missing recipient is a silent
    /// no-op; everything else appends exactly one local message that later
    /// reconciles by its client message id.
    pub async fn send(&mut self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let Some(target_id) = self.active_target_id.clone() else {
            return;
        };
        let Some(conversation_id) = self.active_conversation_id.clone() else {
            return;
        };

        let connected = self.connection.is_connected().await;
        let message = Message::optimistic(self.user.id.clone(), content.to_string(), connected);
        let payload = SendPayload {
            client_message_id: message.merge_key().to_string(),
            to: target_id,
            content: content.to_string(),
        };

        // Registered regardless of connection state so a reconnect replays it.
        self.connection
            .register_send(conversation_id.clone(), payload.clone())
            .await;
        if connected {
            if let Err(e) = self.connection.publish(&OutboundFrame::Send(payload)).await {
                warn!("publish failed; send stays pending: {}", e);
            }
        }

        let sent_at = message.sent_at;
        let preview = message.content.clone();
        self.store.merge_into(&conversation_id, &[message]);

        if let Some(chat) = self
            .conversations
            .iter_mut()
            .find(|chat| chat.conversation_id == conversation_id)
        {
            chat.last_message_at = Some(sent_at);
            chat.last_message_preview = Some(preview);
            chat.last_read_at = Some(sent_at);
            chat.last_message_sender_id = Some(self.user.id.clone());
        }

        // Own sends clear the unread flag immediately, no round-trip needed.
        self.unread.remove(&conversation_id);
        self.viewport.request_scroll_to_bottom();
        self.send_read_receipt(conversation_id).await;
    }

    // ---- read receipts ----

    /// Emit a read receipt for the conversation, throttled to once per
    /// second, and only while the thread is actually visible.
    pub async fn send_read_receipt(&mut self, conversation_id: String) {
        let thread_visible = self.open && (!self.narrow || !self.show_list);
        if !thread_visible {
            return;
        }
        let now = Utc::now();
        if !self.unread.should_send_receipt(&conversation_id, now) {
            return;
        }

        if let Err(e) = self
            .connection
            .publish(&OutboundFrame::Read {
                conversation_id: conversation_id.clone(),
            })
            .await
        {
            debug!("read receipt not sent: {}", e);
        }

        if let Some(chat) = self
            .conversations
            .iter_mut()
            .find(|chat| chat.conversation_id == conversation_id)
        {
            chat.last_read_at = Some(now);
            if let Err(e) = self.session.set_last_seen(&chat.other_user_id, now) {
                debug!("failed to persist last-seen: {}", e);
            }
        }
        self.unread.remove(&conversation_id);
    }

    // ---- viewport hooks ----

    /// Scroll event from the thread container.
    pub async fn on_thread_scroll(&mut self, scroll_top: f64, scroll_height: f64, client_height: f64) {
        let outcome = self
            .viewport
            .observe_scroll(scroll_top, scroll_height, client_height);
        if outcome.near_top {
            self.load_older().await;
        }
        if outcome.at_bottom {
            if let Some(conversation_id) = self.active_conversation_id.clone() {
                self.unread.remove(&conversation_id);
                self.send_read_receipt(conversation_id).await;
            }
        }
    }

    /// The presentation layer laid out merged content and reports the new
    /// geometry. Restores the scroll anchor after an older-page prepend, or
    /// applies a queued scroll-to-bottom. Returns the scroll top to apply,
    /// if any.
    pub fn on_content_rendered(&mut self, scroll_height: f64, client_height: f64) -> Option<f64> {
        self.viewport.observe_content(scroll_height, client_height);
        if let Some(top) = self.viewport.complete_prepend(scroll_height) {
            return Some(top);
        }
        self.viewport.apply_pending_scroll()
    }

    /// The "new messages" affordance was clicked: scroll down and clear
    /// unread for the active conversation.
    pub async fn dismiss_new_messages(&mut self) {
        self.viewport.dismiss_indicator();
        if let Some(conversation_id) = self.active_conversation_id.clone() {
            self.unread.remove(&conversation_id);
            self.send_read_receipt(conversation_id).await;
        }
    }

    // ---- dock state ----

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
        self.persist_session();
    }

    pub fn set_layout(&mut self, narrow: bool, show_list: bool) {
        self.narrow = narrow;
        self.show_list = show_list;
    }

    fn persist_session(&self) {
        let state = DockSession {
            open: self.open,
            active_conversation_id: self.active_conversation_id.clone(),
            active_target_id: self.active_target_id.clone(),
            active_target_name: self.active_target_name.clone(),
        };
        if let Err(e) = self.session.save_dock_state(&state) {
            warn!("Failed to persist dock session state: {}", e);
        }
    }

    /// Tear down at logout: local state and the persisted selection go away.
    pub fn reset(&mut self) {
        self.open = false;
        self.active_conversation_id = None;
        self.active_target_id = None;
        self.active_target_name.clear();
        self.conversations.clear();
        self.store.clear();
        self.unread.clear();
        if let Err(e) = self.session.clear_dock_state() {
            warn!("Failed to clear dock session state: {}", e);
        }
    }

    // ---- accessors ----

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active_target_name(&self) -> &str {
        &self.active_target_name
    }

    pub fn active_messages(&self) -> &[Message] {
        match self.active_conversation_id.as_deref() {
            Some(id) => self.store.messages(id),
            None => &[],
        }
    }

    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.store.messages(conversation_id)
    }

    pub fn unread_ids(&self) -> Vec<String> {
        self.unread.unread_ids()
    }

    pub fn is_unread(&self, conversation_id: &str) -> bool {
        self.unread.contains(conversation_id)
    }

    pub fn has_unread(&self) -> bool {
        self.unread.has_unread()
    }

    pub fn has_new_messages_indicator(&self) -> bool {
        self.viewport.has_new_messages_indicator()
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportCoordinator {
        &mut self.viewport
    }

    pub fn chat_error(&self) -> Option<&str> {
        self.chat_error.as_deref()
    }

    pub fn message_error(&self) -> Option<&str> {
        self.message_error.as_deref()
    }
}
