//! End-to-end tests of the dock's event-driven reconciliation.
//!
//! These run fully offline: the connection manager is never started, frames
//! are injected through its frame handler, and the resulting events are
//! drained into the dock exactly as the session loop would.

use std::sync::Arc;

use tokio::sync::mpsc;

use omnione_chat_client::models::{CurrentUser, MessageStatus, Role};
use omnione_chat_client::services::{ChatEvent, ConnectionManager};
use omnione_chat_client::storage::DockSession;
use omnione_chat_client::{ChatDock, ServerClient, SessionStore};

const USER_ID: &str = "u1";
const PEER_ID: &str = "u2";
const CONVERSATION_ID: &str = "c1";

fn dock_with_events() -> (
    ChatDock,
    Arc<ConnectionManager>,
    mpsc::UnboundedReceiver<ChatEvent>,
) {
    // A session restore puts an active conversation in place without any
    // server round-trip.
    let session = SessionStore::in_memory().unwrap();
    session
        .save_dock_state(&DockSession {
            open: true,
            active_conversation_id: Some(CONVERSATION_ID.to_string()),
            active_target_id: Some(PEER_ID.to_string()),
            active_target_name: "Ada Lovelace".to_string(),
        })
        .unwrap();

    let user = CurrentUser {
        id: USER_ID.to_string(),
        role: Role::Client,
    };
    // Port 1 refuses connections immediately; list refreshes fail fast and
    // are swallowed by the dock.
    let server = Arc::new(ServerClient::new(
        "http://127.0.0.1:1".to_string(),
        "token".to_string(),
    ));
    let (connection, events) =
        ConnectionManager::new("ws://127.0.0.1:1/ws".to_string(), "token".to_string());

    let dock = ChatDock::new(user, server, connection.clone(), session);
    (dock, connection, events)
}

async fn drain_events(dock: &mut ChatDock, events: &mut mpsc::UnboundedReceiver<ChatEvent>) {
    while let Ok(event) = events.try_recv() {
        dock.handle_event(event).await;
    }
}

#[tokio::test]
async fn offline_send_is_pending_and_ack_reconciles_it() {
    let (mut dock, connection, mut events) = dock_with_events();
    assert_eq!(dock.active_conversation_id(), Some(CONVERSATION_ID));

    dock.send("hello there").await;

    let messages = dock.active_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Pending);
    assert_eq!(messages[0].content, "hello there");
    let client_message_id = messages[0].merge_key().to_string();

    // The send is registered for replay even though nothing went out.
    assert_eq!(connection.pending_count().await, 1);

    // Server ack arrives after a reconnect replays the send.
    let ack = format!(
        r#"{{"type":"ack","clientMessageId":"{}","conversationId":"{}","messageId":"m42","sentAt":"2026-03-01T10:00:00Z"}}"#,
        client_message_id, CONVERSATION_ID
    );
    connection.handle_frame(&ack).await;
    drain_events(&mut dock, &mut events).await;

    let messages = dock.active_messages();
    assert_eq!(messages.len(), 1, "ack must reconcile, not duplicate");
    assert_eq!(messages[0].status, MessageStatus::Sent);
    assert_eq!(messages[0].message_id, "m42");
    assert_eq!(
        messages[0].client_message_id.as_deref(),
        Some(client_message_id.as_str())
    );
    assert_eq!(connection.pending_count().await, 0);
}

#[tokio::test]
async fn delivered_echo_of_own_send_does_not_duplicate() {
    let (mut dock, connection, mut events) = dock_with_events();

    dock.send("ping").await;
    let client_message_id = dock.active_messages()[0].merge_key().to_string();

    // The broadcast copy of the same message, carrying the client id.
    let echo = format!(
        r#"{{"type":"message","conversationId":"{}","messageId":"m7","clientMessageId":"{}","senderId":"{}","sentAt":"2026-03-01T10:00:00Z","content":"ping"}}"#,
        CONVERSATION_ID, client_message_id, USER_ID
    );
    connection.handle_frame(&echo).await;
    drain_events(&mut dock, &mut events).await;

    let messages = dock.active_messages();
    assert_eq!(messages.len(), 1);
    // The local copy wins; the ack, not the echo, flips the status.
    assert_eq!(messages[0].status, MessageStatus::Pending);
    assert!(!dock.is_unread(CONVERSATION_ID));
}

#[tokio::test]
async fn send_error_marks_message_failed_with_reason() {
    let (mut dock, connection, mut events) = dock_with_events();

    dock.send("way too long").await;

    // Error frame without a clientMessageId: correlated via the last send.
    connection
        .handle_frame(r#"{"type":"error","message":"content exceeds limit"}"#)
        .await;
    drain_events(&mut dock, &mut events).await;

    let messages = dock.active_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Failed);
    assert_eq!(messages[0].error_message, "content exceeds limit");
    assert_eq!(connection.pending_count().await, 0);
}

#[tokio::test]
async fn inbound_while_scrolled_up_raises_indicator_and_unread() {
    let (mut dock, connection, mut events) = dock_with_events();

    // Viewer is scrolled up in a tall thread.
    dock.viewport_mut().observe_scroll(200.0, 2000.0, 400.0);

    let delivered = format!(
        r#"{{"type":"message","conversationId":"{}","messageId":"m1","senderId":"{}","sentAt":"2026-03-01T10:00:00Z","content":"hey"}}"#,
        CONVERSATION_ID, PEER_ID
    );
    connection.handle_frame(&delivered).await;
    drain_events(&mut dock, &mut events).await;

    assert!(dock.has_new_messages_indicator());
    assert!(dock.is_unread(CONVERSATION_ID));
    assert_eq!(dock.active_messages().len(), 1);

    dock.dismiss_new_messages().await;
    assert!(!dock.has_new_messages_indicator());
    assert!(!dock.is_unread(CONVERSATION_ID));
}

#[tokio::test]
async fn inbound_at_bottom_is_read_in_place() {
    let (mut dock, connection, mut events) = dock_with_events();

    // Fresh viewport counts as at-bottom.
    let delivered = format!(
        r#"{{"type":"message","conversationId":"{}","messageId":"m1","senderId":"{}","sentAt":"2026-03-01T10:00:00Z","content":"hey"}}"#,
        CONVERSATION_ID, PEER_ID
    );
    connection.handle_frame(&delivered).await;
    drain_events(&mut dock, &mut events).await;

    assert!(!dock.has_new_messages_indicator());
    assert!(!dock.is_unread(CONVERSATION_ID));
    assert_eq!(dock.active_messages().len(), 1);
}

#[tokio::test]
async fn malformed_frames_change_nothing() {
    let (mut dock, connection, mut events) = dock_with_events();
    dock.send("hello").await;

    connection.handle_frame("garbage").await;
    connection.handle_frame(r#"{"type":"message"}"#).await;
    connection
        .handle_frame(r#"{"type":"typing","userId":"u2"}"#)
        .await;
    drain_events(&mut dock, &mut events).await;

    let messages = dock.active_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Pending);
}

#[tokio::test]
async fn render_after_prepend_restores_the_anchor() {
    let (mut dock, _connection, _events) = dock_with_events();

    // Viewer sits near the top of a 1000-tall thread when the older page is
    // requested.
    dock.viewport_mut().observe_scroll(100.0, 1000.0, 400.0);
    dock.viewport_mut().record_anchor();

    // The prepend grew the content by 500; the viewport must not jump.
    assert_eq!(dock.on_content_rendered(1500.0, 400.0), Some(600.0));
    // Anchor is consumed; the next render changes nothing.
    assert_eq!(dock.on_content_rendered(1500.0, 400.0), None);
}

#[tokio::test]
async fn render_after_own_send_scrolls_to_bottom() {
    let (mut dock, _connection, _events) = dock_with_events();

    dock.viewport_mut().observe_scroll(600.0, 1000.0, 400.0);
    dock.send("hello").await;

    assert_eq!(dock.on_content_rendered(1100.0, 400.0), Some(700.0));
}

#[tokio::test]
async fn session_restore_carries_the_active_selection() {
    let (dock, _connection, _events) = dock_with_events();

    assert!(dock.is_open());
    assert_eq!(dock.active_conversation_id(), Some(CONVERSATION_ID));
    assert_eq!(dock.active_target_name(), "Ada Lovelace");
}

#[tokio::test]
async fn reset_clears_state_and_persisted_selection() {
    let (mut dock, connection, mut events) = dock_with_events();
    dock.send("hello").await;
    drain_events(&mut dock, &mut events).await;
    assert_eq!(dock.messages(CONVERSATION_ID).len(), 1);

    dock.reset();

    assert!(!dock.is_open());
    assert_eq!(dock.active_conversation_id(), None);
    assert!(dock.messages(CONVERSATION_ID).is_empty());
    assert!(!dock.has_unread());
    // The pending map survives; it belongs to the connection, not the dock.
    assert_eq!(connection.pending_count().await, 1);
}
