/// Pagination cursor manager for older-message loads.
/// Tracks per-conversation cursors and exhaustion, with a dock-wide
/// single-flight guard so rapid scroll events issue at most one request.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PagingState {
    /// `sentAt` of the oldest loaded message; None once nothing older is known.
    pub cursor: Option<DateTime<Utc>>,
    pub has_more: bool,
}

pub struct PaginationManager {
    states: HashMap<String, PagingState>,
    in_flight: bool,
}

impl PaginationManager {
    pub fn new() -> Self {
        PaginationManager {
            states: HashMap::new(),
            in_flight: false,
        }
    }

    pub fn state(&self, conversation_id: &str) -> Option<&PagingState> {
        self.states.get(conversation_id)
    }

    pub fn set_state(
        &mut self,
        conversation_id: &str,
        cursor: Option<DateTime<Utc>>,
        has_more: bool,
    ) {
        self.states
            .insert(conversation_id.to_string(), PagingState { cursor, has_more });
    }

    /// Seed an exhausted state for a conversation restored from cache without
    /// any paging history.
    pub fn ensure_state(&mut self, conversation_id: &str) {
        self.states
            .entry(conversation_id.to_string())
            .or_insert(PagingState {
                cursor: None,
                has_more: false,
            });
    }

    /// Try to start an older-page load. Returns the cursor to fetch before,
    /// or None when the load must not run: unknown conversation, exhausted,
    /// missing cursor, or another load already in flight anywhere in the dock.
    pub fn try_begin(&mut self, conversation_id: &str) -> Option<DateTime<Utc>> {
        if self.in_flight {
            return None;
        }
        let state = self.states.get(conversation_id)?;
        if !state.has_more {
            return None;
        }
        let cursor = state.cursor?;
        self.in_flight = true;
        Some(cursor)
    }

    /// Record the result of a page fetch and release the flight guard.
    pub fn complete(
        &mut self,
        conversation_id: &str,
        next_cursor: Option<DateTime<Utc>>,
        has_more: bool,
    ) {
        self.set_state(conversation_id, next_cursor, has_more);
        self.in_flight = false;
    }

    /// Release the flight guard after a failed fetch; the previous cursor is
    /// kept so the load is safe to retry.
    pub fn abort(&mut self) {
        self.in_flight = false;
    }

    /// Conversation switches reset any stuck flight guard.
    pub fn reset_flight(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

impl Default for PaginationManager {
    fn default() -> Self {
        Self::new()
    }
}
