/// Scroll/viewport coordinator for the conversation thread.
/// Headless model of the thread's scroll geometry: decides auto-scroll vs
/// new-message indicator and anchors the viewport across older-page prepends.

use log::debug;

/// Distance from the bottom within which the viewer still counts as reading
/// the newest messages.
pub const NEAR_BOTTOM_THRESHOLD: f64 = 80.0;
/// Scroll offset from the top below which an older page load is triggered.
pub const LOAD_OLDER_THRESHOLD: f64 = 120.0;

/// Restoration anchor captured before an older page is prepended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    pub scroll_top: f64,
    pub scroll_height: f64,
}

/// What a scroll observation asks the dock to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub near_top: bool,
    pub at_bottom: bool,
}

pub struct ViewportCoordinator {
    scroll_top: f64,
    scroll_height: f64,
    client_height: f64,
    at_bottom: bool,
    new_messages_indicator: bool,
    pending_scroll_to_bottom: bool,
    pending_anchor: Option<ScrollAnchor>,
}

impl ViewportCoordinator {
    pub fn new() -> Self {
        ViewportCoordinator {
            scroll_top: 0.0,
            scroll_height: 0.0,
            client_height: 0.0,
            // An empty thread counts as at-bottom so the first delivery
            // auto-scrolls.
            at_bottom: true,
            new_messages_indicator: false,
            pending_scroll_to_bottom: false,
            pending_anchor: None,
        }
    }

    /// Record a scroll event from the thread container.
    pub fn observe_scroll(
        &mut self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> ScrollOutcome {
        self.scroll_top = scroll_top;
        self.scroll_height = scroll_height;
        self.client_height = client_height;
        self.at_bottom = scroll_top + client_height >= scroll_height - NEAR_BOTTOM_THRESHOLD;
        if self.at_bottom {
            self.new_messages_indicator = false;
        }
        ScrollOutcome {
            near_top: scroll_top <= LOAD_OLDER_THRESHOLD,
            at_bottom: self.at_bottom,
        }
    }

    /// Content grew without the user scrolling (render after merge).
    pub fn observe_content(&mut self, scroll_height: f64, client_height: f64) {
        self.scroll_height = scroll_height;
        self.client_height = client_height;
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Capture the anchor before an older page is requested.
    pub fn record_anchor(&mut self) {
        self.pending_anchor = Some(ScrollAnchor {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height,
        });
    }

    /// Restore the viewport after the prepended content is rendered so the
    /// visible messages do not jump: the top moves down by exactly the height
    /// the prepend added.
    pub fn complete_prepend(&mut self, new_scroll_height: f64) -> Option<f64> {
        let anchor = self.pending_anchor.take()?;
        let delta = new_scroll_height - anchor.scroll_height;
        self.scroll_height = new_scroll_height;
        self.scroll_top = anchor.scroll_top + delta;
        debug!(
            "restored scroll anchor: top {} -> {}",
            anchor.scroll_top, self.scroll_top
        );
        Some(self.scroll_top)
    }

    pub fn clear_anchor(&mut self) {
        self.pending_anchor = None;
    }

    /// Queue a forced scroll-to-bottom (conversation switch, own send).
    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
    }

    /// Apply a queued scroll-to-bottom once the content is laid out. Returns
    /// the new scroll top, or None while the container still has zero height,
    /// in which case the request stays queued for the next frame.
    pub fn apply_pending_scroll(&mut self) -> Option<f64> {
        if !self.pending_scroll_to_bottom {
            return None;
        }
        if self.scroll_height <= 0.0 {
            return None;
        }
        self.pending_scroll_to_bottom = false;
        Some(self.scroll_to_bottom())
    }

    pub fn scroll_to_bottom(&mut self) -> f64 {
        self.scroll_top = (self.scroll_height - self.client_height).max(0.0);
        self.at_bottom = true;
        self.new_messages_indicator = false;
        self.scroll_top
    }

    /// Inbound message while the viewer is scrolled up: no auto-scroll,
    /// raise the indicator instead.
    pub fn show_new_messages_indicator(&mut self) {
        self.new_messages_indicator = true;
    }

    pub fn has_new_messages_indicator(&self) -> bool {
        self.new_messages_indicator
    }

    /// Dismissing the indicator scrolls to bottom; the dock clears unread.
    pub fn dismiss_indicator(&mut self) -> f64 {
        self.scroll_to_bottom()
    }

    /// Reset on conversation switch; geometry of the old thread is stale.
    pub fn reset_for_switch(&mut self) {
        self.pending_anchor = None;
        self.new_messages_indicator = false;
        self.pending_scroll_to_bottom = true;
        self.at_bottom = true;
    }
}

impl Default for ViewportCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
