//! Follow-tail tracking for the log viewport.

use tracing::debug;

/// Distance from the exact bottom that still counts as "at bottom".
pub const FOLLOW_THRESHOLD_PX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Following,
    Detached,
}

/// Viewport scroll metrics as reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self { scroll_top, scroll_height, client_height }
    }

    /// Negative when the content is shorter than the viewport.
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// What the presentation should do after an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendEffect {
    ScrollToBottom,
    NewMessages { unseen: usize },
}

#[derive(Debug, Clone)]
pub struct FollowTracker {
    state: FollowState,
    threshold: f64,
    unseen: usize,
}

impl Default for FollowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FollowTracker {
    pub fn new() -> Self {
        Self::with_threshold(FOLLOW_THRESHOLD_PX)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { state: FollowState::Following, threshold: threshold.max(0.0), unseen: 0 }
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn is_at_bottom(&self) -> bool {
        self.state == FollowState::Following
    }

    /// Entries appended since the viewport detached.
    pub fn unseen(&self) -> usize {
        self.unseen
    }

    /// Recompute the state from a scroll sample.
    pub fn sample(&mut self, metrics: ScrollMetrics) -> FollowState {
        let distance = metrics.distance_from_bottom();
        let next = if distance <= self.threshold {
            FollowState::Following
        } else {
            FollowState::Detached
        };
        self.transition(next, "scroll");
        next
    }

    /// Explicit "jump to latest".
    pub fn jump_to_latest(&mut self) {
        self.transition(FollowState::Following, "jump");
    }

    /// Forced by a critical alert; bypasses scroll sampling.
    pub fn force_follow(&mut self) {
        self.transition(FollowState::Following, "alert");
    }

    /// Appends never change the state, they only decide the presentation effect.
    pub fn on_append(&mut self) -> AppendEffect {
        match self.state {
            FollowState::Following => AppendEffect::ScrollToBottom,
            FollowState::Detached => {
                self.unseen = self.unseen.saturating_add(1);
                AppendEffect::NewMessages { unseen: self.unseen }
            }
        }
    }

    fn transition(&mut self, next: FollowState, cause: &'static str) {
        if next == FollowState::Following {
            self.unseen = 0;
        }
        if next != self.state {
            debug!(from = ?self.state, to = ?next, cause, "follow state changed");
            self.state = next;
        }
    }
}
