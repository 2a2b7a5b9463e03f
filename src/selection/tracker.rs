//! Selection Tracker
//!
//! Owns "what is currently selected" for a page. States:
//!
//! - `Idle` → qualifying selection → `Active`
//! - `Active` → selection cleared → `Grace`
//! - `Grace` → grace period elapsed or navigation → `Idle`
//! - `Grace` / `Active` → qualifying selection → `Active` (replaced)
//!
//! Grace expiry is evaluated against the caller's clock, so reads stay pure.

use super::{classify, PageEvent, Selection};
use crate::config::SelectionLimits;
use crate::ipc::Request;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of the selection tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    /// No selection
    Idle,
    /// The user has a live selection
    Active(Selection),
    /// Selection was cleared; still current until the grace period ends
    Grace { selection: Selection, since: Instant },
}

/// What a handled event did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle → Active
    Activated,
    /// Active/Grace → Active with a newer selection
    Replaced,
    /// Active → Grace
    EnteredGrace,
    /// Grace → Idle because the grace period elapsed
    Expired,
    /// Any → Idle because of navigation
    Reset,
    /// Event did not change the state
    Unchanged,
}

#[derive(Debug)]
pub struct SelectionTracker {
    state: TrackerState,
    limits: SelectionLimits,
    notifier: Option<UnboundedSender<Request>>,
}

impl SelectionTracker {
    pub fn new(limits: SelectionLimits) -> Self {
        Self {
            state: TrackerState::Idle,
            limits,
            notifier: None,
        }
    }

    /// Send a `content-selected` notification on every transition into Active
    pub fn with_notifier(mut self, notifier: UnboundedSender<Request>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn limits(&self) -> &SelectionLimits {
        &self.limits
    }

    /// Current selection as of `now`. A selection in grace is returned until
    /// the grace period has elapsed.
    pub fn current_selection(&self, now: Instant) -> Option<&Selection> {
        match &self.state {
            TrackerState::Idle => None,
            TrackerState::Active(selection) => Some(selection),
            TrackerState::Grace { selection, since } => {
                if self.grace_elapsed(*since, now) {
                    None
                } else {
                    Some(selection)
                }
            }
        }
    }

    /// Fold an elapsed grace period into Idle
    pub fn expire(&mut self, now: Instant) -> Transition {
        if let TrackerState::Grace { since, .. } = &self.state {
            if self.grace_elapsed(*since, now) {
                debug!("⏳ Selection grace period elapsed");
                self.state = TrackerState::Idle;
                return Transition::Expired;
            }
        }
        Transition::Unchanged
    }

    /// Apply a page event at time `now`
    pub fn handle(&mut self, event: &PageEvent, now: Instant) -> Transition {
        let expired = self.expire(now);

        let transition = match event {
            PageEvent::Navigated { page_url } => {
                if matches!(self.state, TrackerState::Idle) {
                    Transition::Unchanged
                } else {
                    info!("🧭 Navigated to {}, dropping selection", page_url);
                    self.state = TrackerState::Idle;
                    Transition::Reset
                }
            }
            PageEvent::SelectionCleared => {
                match std::mem::replace(&mut self.state, TrackerState::Idle) {
                    TrackerState::Active(selection) => {
                        debug!("Selection cleared, entering grace period");
                        self.state = TrackerState::Grace {
                            selection,
                            since: now,
                        };
                        Transition::EnteredGrace
                    }
                    other => {
                        self.state = other;
                        Transition::Unchanged
                    }
                }
            }
            PageEvent::TextSelected { .. } | PageEvent::ImageContextMenu { .. } => {
                match classify(event, &self.limits, Utc::now()) {
                    Some(selection) => {
                        let transition = if matches!(self.state, TrackerState::Idle) {
                            Transition::Activated
                        } else {
                            Transition::Replaced
                        };
                        info!("📌 Selection tracked: {}", selection.preview(60));
                        self.notify(&selection);
                        self.state = TrackerState::Active(selection);
                        transition
                    }
                    None => Transition::Unchanged,
                }
            }
        };

        if transition == Transition::Unchanged {
            expired
        } else {
            transition
        }
    }

    fn notify(&self, selection: &Selection) {
        if let Some(notifier) = &self.notifier {
            let message = Request::ContentSelected {
                selection: selection.clone(),
            };
            if let Err(e) = notifier.send(message) {
                warn!("⚠️ Could not notify coordinator of selection: {}", e);
            }
        }
    }

    fn grace_elapsed(&self, since: Instant, now: Instant) -> bool {
        now.saturating_duration_since(since) >= self.limits.grace_period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn select_text(text: &str) -> PageEvent {
        PageEvent::TextSelected {
            text: text.to_string(),
            context_before: String::new(),
            context_after: String::new(),
            element_tag: "p".to_string(),
            page_url: "https://example.com".to_string(),
        }
    }

    fn tracker() -> SelectionTracker {
        SelectionTracker::new(SelectionLimits {
            grace_period_ms: 1_000,
            ..SelectionLimits::default()
        })
    }

    #[test]
    fn test_idle_to_active() {
        let mut tracker = tracker();
        let now = Instant::now();
        assert!(tracker.current_selection(now).is_none());

        let t = tracker.handle(&select_text("The quick brown fox jumps"), now);
        assert_eq!(t, Transition::Activated);
        assert_eq!(
            tracker.current_selection(now).and_then(|s| s.text()),
            Some("The quick brown fox jumps")
        );
    }

    #[test]
    fn test_short_selection_stays_idle() {
        let mut tracker = tracker();
        let now = Instant::now();
        let t = tracker.handle(&select_text("fox"), now);
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(tracker.state(), &TrackerState::Idle);
    }

    #[test]
    fn test_grace_keeps_selection_until_elapsed() {
        let mut tracker = tracker();
        let start = Instant::now();
        tracker.handle(&select_text("The quick brown fox jumps"), start);

        let t = tracker.handle(&PageEvent::SelectionCleared, start);
        assert_eq!(t, Transition::EnteredGrace);

        assert!(tracker
            .current_selection(start + Duration::from_millis(999))
            .is_some());
        assert!(tracker
            .current_selection(start + Duration::from_millis(1_000))
            .is_none());

        assert_eq!(
            tracker.expire(start + Duration::from_secs(2)),
            Transition::Expired
        );
        assert_eq!(tracker.state(), &TrackerState::Idle);
    }

    #[test]
    fn test_new_selection_during_grace_replaces() {
        let mut tracker = tracker();
        let start = Instant::now();
        tracker.handle(&select_text("The first selection here"), start);
        tracker.handle(&PageEvent::SelectionCleared, start);

        let later = start + Duration::from_millis(200);
        let t = tracker.handle(&select_text("A second, newer selection"), later);
        assert_eq!(t, Transition::Replaced);
        assert!(matches!(tracker.state(), TrackerState::Active(_)));

        // No longer subject to the old grace timer
        let much_later = start + Duration::from_secs(10);
        assert_eq!(
            tracker.current_selection(much_later).and_then(|s| s.text()),
            Some("A second, newer selection")
        );
    }

    #[test]
    fn test_navigation_resets_from_grace() {
        let mut tracker = tracker();
        let now = Instant::now();
        tracker.handle(&select_text("The quick brown fox jumps"), now);
        tracker.handle(&PageEvent::SelectionCleared, now);

        let t = tracker.handle(
            &PageEvent::Navigated {
                page_url: "https://example.com/next".to_string(),
            },
            now,
        );
        assert_eq!(t, Transition::Reset);
        assert!(tracker.current_selection(now).is_none());
    }

    #[test]
    fn test_clear_while_idle_is_noop() {
        let mut tracker = tracker();
        let t = tracker.handle(&PageEvent::SelectionCleared, Instant::now());
        assert_eq!(t, Transition::Unchanged);
    }

    #[test]
    fn test_expired_grace_then_clear_reports_expiry() {
        let mut tracker = tracker();
        let start = Instant::now();
        tracker.handle(&select_text("The quick brown fox jumps"), start);
        tracker.handle(&PageEvent::SelectionCleared, start);

        let t = tracker.handle(&PageEvent::SelectionCleared, start + Duration::from_secs(5));
        assert_eq!(t, Transition::Expired);
    }

    #[test]
    fn test_notifies_on_every_activation_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = tracker().with_notifier(tx);
        let now = Instant::now();

        tracker.handle(&select_text("The first selection here"), now);
        tracker.handle(&select_text("The second selection here"), now);
        tracker.handle(&PageEvent::SelectionCleared, now);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        match (first, second) {
            (
                Request::ContentSelected { selection: a },
                Request::ContentSelected { selection: b },
            ) => {
                assert_eq!(a.text(), Some("The first selection here"));
                assert_eq!(b.text(), Some("The second selection here"));
            }
            other => panic!("Unexpected notifications: {:?}", other),
        }
    }

    #[test]
    fn test_failed_notification_keeps_local_state() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut tracker = tracker().with_notifier(tx);
        let now = Instant::now();

        let t = tracker.handle(&select_text("The quick brown fox jumps"), now);
        assert_eq!(t, Transition::Activated);
        assert!(tracker.current_selection(now).is_some());
    }
}
