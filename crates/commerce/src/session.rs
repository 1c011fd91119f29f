//! Authenticated-session signal.
//!
//! Authentication itself lives elsewhere. The synchronizer only needs to know
//! whether a user session is active and to observe the transitions: session
//! start triggers a reload, session end empties the collections.
//!
//! Each transition also advances a generation counter. Work that started in
//! one session captures [`SessionSignal::active_session`] and checks it again
//! with [`SessionSignal::is_current`] before publishing results, so nothing
//! from a finished session leaks into the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Shared boolean "is a user session active", with change notification.
///
/// Cheaply cloneable; all clones observe the same signal.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: Arc<watch::Sender<bool>>,
    generation: Arc<AtomicU64>,
}

impl SessionSignal {
    /// Create a signal with an initial state.
    #[must_use]
    pub fn new(active: bool) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(active)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.tx.borrow()
    }

    /// Generation of the active session, `None` when signed out.
    #[must_use]
    pub fn active_session(&self) -> Option<u64> {
        // The generation only moves while the sender is locked for writing.
        let active = self.tx.borrow();
        (*active).then(|| self.generation.load(Ordering::SeqCst))
    }

    /// Whether `generation` is still the active session.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.active_session() == Some(generation)
    }

    /// Mark the session as started. Notifies only on an actual transition.
    pub fn start(&self) {
        self.set(true);
    }

    /// Mark the session as ended (logout). Notifies only on an actual transition.
    pub fn end(&self) {
        self.set(false);
    }

    fn set(&self, active: bool) {
        self.tx.send_if_modified(|current| {
            if *current == active {
                false
            } else {
                *current = active;
                self.generation.fetch_add(1, Ordering::SeqCst);
                true
            }
        });
    }

    /// Subscribe to transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_end() {
        let session = SessionSignal::default();
        assert!(!session.is_active());

        session.start();
        assert!(session.is_active());

        let clone = session.clone();
        clone.end();
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let session = SessionSignal::new(false);
        let mut rx = session.subscribe();

        session.end();
        assert!(!rx.has_changed().unwrap());

        session.start();
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_generation_changes_on_every_transition() {
        let session = SessionSignal::new(false);
        assert_eq!(session.active_session(), None);

        session.start();
        let first = session.active_session().unwrap();
        assert!(session.is_current(first));

        session.start();
        assert!(session.is_current(first), "no transition, same session");

        session.end();
        assert!(!session.is_current(first));

        session.start();
        let second = session.active_session().unwrap();
        assert_ne!(first, second);
        assert!(!session.is_current(first));
    }
}
