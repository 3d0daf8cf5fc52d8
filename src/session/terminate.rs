use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::events::{EventBus, SessionEvent, TerminationReason};
use super::store::SessionStore;

/// Something that owns timers or state tied to the current session and must
/// stop when it ends.
pub trait TeardownHook: Send + Sync {
    fn on_teardown(&self);
}

/// The single logout path. Whichever trigger gets there first (explicit
/// logout, refresh failure, countdown expiry) performs the teardown; later
/// calls are no-ops until a new session is established in the store.
pub struct SessionTerminator {
    store: Arc<SessionStore>,
    events: EventBus,
    login_route: String,
    /// Store generation left behind by the last teardown.
    fired_for: Mutex<Option<u64>>,
    hooks: Mutex<Vec<Weak<dyn TeardownHook>>>,
}

impl SessionTerminator {
    pub fn new(store: Arc<SessionStore>, events: EventBus, login_route: impl Into<String>) -> Self {
        Self { store, events, login_route: login_route.into(), fired_for: Mutex::new(None), hooks: Mutex::new(Vec::new()) }
    }

    /// Hooks are held weakly; a dropped owner simply stops being notified.
    pub fn register_hook(&self, hook: &Arc<dyn TeardownHook>) {
        let mut hooks = self.hooks.lock();
        hooks.retain(|h| h.strong_count() > 0);
        hooks.push(Arc::downgrade(hook));
    }

    /// Clear the session, stop session timers and tell the view to navigate to
    /// the login screen. Returns false when another trigger already did so.
    pub fn terminate(&self, reason: TerminationReason) -> bool {
        self.fire(None, reason)
    }

    /// Like `terminate`, but only while the store is still at `generation`.
    /// Triggers that belong to one session (a countdown, a continue attempt)
    /// use this so they cannot end a later login.
    pub fn terminate_for(&self, generation: u64, reason: TerminationReason) -> bool {
        self.fire(Some(generation), reason)
    }

    fn fire(&self, expected: Option<u64>, reason: TerminationReason) -> bool {
        let mut fired_for = self.fired_for.lock();
        let current = self.store.generation();
        if *fired_for == Some(current) {
            debug!(target: "session", ?reason, "termination already in progress; ignoring");
            return false;
        }
        let Some((had_session, cleared_to)) = self.store.clear_generation(expected.or(Some(current))) else {
            debug!(target: "session", ?reason, "session changed before termination; ignoring");
            return false;
        };
        *fired_for = Some(cleared_to);
        drop(fired_for);

        let live: Vec<Arc<dyn TeardownHook>> = self.hooks.lock().iter().filter_map(|w| w.upgrade()).collect();
        for h in live {
            h.on_teardown();
        }
        info!(target: "session", ?reason, had_session, "session terminated");
        self.events.publish(SessionEvent::Terminated {
            reason,
            redirect_to: self.login_route.clone(),
            replace_history: true,
        });
        true
    }
}
