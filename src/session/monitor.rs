//! Proactive expiry handling: polls the stored access token, warns before it
//! runs out, and runs a cancellable countdown that ends in a forced logout.
//!
//! The poll loop and the countdown are two independent tokio tasks. They only
//! share `MonitorState` (behind a mutex) and the remaining-seconds counter, and
//! each can be cancelled on its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::refresh::RefreshCoordinator;
use crate::config::SessionTiming;
use crate::error::SessionResult;

use super::clock::Clock;
use super::events::{EventBus, SessionEvent, TerminationReason};
use super::store::SessionStore;
use super::terminate::{SessionTerminator, TeardownHook};
use super::token;

/// What a single poll decided; returned for callers that drive ticks by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session, or it ended under this tick before it could act.
    Idle,
    /// Token outside the warning window.
    Healthy,
    /// Warning raised on this tick.
    Warned { seconds_left: u64 },
    /// A countdown is running and owns the outcome.
    CountingDown,
    /// Expired with no continuation; the session was terminated.
    Terminated,
}

#[derive(Default)]
struct MonitorState {
    /// Token the flags below belong to.
    last_token: Option<String>,
    warned: bool,
    expired_fired: bool,
    countdown: Option<JoinHandle<()>>,
}

impl MonitorState {
    fn countdown_running(&self) -> bool {
        self.countdown.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn reset(&mut self) {
        if let Some(h) = self.countdown.take() { h.abort(); }
        self.warned = false;
        self.expired_fired = false;
        self.last_token = None;
    }
}

pub struct ExpiryMonitor {
    store: Arc<SessionStore>,
    events: EventBus,
    terminator: Arc<SessionTerminator>,
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
    timing: SessionTiming,
    state: Mutex<MonitorState>,
    remaining: Arc<AtomicU64>,
}

impl ExpiryMonitor {
    /// Builds the monitor and registers it with the terminator so any logout
    /// path cancels its countdown.
    pub fn new(
        store: Arc<SessionStore>,
        events: EventBus,
        terminator: Arc<SessionTerminator>,
        coordinator: Arc<RefreshCoordinator>,
        clock: Arc<dyn Clock>,
        timing: SessionTiming,
    ) -> Arc<Self> {
        let monitor = Arc::new(Self {
            store,
            events,
            terminator: terminator.clone(),
            coordinator,
            clock,
            timing,
            state: Mutex::new(MonitorState::default()),
            remaining: Arc::new(AtomicU64::new(0)),
        });
        let hook: Arc<dyn TeardownHook> = monitor.clone();
        terminator.register_hook(&hook);
        monitor
    }

    /// Start polling every `poll_interval`. Dropping the handle stops the poll
    /// (a countdown already running keeps going until cancelled or elapsed).
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        let this = self.clone();
        let period = self.timing.poll_interval();
        let handle = tokio::spawn(async move {
            let mut iv = tokio::time::interval(period);
            iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                iv.tick().await;
                this.tick();
            }
        });
        debug!(target: "monitor", period_ms = period.as_millis() as u64, "expiry monitor started");
        MonitorHandle { handle }
    }

    /// Seconds left on a running countdown.
    pub fn countdown_remaining(&self) -> Option<u64> {
        if self.state.lock().countdown_running() {
            Some(self.remaining.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// One poll. Must run inside a tokio runtime (it may spawn the countdown).
    pub fn tick(&self) -> TickOutcome {
        let now = self.clock.now();
        let (token, generation) = self.store.access_token_at();
        let mut st = self.state.lock();
        let Some(token) = token else {
            if st.last_token.is_some() { st.reset(); }
            return TickOutcome::Idle;
        };
        if st.last_token.as_deref() != Some(token.as_str()) {
            // new login or renewed token: earlier warnings do not carry over
            st.reset();
            st.last_token = Some(token.clone());
        }

        let left = token::time_left(&token, now);
        if left <= chrono::Duration::zero() {
            if !st.expired_fired {
                st.expired_fired = true;
                info!(target: "monitor", "access token expired");
                self.events.publish(SessionEvent::Expired);
            }
            if st.countdown_running() {
                return TickOutcome::CountingDown;
            }
            if self.timing.offer_continue_on_expiry && !st.warned {
                st.warned = true;
                self.start_countdown(&mut st, generation);
                return TickOutcome::CountingDown;
            }
            drop(st);
            return if self.terminator.terminate_for(generation, TerminationReason::Expired) {
                TickOutcome::Terminated
            } else {
                TickOutcome::Idle
            };
        }

        let window = chrono::Duration::seconds(self.timing.warning_window_secs as i64);
        if left <= window && !st.warned {
            st.warned = true;
            let seconds_left = (left.num_milliseconds() as u64).div_ceil(1000);
            info!(target: "monitor", seconds_left, "session expiring soon");
            self.events.publish(SessionEvent::ExpiringSoon { seconds_left });
            self.start_countdown(&mut st, generation);
            return TickOutcome::Warned { seconds_left };
        }
        if st.countdown_running() { TickOutcome::CountingDown } else { TickOutcome::Healthy }
    }

    /// The countdown belongs to the session at `generation` and goes quiet
    /// once the store moves past it.
    fn start_countdown(&self, st: &mut MonitorState, generation: u64) {
        if let Some(h) = st.countdown.take() { h.abort(); }
        let total = self.timing.countdown_secs;
        self.remaining.store(total, Ordering::Release);
        let remaining = self.remaining.clone();
        let events = self.events.clone();
        let terminator = self.terminator.clone();
        let store = self.store.clone();
        st.countdown = Some(tokio::spawn(async move {
            let mut left = total;
            while left > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if store.generation() != generation {
                    debug!(target: "monitor", "session replaced; countdown dropped");
                    return;
                }
                left -= 1;
                remaining.store(left, Ordering::Release);
                events.publish(SessionEvent::CountdownTick { remaining: left });
            }
            terminator.terminate_for(generation, TerminationReason::CountdownElapsed);
        }));
    }

    /// Stop the countdown without ending the session.
    fn cancel_countdown(&self) {
        let mut st = self.state.lock();
        st.reset();
        self.remaining.store(0, Ordering::Release);
    }

    /// The user chose to keep the session: obtain a fresh token through the
    /// coordinator (joining a refresh already in flight), then cancel the
    /// countdown. A failed refresh ends the session it was started for.
    pub async fn continue_session(&self) -> SessionResult<()> {
        let generation = self.store.generation();
        match self.coordinator.refresh_now().await {
            Ok(_) => {
                self.cancel_countdown();
                info!(target: "monitor", "session continued");
                self.events.publish(SessionEvent::Renewed);
                Ok(())
            }
            Err(e) => {
                // a logout or new login in the meantime owns the session now
                self.terminator.terminate_for(generation, TerminationReason::RefreshFailed);
                Err(e)
            }
        }
    }
}

impl TeardownHook for ExpiryMonitor {
    fn on_teardown(&self) {
        self.cancel_countdown();
    }
}

/// Owns the poll task.
pub struct MonitorHandle {
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(self) { self.handle.abort(); }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) { self.handle.abort(); }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod monitor_tests;
