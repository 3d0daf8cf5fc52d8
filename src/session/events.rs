use serde::Serialize;
use tokio::sync::broadcast;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The user logged out.
    Explicit,
    /// The expiry countdown reached zero.
    CountdownElapsed,
    /// The access token expired with no continuation offered.
    Expired,
    /// Refresh errored, was refused, timed out, or no refresh token existed.
    RefreshFailed,
    /// A replayed request was still rejected with 401.
    AuthRejected,
}

/// Notifications for the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ExpiringSoon { seconds_left: u64 },
    CountdownTick { remaining: u64 },
    Expired,
    /// A continue-session request obtained a fresh token.
    Renewed,
    /// Navigate to `redirect_to`, replacing history so back cannot reveal an
    /// authenticated screen.
    Terminated { reason: TerminationReason, redirect_to: String, replace_history: bool },
}

/// Multi-subscriber event fan-out. Publishing with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> { self.tx.subscribe() }

    pub fn publish(&self, ev: SessionEvent) {
        tracing::debug!(target: "session", event = ?ev, "publish");
        let _ = self.tx.send(ev);
    }
}

impl Default for EventBus {
    fn default() -> Self { Self::new(64) }
}
