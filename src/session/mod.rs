//! Session state and lifecycle: the credential store, token inspection, the
//! expiry monitor, and the single termination path.

pub mod clock;
pub mod events;
pub mod model;
pub mod monitor;
pub mod store;
pub mod terminate;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBus, SessionEvent, TerminationReason};
pub use model::{Credentials, Role};
pub use monitor::{ExpiryMonitor, MonitorHandle, TickOutcome};
pub use store::SessionStore;
pub use terminate::{SessionTerminator, TeardownHook};
