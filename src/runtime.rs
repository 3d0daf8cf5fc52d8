//! Wires the store, event bus, terminator, refresh coordinator, HTTP client and
//! expiry monitor together. One `SessionRuntime` per process; clones of its
//! parts are cheap `Arc`s.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::api::{AuthService, TaskService, UserService};
use crate::client::{ApiClient, HttpTransport, RefreshCoordinator, ReqwestTransport};
use crate::config::TaskdeskConfig;
use crate::error::SessionResult;
use crate::guards::{self, GuardDecision};
use crate::session::clock::{Clock, SystemClock};
use crate::session::events::{EventBus, SessionEvent, TerminationReason};
use crate::session::model::Role;
use crate::session::monitor::{ExpiryMonitor, MonitorHandle};
use crate::session::store::SessionStore;
use crate::session::terminate::SessionTerminator;

pub struct SessionRuntime {
    config: TaskdeskConfig,
    store: Arc<SessionStore>,
    events: EventBus,
    terminator: Arc<SessionTerminator>,
    client: ApiClient,
    monitor: Arc<ExpiryMonitor>,
}

impl SessionRuntime {
    /// Real HTTP transport and, when configured, a file-backed store.
    pub fn from_config(config: TaskdeskConfig) -> SessionResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.base_url, config.timing.request_timeout())?);
        let store = match &config.session_file {
            Some(p) => SessionStore::open(p)?,
            None => SessionStore::in_memory(),
        };
        info!(target: "session", base_url = %config.base_url, restored = store.is_authenticated(), "session runtime ready");
        Ok(Self::assemble(config, transport, Arc::new(store), Arc::new(SystemClock)))
    }

    pub fn assemble(
        config: TaskdeskConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::default();
        let terminator = Arc::new(SessionTerminator::new(store.clone(), events.clone(), config.routes.login.clone()));
        let coordinator = RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            terminator.clone(),
            config.endpoints.refresh.clone(),
            config.timing.refresh_timeout(),
        );
        let client = ApiClient::new(transport, store.clone(), coordinator.clone());
        let monitor = ExpiryMonitor::new(
            store.clone(),
            events.clone(),
            terminator.clone(),
            coordinator,
            clock,
            config.timing.clone(),
        );
        Self { config, store, events, terminator, client, monitor }
    }

    pub fn config(&self) -> &TaskdeskConfig { &self.config }

    pub fn store(&self) -> &Arc<SessionStore> { &self.store }

    pub fn events(&self) -> &EventBus { &self.events }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> { self.events.subscribe() }

    pub fn terminator(&self) -> &Arc<SessionTerminator> { &self.terminator }

    pub fn client(&self) -> &ApiClient { &self.client }

    pub fn monitor(&self) -> &Arc<ExpiryMonitor> { &self.monitor }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.client.clone(), self.terminator.clone(), self.config.endpoints.login.clone())
    }

    pub fn tasks(&self) -> TaskService { TaskService::new(self.client.clone()) }

    pub fn users(&self) -> UserService { UserService::new(self.client.clone()) }

    /// Begin polling for expiry. Keep the handle alive for as long as the
    /// monitor should run.
    pub fn start_monitor(&self) -> MonitorHandle { self.monitor.start() }

    pub fn logout(&self) -> bool { self.terminator.terminate(TerminationReason::Explicit) }

    pub fn guard_protected(&self, required_role: Option<Role>) -> GuardDecision {
        guards::guard_protected(&self.store, &self.config.routes, required_role)
    }

    pub fn guard_public_only(&self) -> GuardDecision {
        guards::guard_public_only(&self.store, &self.config.routes)
    }
}
