//! Client configuration: backend location, endpoint paths, route targets and
//! session timing. Loaded from an optional JSON file, then overridden by
//! `TASKDESK_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Endpoints {
    #[serde(default = "Endpoints::default_login")]
    pub login: String,
    #[serde(default = "Endpoints::default_refresh")]
    pub refresh: String,
}

impl Endpoints {
    fn default_login() -> String { "/api/auth/login".to_string() }
    fn default_refresh() -> String { "/api/auth/refresh-token".to_string() }
}

impl Default for Endpoints {
    fn default() -> Self { Self { login: Self::default_login(), refresh: Self::default_refresh() } }
}

/// Screens the guards and the terminator redirect to.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Routes {
    #[serde(default = "Routes::default_login")]
    pub login: String,
    #[serde(default = "Routes::default_unauthorized")]
    pub unauthorized: String,
    #[serde(default = "Routes::default_admin_dashboard")]
    pub admin_dashboard: String,
    #[serde(default = "Routes::default_user_dashboard")]
    pub user_dashboard: String,
}

impl Routes {
    fn default_login() -> String { "/login".to_string() }
    fn default_unauthorized() -> String { "/unauthorized".to_string() }
    fn default_admin_dashboard() -> String { "/admin".to_string() }
    fn default_user_dashboard() -> String { "/user".to_string() }
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login: Self::default_login(),
            unauthorized: Self::default_unauthorized(),
            admin_dashboard: Self::default_admin_dashboard(),
            user_dashboard: Self::default_user_dashboard(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionTiming {
    /// Expiry poll interval in milliseconds
    #[serde(default = "SessionTiming::default_poll_ms")]
    pub poll_interval_ms: u64,
    /// Warn when the access token has this many seconds (or fewer) left
    #[serde(default = "SessionTiming::default_warning_secs")]
    pub warning_window_secs: u64,
    /// Countdown length before forced logout once warned
    #[serde(default = "SessionTiming::default_countdown_secs")]
    pub countdown_secs: u64,
    /// Upper bound on a single refresh-token call
    #[serde(default = "SessionTiming::default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    /// Transport timeout for ordinary requests
    #[serde(default = "SessionTiming::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// When an already-expired token is seen with no countdown running, start one
    /// (giving the user a chance to continue) instead of logging out at once.
    #[serde(default)]
    pub offer_continue_on_expiry: bool,
}

impl SessionTiming {
    fn default_poll_ms() -> u64 { 1_000 }
    fn default_warning_secs() -> u64 { 5 }
    fn default_countdown_secs() -> u64 { 5 }
    fn default_refresh_timeout_ms() -> u64 { 10_000 }
    fn default_request_timeout_ms() -> u64 { 30_000 }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms.max(1)) }
    pub fn refresh_timeout(&self) -> Duration { Duration::from_millis(self.refresh_timeout_ms) }
    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.request_timeout_ms) }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_ms(),
            warning_window_secs: Self::default_warning_secs(),
            countdown_secs: Self::default_countdown_secs(),
            refresh_timeout_ms: Self::default_refresh_timeout_ms(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            offer_continue_on_expiry: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TaskdeskConfig {
    #[serde(default = "TaskdeskConfig::default_base_url")]
    pub base_url: String,
    /// Where the session survives restarts; `None` keeps it in memory only.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub routes: Routes,
    #[serde(default)]
    pub timing: SessionTiming,
}

impl TaskdeskConfig {
    fn default_base_url() -> String { "http://localhost:8080".to_string() }

    /// Load `path` if it exists (defaults otherwise) and apply env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let bytes = std::fs::read(p).with_context(|| format!("reading config {}", p.display()))?;
                serde_json::from_slice::<TaskdeskConfig>(&bytes)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            _ => TaskdeskConfig::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Apply `TASKDESK_*` overrides using the given lookup (injected for tests).
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> anyhow::Result<()> {
        if let Some(v) = lookup("TASKDESK_API_BASE_URL") { self.base_url = v; }
        if let Some(v) = lookup("TASKDESK_SESSION_FILE") {
            self.session_file = if v.trim().is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        let num = |key: &str| -> anyhow::Result<Option<u64>> {
            match lookup(key) {
                Some(v) => Ok(Some(v.trim().parse::<u64>().with_context(|| format!("{key} must be an integer, got '{v}'"))?)),
                None => Ok(None),
            }
        };
        if let Some(v) = num("TASKDESK_POLL_INTERVAL_MS")? { self.timing.poll_interval_ms = v; }
        if let Some(v) = num("TASKDESK_WARNING_WINDOW_SECS")? { self.timing.warning_window_secs = v; }
        if let Some(v) = num("TASKDESK_COUNTDOWN_SECS")? { self.timing.countdown_secs = v; }
        if let Some(v) = num("TASKDESK_REFRESH_TIMEOUT_MS")? { self.timing.refresh_timeout_ms = v; }
        if let Some(v) = num("TASKDESK_REQUEST_TIMEOUT_MS")? { self.timing.request_timeout_ms = v; }
        if let Some(v) = lookup("TASKDESK_OFFER_CONTINUE_ON_EXPIRY") {
            self.timing.offer_continue_on_expiry = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }
}

impl Default for TaskdeskConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            session_file: None,
            endpoints: Endpoints::default(),
            routes: Routes::default(),
            timing: SessionTiming::default(),
        }
    }
}
