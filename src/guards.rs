//! Navigation guards. Pure functions of the current store contents, evaluated
//! on every navigation.

use crate::config::Routes;
use crate::session::model::Role;
use crate::session::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectTo(String),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool { matches!(self, GuardDecision::Allow) }
}

/// Screens that need a session, optionally of a given role. Missing token goes
/// to login; wrong role goes to the unauthorized screen.
pub fn guard_protected(store: &SessionStore, routes: &Routes, required_role: Option<Role>) -> GuardDecision {
    if store.access_token().is_none() {
        return GuardDecision::RedirectTo(routes.login.clone());
    }
    match required_role {
        None => GuardDecision::Allow,
        Some(req) if store.role() == Some(req) => GuardDecision::Allow,
        Some(_) => GuardDecision::RedirectTo(routes.unauthorized.clone()),
    }
}

/// Login/register/password-recovery screens: signed-in users are sent to their dashboard.
pub fn guard_public_only(store: &SessionStore, routes: &Routes) -> GuardDecision {
    if store.access_token().is_none() {
        return GuardDecision::Allow;
    }
    GuardDecision::RedirectTo(dashboard_for(store.role(), routes))
}

pub fn dashboard_for(role: Option<Role>, routes: &Routes) -> String {
    match role {
        Some(Role::Admin) => routes.admin_dashboard.clone(),
        _ => routes.user_dashboard.clone(),
    }
}
