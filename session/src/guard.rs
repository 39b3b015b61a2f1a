//! Route guard
//!
//! A single policy table deciding, from a session snapshot and a requested
//! path, whether to render the route, wait, or redirect. Rules are checked
//! in order and the first match wins:
//!
//! 1. Session not known yet (bootstrap pending or in progress): wait.
//! 2. Signed in with a pending password change: go to the password page.
//! 3. Login/register while signed in: admins to the admin home, others home.
//! 4. Admin routes: anonymous users to login, non-admins home.
//! 5. Protected routes: anonymous users to login.
//! 6. Everything else renders.
//!
//! While the bootstrap ended in a recoverable error, guarded routes wait
//! instead of redirecting, so an offline user is not bounced to the login page.

use serde::Serialize;

use crate::config::GuardConfig;
use crate::session::state::{SessionSnapshot, SessionStatus};

/// How a path is treated by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteClass {
    Public,
    /// Login and register pages
    GuestOnly,
    PasswordChange,
    Protected,
    AdminOnly,
}

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Session state not known yet; render a placeholder
    Pending,
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    config: GuardConfig,
}

/// Drop query string, fragment and trailing slash
fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Prefix match on whole path segments (`/admin` matches `/admin/events`, not `/administrivia`)
fn under(path: &str, prefix: &str) -> bool {
    let prefix = normalize_path(prefix);
    if prefix == "/" {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl RouteGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);
        let c = &self.config;

        if path == normalize_path(&c.login_path) || path == normalize_path(&c.register_path) {
            RouteClass::GuestOnly
        } else if path == normalize_path(&c.change_password_path) {
            RouteClass::PasswordChange
        } else if under(path, &c.admin_prefix) {
            RouteClass::AdminOnly
        } else if c.protected_prefixes.iter().any(|p| under(path, p)) {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }

    pub fn decide(&self, session: &SessionSnapshot, path: &str) -> GuardDecision {
        let c = &self.config;
        let class = self.classify(path);

        if !session.initialized || session.status == SessionStatus::Checking {
            return GuardDecision::Pending;
        }

        if session.is_authenticated() {
            if session.requires_password_change() && class != RouteClass::PasswordChange {
                return GuardDecision::Redirect(c.change_password_path.clone());
            }
            return match class {
                RouteClass::GuestOnly if session.is_admin() => {
                    GuardDecision::Redirect(c.admin_home_path.clone())
                }
                RouteClass::GuestOnly => GuardDecision::Redirect(c.home_path.clone()),
                RouteClass::AdminOnly if !session.is_admin() => {
                    GuardDecision::Redirect(c.home_path.clone())
                }
                _ => GuardDecision::Allow,
            };
        }

        match class {
            RouteClass::Public | RouteClass::GuestOnly => GuardDecision::Allow,
            _ if matches!(session.status, SessionStatus::Error { .. }) => GuardDecision::Pending,
            _ => GuardDecision::Redirect(c.login_path.clone()),
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
