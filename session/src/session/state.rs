use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account role as issued by the auth API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[serde(alias = "user")]
    User,
    #[serde(alias = "admin")]
    Admin,
    #[serde(alias = "superadmin", alias = "SUPER_ADMIN")]
    SuperAdmin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// Profile of the signed-in user.
///
/// Only `role` and `require_password_change` drive decisions here; every
/// other field the API sends is kept in `extra` and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub role: Role,
    #[serde(default)]
    pub require_password_change: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            require_password_change: false,
            name: None,
            email: None,
            extra: Map::new(),
        }
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionStatus {
    /// `init` has not run yet
    Uninitialized,
    /// Bootstrap profile check (and possibly silent refresh) in flight
    Checking,
    Authenticated,
    Unauthenticated,
    /// Bootstrap failed for a non-credential reason; tokens kept
    Error { message: String },
}

/// Read-only view of the session handed to rendering code and the route guard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub auth_error: Option<String>,
    pub loading: bool,
    pub initialized: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.is_admin())
    }

    pub fn is_super_admin(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.role == Role::SuperAdmin)
    }

    pub fn requires_password_change(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.require_password_change)
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            user: None,
            auth_error: None,
            loading: false,
            initialized: false,
        }
    }
}

/// Notifications for navigation and rendering collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// First bootstrap finished, whatever its outcome
    Initialized,
    LoggedIn,
    Registered,
    /// Local credentials cleared; navigate to `redirect_to`
    LoggedOut { redirect_to: String },
    /// Stored credentials were rejected and could not be refreshed
    SessionExpired,
}
