//! Club Session Library
//!
//! Authentication session lifecycle for the VLSI club site: token
//! persistence, bootstrap profile check with silent refresh, login,
//! registration, logout and the route guard policy built on top.

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use api::{ApiError, AuthApi, HttpAuthApi, RegisterRequest};
pub use config::Config;
pub use error::{AuthError, AuthOutcome};
pub use guard::{GuardDecision, RouteClass, RouteGuard};
pub use session::manager::SessionManager;
pub use session::state::{Role, SessionEvent, SessionSnapshot, SessionStatus, UserProfile};
pub use store::{FileTokenStore, MemoryTokenStore, TokenKey, TokenStore};
