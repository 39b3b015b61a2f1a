//! Session client configuration
//!
//! Configuration is loaded from environment variables, falling back to
//! defaults that match the club site's development setup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Remote auth API configuration
    pub api: ApiConfig,

    /// Token persistence configuration
    pub store: StoreConfig,

    /// Route guard paths
    pub guard: GuardConfig,
}

/// Remote auth API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL the `/auth/*` endpoints hang off
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Token persistence configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// JSON file holding the access/refresh token pair
    pub token_path: PathBuf,
}

/// Route guard paths
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub login_path: String,
    pub register_path: String,
    pub change_password_path: String,
    /// Where signed-in users land
    pub home_path: String,
    /// Where signed-in admins land
    pub admin_home_path: String,
    /// Everything under this prefix needs an admin role
    pub admin_prefix: String,
    /// Everything under these prefixes needs a signed-in user
    pub protected_prefixes: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(".clubsession/tokens.json"),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            register_path: "/register".to_string(),
            change_password_path: "/change-password".to_string(),
            home_path: "/".to_string(),
            admin_home_path: "/admin".to_string(),
            admin_prefix: "/admin".to_string(),
            protected_prefixes: vec!["/profile".to_string(), "/change-password".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // API config
        if let Ok(url) = env::var("AUTH_API_BASE_URL")
            && !url.is_empty()
        {
            config.api.base_url = url;
        }
        if let Ok(val) = env::var("AUTH_API_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.api.timeout = Duration::from_secs(secs);
        }

        // Store config
        if let Ok(path) = env::var("TOKEN_STORE_PATH")
            && !path.is_empty()
        {
            config.store.token_path = PathBuf::from(path);
        }

        // Guard config
        if let Ok(path) = env::var("LOGIN_PATH")
            && !path.is_empty()
        {
            config.guard.login_path = path;
        }
        if let Ok(path) = env::var("REGISTER_PATH")
            && !path.is_empty()
        {
            config.guard.register_path = path;
        }
        if let Ok(path) = env::var("CHANGE_PASSWORD_PATH")
            && !path.is_empty()
        {
            config.guard.change_password_path = path;
        }
        if let Ok(path) = env::var("HOME_PATH")
            && !path.is_empty()
        {
            config.guard.home_path = path;
        }
        if let Ok(path) = env::var("ADMIN_HOME_PATH")
            && !path.is_empty()
        {
            config.guard.admin_home_path = path;
        }
        if let Ok(prefix) = env::var("ADMIN_PREFIX")
            && !prefix.is_empty()
        {
            config.guard.admin_prefix = prefix;
        }
        if let Ok(val) = env::var("PROTECTED_PREFIXES") {
            config.guard.protected_prefixes = val
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }
}
