use crate::api::{ApiError, AuthApi, AuthResponse, RegisterRequest};
use crate::error::AuthError;
use crate::session::state::{SessionEvent, SessionSnapshot, SessionStatus, UserProfile};
use crate::session::validation;
use crate::store::{TokenKey, TokenStore};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tracing::{debug, info, warn};

const LOGIN_FALLBACK: &str = "Login failed. Please try again";
const REGISTER_FALLBACK: &str = "Registration failed. Please try again";
const VERIFY_FALLBACK: &str = "Unable to verify your session";

const DEFAULT_LOGIN_PATH: &str = "/login";
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Mutable session data, guarded by the manager's lock
#[derive(Debug)]
struct SessionInner {
    status: SessionStatus,
    user: Option<UserProfile>,
    auth_error: Option<String>,
    initialized: bool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            user: None,
            auth_error: None,
            initialized: false,
        }
    }

    fn to_snapshot(&self, loading: bool) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status.clone(),
            user: self.user.clone(),
            auth_error: self.auth_error.clone(),
            loading,
            initialized: self.initialized,
        }
    }

    fn authenticate(&mut self, user: UserProfile) {
        self.user = Some(user);
        self.auth_error = None;
        self.status = SessionStatus::Authenticated;
    }

    fn reset(&mut self) {
        self.user = None;
        self.auth_error = None;
        self.status = SessionStatus::Unauthenticated;
    }
}

/// Result of the bootstrap profile check
#[derive(Debug)]
enum Bootstrap {
    NoToken,
    Verified(UserProfile),
    /// Credentials rejected and refresh impossible or failed
    Expired,
    /// Non-credential failure, tokens must be kept
    Failed(String),
    /// A newer operation took over; leave tokens and state alone
    Superseded,
}

/// Keeps `loading` true while at least one operation is in flight
struct InFlight<'a> {
    manager: &'a SessionManager,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let remaining = self.manager.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.manager
            .snapshot_tx
            .send_modify(|s| s.loading = remaining > 0);
    }
}

/// Owns the authenticated-user lifecycle.
///
/// Construct one per process (or per test) with an API client and a token
/// store. Reads go through `snapshot()` and the predicates; every state
/// transition is published to `watch_session()` subscribers.
///
/// Overlapping operations are sequenced by a generation counter: login,
/// register and logout each start a new generation, and a response is only
/// applied if its generation is still current. A committed login or register
/// advances it again so a bootstrap begun earlier cannot overwrite it. Stale
/// results come back as `AuthError::Superseded` without touching state or
/// tokens.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionInner>,
    /// Held for the duration of a bootstrap so concurrent `init` calls run it once
    bootstrap: Mutex<()>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    login_path: String,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            api,
            store,
            state: RwLock::new(SessionInner::new()),
            bootstrap: Mutex::new(()),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            snapshot_tx,
            events,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    /// Route sent with `SessionEvent::LoggedOut`
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive a new snapshot after every state change
    pub fn watch_session(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Receive navigation-relevant events (login, logout, expiry)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot_tx.borrow().status.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.snapshot_tx.borrow().user.clone()
    }

    pub fn auth_error(&self) -> Option<String> {
        self.snapshot_tx.borrow().auth_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot_tx.borrow().initialized
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot_tx.borrow().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot_tx.borrow().is_admin()
    }

    pub fn is_super_admin(&self) -> bool {
        self.snapshot_tx.borrow().is_super_admin()
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Bootstrap the session from persisted tokens.
    ///
    /// Runs the profile check once per manager. Later calls return the current
    /// status without touching the network, except when the previous check
    /// ended in `SessionStatus::Error`, in which case the check is retried.
    pub async fn init(&self) -> SessionStatus {
        let _bootstrap = self.bootstrap.lock().await;

        {
            let state = self.state.read().await;
            if state.initialized && !matches!(state.status, SessionStatus::Error { .. }) {
                debug!("Session already initialized, skipping bootstrap");
                return state.status.clone();
            }
        }

        let _op = self.track();
        let generation = self.generation.load(Ordering::SeqCst);

        {
            let mut state = self.state.write().await;
            if self.is_current(generation) {
                state.status = SessionStatus::Checking;
                self.publish(&state);
            }
        }

        let outcome = self.check_session(generation).await;
        self.finish_bootstrap(generation, outcome).await
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        counter!("club_session_logins_total").increment(1);

        let request = match validation::login_request(email, password) {
            Ok(request) => request,
            Err(e) => return Err(self.record_failure(None, e).await),
        };

        let _op = self.track();
        let generation = self.begin_attempt().await;
        let start = Instant::now();

        debug!("Logging in {}", request.email);
        let result = match self.api.login(&request).await {
            Ok(response) => self.establish(generation, response).await,
            Err(e) => Err(AuthError::from_api(e, LOGIN_FALLBACK)),
        };
        histogram!("club_session_login_duration_seconds").record(start.elapsed());

        match result {
            Ok(user) => {
                info!("Logged in {} as {:?}", request.email, user.role);
                self.emit(SessionEvent::LoggedIn);
                Ok(user)
            }
            Err(e) => {
                counter!("club_session_login_failures_total", "reason" => e.kind()).increment(1);
                Err(self.record_failure(Some(generation), e).await)
            }
        }
    }

    /// Create an account and sign in with it
    pub async fn register(&self, profile: RegisterRequest) -> Result<UserProfile, AuthError> {
        counter!("club_session_registrations_total").increment(1);

        let request = match validation::register_request(profile) {
            Ok(request) => request,
            Err(e) => return Err(self.record_failure(None, e).await),
        };

        let _op = self.track();
        let generation = self.begin_attempt().await;

        debug!("Registering {}", request.email);
        let result = match self.api.register(&request).await {
            Ok(response) => self.establish(generation, response).await,
            Err(e) => Err(AuthError::from_api(e, REGISTER_FALLBACK)),
        };

        match result {
            Ok(user) => {
                info!("Registered {}", request.email);
                self.emit(SessionEvent::Registered);
                Ok(user)
            }
            Err(e) => {
                counter!("club_session_registration_failures_total", "reason" => e.kind())
                    .increment(1);
                Err(self.record_failure(Some(generation), e).await)
            }
        }
    }

    /// Sign out.
    ///
    /// Local credentials are cleared first and unconditionally; the server is
    /// then told on a best-effort basis and its failures are only logged.
    /// Always emits `SessionEvent::LoggedOut`.
    pub async fn logout(&self) -> Result<(), AuthError> {
        counter!("club_session_logouts_total").increment(1);
        let _op = self.track();
        self.generation.fetch_add(1, Ordering::SeqCst);

        let access_token = self.store.get(TokenKey::Access).unwrap_or_else(|e| {
            warn!("Could not read access token during logout: {}", e);
            None
        });

        let cleared = {
            let mut state = self.state.write().await;
            let cleared = self.store.clear_tokens();
            state.reset();
            self.publish(&state);
            cleared
        };

        if let Some(token) = access_token
            && let Err(e) = self.api.logout(&token).await
        {
            warn!("Server-side logout failed, local session cleared anyway: {}", e);
        }

        info!("Logged out");
        self.emit(SessionEvent::LoggedOut {
            redirect_to: self.login_path.clone(),
        });

        cleared.map_err(|e| {
            warn!("Failed to clear stored tokens: {}", e);
            AuthError::from(e)
        })
    }

    /// Drop the last error message without touching anything else
    pub async fn clear_error(&self) {
        let mut state = self.state.write().await;
        if state.auth_error.take().is_some() {
            self.publish(&state);
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn track(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.snapshot_tx.send_modify(|s| s.loading = true);
        InFlight { manager: self }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, state: &SessionInner) {
        let loading = self.in_flight.load(Ordering::SeqCst) > 0;
        self.snapshot_tx.send_replace(state.to_snapshot(loading));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Start a new generation and clear the stale error of the previous attempt
    async fn begin_attempt(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;
        if state.auth_error.take().is_some() {
            self.publish(&state);
        }
        generation
    }

    /// Store `err` as the visible error unless the attempt was superseded
    async fn record_failure(&self, generation: Option<u64>, err: AuthError) -> AuthError {
        if err == AuthError::Superseded {
            return err;
        }

        let mut state = self.state.write().await;
        if generation.is_none_or(|g| self.is_current(g)) {
            warn!("Authentication failed ({}): {}", err.kind(), err);
            state.auth_error = Some(err.to_string());
            self.publish(&state);
        } else {
            debug!("Discarding failure of superseded attempt: {}", err);
        }
        err
    }

    /// Validate a login/register response and make it the current session
    async fn establish(
        &self,
        generation: u64,
        response: AuthResponse,
    ) -> Result<UserProfile, AuthError> {
        let AuthResponse {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            user: Some(user),
        } = response
        else {
            warn!("Auth response missing access token, refresh token or user");
            return Err(AuthError::InvalidResponseShape);
        };
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::InvalidResponseShape);
        }

        let mut state = self.state.write().await;
        if !self.is_current(generation) {
            debug!("Discarding superseded auth response");
            return Err(AuthError::Superseded);
        }

        self.store.set_tokens(&access_token, &refresh_token)?;
        // Any bootstrap still checking the old tokens is now stale
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.authenticate(user.clone());
        self.publish(&state);
        Ok(user)
    }

    async fn check_session(&self, generation: u64) -> Bootstrap {
        let access_token = match self.store.get(TokenKey::Access) {
            Ok(Some(token)) => token,
            Ok(None) => return Bootstrap::NoToken,
            Err(e) => {
                warn!("Could not read stored access token: {}", e);
                return Bootstrap::Failed(AuthError::from(e).to_string());
            }
        };

        match self.api.profile(&access_token).await {
            Ok(user) => Bootstrap::Verified(user),
            Err(e) if e.is_unauthorized() => {
                info!("Access token rejected, attempting silent refresh");
                self.silent_refresh(generation).await
            }
            Err(e) => Bootstrap::Failed(Self::verify_failure_message(e)),
        }
    }

    /// One refresh, then one profile retry. No retry loop.
    async fn silent_refresh(&self, generation: u64) -> Bootstrap {
        if !self.is_current(generation) {
            debug!("Session changed during check, skipping refresh");
            return Bootstrap::Superseded;
        }

        let refresh_token = match self.store.get(TokenKey::Refresh) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored");
                counter!("club_session_refresh_total", "outcome" => "missing").increment(1);
                return Bootstrap::Expired;
            }
            Err(e) => {
                warn!("Could not read stored refresh token: {}", e);
                return Bootstrap::Expired;
            }
        };

        let response = match self.api.refresh(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Token refresh failed: {}", e);
                counter!("club_session_refresh_total", "outcome" => "rejected").increment(1);
                return Bootstrap::Expired;
            }
        };

        let Some(access_token) = response.access_token.filter(|t| !t.is_empty()) else {
            debug!("Refresh response carried no access token");
            counter!("club_session_refresh_total", "outcome" => "invalid").increment(1);
            return Bootstrap::Expired;
        };

        {
            let _state = self.state.write().await;
            if !self.is_current(generation) {
                return Bootstrap::Superseded;
            }
            let rotated = response
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or(refresh_token);
            if let Err(e) = self.store.set_tokens(&access_token, &rotated) {
                warn!("Could not persist refreshed tokens: {}", e);
                return Bootstrap::Failed(AuthError::from(e).to_string());
            }
        }
        counter!("club_session_refresh_total", "outcome" => "success").increment(1);

        match self.api.profile(&access_token).await {
            Ok(user) => Bootstrap::Verified(user),
            Err(e) if e.is_unauthorized() => Bootstrap::Expired,
            Err(e) => Bootstrap::Failed(Self::verify_failure_message(e)),
        }
    }

    fn verify_failure_message(err: ApiError) -> String {
        warn!("Session check failed: {}", err);
        match AuthError::from_api(err, VERIFY_FALLBACK) {
            AuthError::InvalidResponseShape => VERIFY_FALLBACK.to_string(),
            other => other.to_string(),
        }
    }

    async fn finish_bootstrap(&self, generation: u64, outcome: Bootstrap) -> SessionStatus {
        let mut expired = false;
        let (status, first) = {
            let mut state = self.state.write().await;
            let first = !state.initialized;
            state.initialized = true;

            if self.is_current(generation) {
                match outcome {
                    Bootstrap::NoToken => {
                        debug!("No stored session");
                        state.reset();
                    }
                    Bootstrap::Verified(user) => {
                        info!("Restored session for {:?} user", user.role);
                        state.authenticate(user);
                    }
                    Bootstrap::Expired => {
                        info!("Stored session expired, clearing tokens");
                        if let Err(e) = self.store.clear_tokens() {
                            warn!("Failed to clear expired tokens: {}", e);
                        }
                        state.reset();
                        expired = true;
                    }
                    Bootstrap::Failed(message) => {
                        state.user = None;
                        state.auth_error = Some(message.clone());
                        state.status = SessionStatus::Error { message };
                    }
                    Bootstrap::Superseded => {}
                }
            } else {
                debug!("Session changed during bootstrap, keeping newer state");
            }

            self.publish(&state);
            (state.status.clone(), first)
        };

        if expired {
            self.emit(SessionEvent::SessionExpired);
        }
        if first {
            self.emit(SessionEvent::Initialized);
        }
        status
    }
}
