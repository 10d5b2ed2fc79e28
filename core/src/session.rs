//! Session manager: token persistence, bootstrap validation, login/logout,
//! and the authenticated-request capability.
//!
//! # Design
//! Three observable phases: `Bootstrapping` at construction, then
//! `Authenticated` or `Unauthenticated`, moving between the latter two on
//! login, logout, and server-side token invalidation. The manager is an
//! explicit collaborator handed to whoever needs identity; there is no
//! process-wide singleton.
//!
//! Every session-mutating operation (bootstrap, login, logout, forced
//! logout) runs under one async mutex, so credential-store writes never
//! interleave. State snapshots use a separate std mutex that is never held
//! across an await. `authed_request` reads the token current at its own
//! invocation and is otherwise unserialized; concurrent requests may
//! complete in any order.

use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::RiderConfig;
use crate::error::{ApiError, SessionErrorCode};
use crate::http::{HttpClient, HttpTransport, RequestOptions};
use crate::storage::{self, CredentialStore, StorageError};
use crate::types::Rider;

/// Snapshot of the in-memory session state.
///
/// An absent `token` means unauthenticated, full stop: `rider` is a cached
/// profile and `last_error` a diagnostic, and neither carries authentication
/// weight on its own. While `bootstrapping` is true, `token` and `rider` are
/// not yet authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub bootstrapping: bool,
    pub token: Option<String>,
    pub rider: Option<Rider>,
    pub last_error: Option<SessionErrorCode>,
}

impl Session {
    fn initial() -> Self {
        Self {
            bootstrapping: true,
            token: None,
            rider: None,
            last_error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Verdict of validating a stored token against the "who am I" endpoint.
enum TokenValidation {
    /// Server confirmed the token and returned a fresh profile.
    Confirmed(Rider),
    /// Server confirmed the token but the body carried no usable profile;
    /// fall back to the cached one.
    ConfirmedWithoutProfile,
    /// Server explicitly invalidated the token.
    Rejected(SessionErrorCode),
    /// No verdict: network trouble, server error, or an unrecognized error
    /// code. The stored session is kept (offline continuation policy).
    NoVerdict,
}

/// Owns the process-wide session: in-memory state, the credential store, and
/// the HTTP client every authenticated call goes through.
pub struct SessionManager<S, T> {
    store: S,
    http: HttpClient<T>,
    state: Mutex<Session>,
    /// Single-writer queue for session-mutating operations.
    op_lock: tokio::sync::Mutex<()>,
}

impl<S: CredentialStore, T: HttpTransport> SessionManager<S, T> {
    /// Create a manager in the `Bootstrapping` phase. Call [`bootstrap`]
    /// before treating the session as authoritative.
    ///
    /// [`bootstrap`]: SessionManager::bootstrap
    pub fn new(config: RiderConfig, store: S, transport: T) -> Self {
        Self {
            store,
            http: HttpClient::new(config, transport),
            state: Mutex::new(Session::initial()),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.lock_state().clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and validate any persisted session. Intended to run once at
    /// process start; never fails outward, and always leaves
    /// `bootstrapping` false.
    ///
    /// With no stored token the session comes up unauthenticated. With one,
    /// the server's "who am I" endpoint decides: confirmation refreshes the
    /// cached profile, explicit rejection wipes the store, and anything
    /// short of a verdict keeps the stored session with `ME_CHECK_FAILED`
    /// recorded (transient connectivity must not log the rider out).
    pub async fn bootstrap(&self) {
        let _guard = self.op_lock.lock().await;
        let next = match self.run_bootstrap().await {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %err, "bootstrap failed, coming up unauthenticated");
                Session {
                    bootstrapping: false,
                    token: None,
                    rider: None,
                    last_error: Some(SessionErrorCode::BootstrapFailed),
                }
            }
        };
        *self.lock_state() = next;
    }

    async fn run_bootstrap(&self) -> Result<Session, StorageError> {
        let stored_token = storage::stored_token(&self.store)?;
        let cached_rider = storage::stored_rider(&self.store)?;

        let Some(token) = stored_token else {
            return Ok(Session {
                bootstrapping: false,
                token: None,
                rider: None,
                last_error: None,
            });
        };

        match self.validate_token(&token).await {
            TokenValidation::Confirmed(rider) => {
                if let Err(err) = storage::persist_rider(&self.store, &rider) {
                    warn!(error = %err, "could not refresh cached rider profile");
                }
                Ok(Session {
                    bootstrapping: false,
                    token: Some(token),
                    rider: Some(rider),
                    last_error: None,
                })
            }
            TokenValidation::ConfirmedWithoutProfile => Ok(Session {
                bootstrapping: false,
                token: Some(token),
                rider: cached_rider,
                last_error: None,
            }),
            TokenValidation::Rejected(code) => {
                debug!(code = %code, "stored token rejected, clearing credentials");
                storage::clear_credentials(&self.store)?;
                Ok(Session {
                    bootstrapping: false,
                    token: None,
                    rider: None,
                    last_error: Some(code),
                })
            }
            TokenValidation::NoVerdict => Ok(Session {
                bootstrapping: false,
                token: Some(token),
                rider: cached_rider,
                last_error: Some(SessionErrorCode::MeCheckFailed),
            }),
        }
    }

    async fn validate_token(&self, token: &str) -> TokenValidation {
        match self
            .http
            .request("/rider/auth/me", RequestOptions::get().with_token(token))
            .await
        {
            Ok(data) => {
                let rider = data
                    .as_ref()
                    .and_then(|d| d.get("rider"))
                    .cloned()
                    .and_then(|v| serde_json::from_value::<Rider>(v).ok());
                match rider {
                    Some(rider) => TokenValidation::Confirmed(rider),
                    None => TokenValidation::ConfirmedWithoutProfile,
                }
            }
            Err(err) => match err.auth_rejection_code() {
                Some(code) => TokenValidation::Rejected(code),
                None => {
                    debug!(error = %err, "session check failed, keeping stored session");
                    TokenValidation::NoVerdict
                }
            },
        }
    }

    /// Exchange credentials for a session. On success the token and profile
    /// are persisted before the in-memory state flips to authenticated, and
    /// both are returned to the caller.
    ///
    /// A 2xx response missing either field is a server contract violation:
    /// the operation fails with [`ApiError::InvalidLoginResponse`], records
    /// `LOGIN_RESPONSE_INVALID`, and leaves the session unauthenticated.
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, Rider), ApiError> {
        let _guard = self.op_lock.lock().await;
        self.lock_state().last_error = None;

        let data = self
            .http
            .request(
                "/rider/auth/login",
                RequestOptions::post().with_body(json!({
                    "username": username,
                    "password": password,
                })),
            )
            .await?;

        let token = data
            .as_ref()
            .and_then(|d| d.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let rider = data
            .as_ref()
            .and_then(|d| d.get("rider"))
            .cloned()
            .and_then(|v| serde_json::from_value::<Rider>(v).ok());

        let (Some(token), Some(rider)) = (token, rider) else {
            self.lock_state().last_error = Some(SessionErrorCode::LoginResponseInvalid);
            return Err(ApiError::InvalidLoginResponse);
        };

        storage::persist_token(&self.store, &token)?;
        storage::persist_rider(&self.store, &rider)?;

        {
            let mut state = self.lock_state();
            state.token = Some(token.clone());
            state.rider = Some(rider.clone());
            state.last_error = None;
        }
        debug!(username, "login succeeded");
        Ok((token, rider))
    }

    /// End the session. The server logout call is best-effort and its
    /// failure swallowed; the local wipe and state reset happen regardless,
    /// so logout always succeeds when the store cooperates and is idempotent.
    pub async fn logout(&self, best_effort_server_logout: bool) -> Result<(), ApiError> {
        let _guard = self.op_lock.lock().await;
        let token = self.lock_state().token.clone();

        if best_effort_server_logout {
            if let Some(token) = &token {
                if let Err(err) = self
                    .http
                    .request("/rider/auth/logout", RequestOptions::post().with_token(token))
                    .await
                {
                    debug!(error = %err, "best-effort server logout failed, continuing");
                }
            }
        }

        storage::clear_credentials(&self.store)?;
        let mut state = self.lock_state();
        state.token = None;
        state.rider = None;
        state.last_error = None;
        Ok(())
    }

    /// Execute a request with the current session token attached.
    ///
    /// Fails with [`ApiError::NotAuthenticated`] before any network traffic
    /// when no token is present. When the server answers 401 with a
    /// recognized token code, the manager wipes the credential store, resets
    /// the in-memory session, records the code, and only then re-raises the
    /// original error. Callers must not assume an error means nothing
    /// happened.
    pub async fn authed_request(
        &self,
        path: &str,
        mut options: RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        let Some(token) = self.lock_state().token.clone() else {
            return Err(ApiError::NotAuthenticated);
        };
        options.token = Some(token);

        match self.http.request(path, options).await {
            Ok(data) => Ok(data),
            Err(err) => {
                if let Some(code) = err.auth_rejection_code() {
                    self.force_logout(code).await;
                }
                Err(err)
            }
        }
    }

    /// Local logout in response to a server-side token invalidation. Keeps
    /// the credential store and in-memory state from diverging; storage
    /// trouble here is logged rather than raised so the original error
    /// still reaches the caller.
    async fn force_logout(&self, code: SessionErrorCode) {
        let _guard = self.op_lock.lock().await;
        warn!(code = %code, "server invalidated session, forcing local logout");
        if let Err(err) = storage::clear_credentials(&self.store) {
            warn!(error = %err, "could not clear credential store during forced logout");
        }
        let mut state = self.lock_state();
        state.token = None;
        state.rider = None;
        state.last_error = Some(code);
    }

    fn lock_state(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::{self, CredentialStore, MemoryStore, StorageError, RIDER_KEY, TOKEN_KEY};
    use crate::testutil::FakeTransport;

    fn manager(transport: FakeTransport) -> SessionManager<MemoryStore, FakeTransport> {
        SessionManager::new(
            RiderConfig::new("http://localhost:4000"),
            MemoryStore::new(),
            transport,
        )
    }

    fn rider_json() -> Value {
        json!({ "id": 1, "username": "rider_01", "name": "Asha", "isActive": true })
    }

    fn rider() -> Rider {
        serde_json::from_value(rider_json()).unwrap()
    }

    fn seed_stored_session(store: &MemoryStore, token: &str) {
        storage::persist_token(store, token).unwrap();
        storage::persist_rider(store, &rider()).unwrap();
    }

    #[test]
    fn starts_in_bootstrapping_phase() {
        let mgr = manager(FakeTransport::new());
        let session = mgr.session();
        assert!(session.bootstrapping);
        assert!(!session.is_authenticated());
        assert!(session.last_error.is_none());
    }

    #[tokio::test]
    async fn bootstrap_without_stored_token_is_unauthenticated() {
        let transport = FakeTransport::new();
        let mgr = manager(transport.clone());

        mgr.bootstrap().await;

        let session = mgr.session();
        assert!(!session.bootstrapping);
        assert!(session.token.is_none());
        assert!(session.rider.is_none());
        assert!(session.last_error.is_none());
        assert_eq!(transport.request_count(), 0, "no token, no network");
    }

    #[tokio::test]
    async fn bootstrap_with_confirmed_token_adopts_fresh_profile() {
        let transport = FakeTransport::new();
        let fresh = json!({ "id": 1, "username": "rider_01", "name": "Asha K", "isActive": true });
        transport.push_response(200, &json!({ "rider": fresh }).to_string());
        let mgr = manager(transport.clone());
        seed_stored_session(mgr.store(), "abc");

        mgr.bootstrap().await;

        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(session.rider.as_ref().unwrap().name.as_deref(), Some("Asha K"));
        assert!(session.last_error.is_none());

        // Cache refreshed with the server's profile.
        let cached = storage::stored_rider(mgr.store()).unwrap().unwrap();
        assert_eq!(cached.name.as_deref(), Some("Asha K"));

        // Validation call carried the stored token.
        let sent = transport.take_requests();
        assert!(sent[0]
            .headers
            .contains(&("authorization".to_string(), "Bearer abc".to_string())));
    }

    #[tokio::test]
    async fn bootstrap_with_rejected_token_wipes_everything() {
        let transport = FakeTransport::new();
        transport.push_response(401, r#"{"error":"TOKEN_REVOKED"}"#);
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");

        mgr.bootstrap().await;

        let session = mgr.session();
        assert!(session.token.is_none());
        assert!(session.rider.is_none());
        assert_eq!(session.last_error, Some(SessionErrorCode::TokenRevoked));
        assert!(mgr.store().get(TOKEN_KEY).unwrap().is_none());
        assert!(mgr.store().get(RIDER_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_keeps_session_when_validation_unreachable() {
        let transport = FakeTransport::new();
        transport.push_transport_error("connection refused");
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");

        mgr.bootstrap().await;

        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(session.rider, Some(rider()));
        assert_eq!(session.last_error, Some(SessionErrorCode::MeCheckFailed));
        // Stored credentials untouched.
        assert!(mgr.store().get(TOKEN_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn bootstrap_keeps_session_on_unrecognized_401() {
        let transport = FakeTransport::new();
        transport.push_response(401, r#"{"error":"ACCOUNT_SUSPENDED"}"#);
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");

        mgr.bootstrap().await;

        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(session.last_error, Some(SessionErrorCode::MeCheckFailed));
    }

    #[tokio::test]
    async fn bootstrap_keeps_session_on_server_error() {
        let transport = FakeTransport::new();
        transport.push_response(500, r#"{"message":"internal"}"#);
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");

        mgr.bootstrap().await;

        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(session.last_error, Some(SessionErrorCode::MeCheckFailed));
    }

    struct FailingStore;

    impl CredentialStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Backend("keychain unavailable".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("keychain unavailable".to_string()))
        }
        fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("keychain unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn bootstrap_storage_failure_fails_safe() {
        let mgr = SessionManager::new(
            RiderConfig::new("http://localhost:4000"),
            FailingStore,
            FakeTransport::new(),
        );

        mgr.bootstrap().await;

        let session = mgr.session();
        assert!(!session.bootstrapping, "bootstrapping must never stay stuck");
        assert!(session.token.is_none());
        assert_eq!(session.last_error, Some(SessionErrorCode::BootstrapFailed));
    }

    #[tokio::test]
    async fn login_success_updates_state_and_storage() {
        let transport = FakeTransport::new();
        transport.push_response(
            200,
            &json!({ "token": "abc", "rider": rider_json() }).to_string(),
        );
        let mgr = manager(transport.clone());

        let (token, profile) = mgr.login("rider_01", "secret").await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(profile.username, "rider_01");

        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(session.rider, Some(rider()));
        assert!(session.last_error.is_none());

        assert_eq!(storage::stored_token(mgr.store()).unwrap().as_deref(), Some("abc"));
        assert_eq!(storage::stored_rider(mgr.store()).unwrap(), Some(rider()));

        let sent = transport.take_requests();
        let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({ "username": "rider_01", "password": "secret" }));
    }

    #[tokio::test]
    async fn login_response_missing_token_is_a_contract_violation() {
        let transport = FakeTransport::new();
        transport.push_response(200, &json!({ "rider": rider_json() }).to_string());
        let mgr = manager(transport);

        let err = mgr.login("rider_01", "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidLoginResponse));

        let session = mgr.session();
        assert!(session.token.is_none());
        assert_eq!(session.last_error, Some(SessionErrorCode::LoginResponseInvalid));
        // Nothing was persisted.
        assert!(storage::stored_token(mgr.store()).unwrap().is_none());
    }

    #[tokio::test]
    async fn login_response_missing_rider_is_a_contract_violation() {
        let transport = FakeTransport::new();
        transport.push_response(200, r#"{"token":"abc"}"#);
        let mgr = manager(transport);

        let err = mgr.login("rider_01", "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidLoginResponse));
        assert!(mgr.session().token.is_none());
    }

    #[tokio::test]
    async fn login_http_failure_propagates_and_clears_last_error_only() {
        let transport = FakeTransport::new();
        transport.push_response(401, r#"{"error":"INVALID_CREDENTIALS"}"#);
        let mgr = manager(transport);
        mgr.lock_state().last_error = Some(SessionErrorCode::MeCheckFailed);

        let err = mgr.login("rider_01", "wrong").await.unwrap_err();
        assert_eq!(err.user_message(), "INVALID_CREDENTIALS");

        let session = mgr.session();
        assert!(session.token.is_none());
        assert!(session.last_error.is_none(), "login clears last_error up front");
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_never_throws() {
        let transport = FakeTransport::new();
        // First logout has a token and tries the server; the failure is
        // swallowed. Second logout has no token and stays local.
        transport.push_response(500, "");
        let mgr = manager(transport.clone());
        seed_stored_session(mgr.store(), "abc");
        {
            let mut state = mgr.lock_state();
            state.token = Some("abc".to_string());
            state.rider = Some(rider());
        }

        mgr.logout(true).await.unwrap();
        mgr.logout(true).await.unwrap();

        let session = mgr.session();
        assert!(session.token.is_none());
        assert!(session.rider.is_none());
        assert!(storage::stored_token(mgr.store()).unwrap().is_none());
        assert_eq!(transport.request_count(), 1, "no token, no server call");
    }

    #[tokio::test]
    async fn logout_can_skip_server_call() {
        let transport = FakeTransport::new();
        let mgr = manager(transport.clone());
        mgr.lock_state().token = Some("abc".to_string());

        mgr.logout(false).await.unwrap();

        assert_eq!(transport.request_count(), 0);
        assert!(mgr.session().token.is_none());
    }

    #[tokio::test]
    async fn authed_request_without_token_fails_before_network() {
        let transport = FakeTransport::new();
        let mgr = manager(transport.clone());

        let err = mgr
            .authed_request("/rider/orders/available", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn authed_request_attaches_current_token() {
        let transport = FakeTransport::new();
        transport.push_response(200, r#"{"orders":[]}"#);
        let mgr = manager(transport.clone());
        mgr.lock_state().token = Some("abc".to_string());

        mgr.authed_request("/rider/orders/available", RequestOptions::get())
            .await
            .unwrap();

        let sent = transport.take_requests();
        assert!(sent[0]
            .headers
            .contains(&("authorization".to_string(), "Bearer abc".to_string())));
    }

    #[tokio::test]
    async fn authed_request_token_invalid_forces_logout_then_reraises() {
        let transport = FakeTransport::new();
        transport.push_response(401, r#"{"error":"TOKEN_INVALID"}"#);
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");
        {
            let mut state = mgr.lock_state();
            state.token = Some("abc".to_string());
            state.rider = Some(rider());
        }

        let err = mgr
            .authed_request("/rider/orders/active", RequestOptions::get())
            .await
            .unwrap_err();

        // Original error re-raised to the caller.
        assert_eq!(err.user_message(), "TOKEN_INVALID");
        // Side effects already happened.
        let session = mgr.session();
        assert!(session.token.is_none());
        assert!(session.rider.is_none());
        assert_eq!(session.last_error, Some(SessionErrorCode::TokenInvalid));
        assert!(storage::stored_token(mgr.store()).unwrap().is_none());
        assert!(storage::stored_rider(mgr.store()).unwrap().is_none());
    }

    #[tokio::test]
    async fn authed_request_other_failures_do_not_touch_the_session() {
        let transport = FakeTransport::new();
        transport.push_response(500, r#"{"message":"internal"}"#);
        let mgr = manager(transport);
        seed_stored_session(mgr.store(), "abc");
        mgr.lock_state().token = Some("abc".to_string());

        let err = mgr
            .authed_request("/rider/orders/active", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "HTTP_500");
        let session = mgr.session();
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert!(session.last_error.is_none());
        assert!(storage::stored_token(mgr.store()).unwrap().is_some());
    }
}
