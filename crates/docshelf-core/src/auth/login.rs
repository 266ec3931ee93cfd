//! The top-level login coordinator.
//!
//! Owns the reachability state machine (debounced, superseding probes)
//! and the credential validation sequence that turns a successful login
//! into a persistable [`StoredConnection`].

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{Connection, RepositoryError, StoredConnection, UserRepository},
    auth::{probe, token::fetch_token},
    error::{LoginError, RequestError},
    http::{self, ExtraHeader},
    net::{derive_url, strip_scheme_prefix, Scheme},
    store::SecretStore,
    tls::IdentityProvider,
};

/// How long the host input must be stable before a probe is issued.
pub const PROBE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Reachability of the currently entered server URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginState {
    /// No input yet.
    #[default]
    Empty,
    /// A probe is pending or in flight.
    Checking,
    /// The server answered the probe with a compatible API.
    Valid,
    /// The probe failed; see the carried error kind.
    Error(LoginError),
}

/// Progress of the credential validation sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialState {
    /// Validation has not started.
    #[default]
    None,
    /// Validation is running.
    Validating,
    /// The credentials were accepted and the connection persisted.
    Valid,
    /// Validation failed; see the carried error kind.
    Error(LoginError),
}

/// The authentication protocol chosen for a login attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialMode {
    /// Exchange a username/password pair for a token.
    #[default]
    UsernameAndPassword,
    /// Use a user-supplied static token directly.
    Token,
    /// No credentials (anonymous or proxy-authenticated servers).
    None,
}

// Probe bookkeeping shared with spawned probe tasks. The generation
// counter is the write guard: only the probe matching the current
// generation may publish a state, and both cancellation and the
// generation check happen under the same lock as the publish.
struct ProbeShared {
    guard: Mutex<ProbeGuard>,
    login_state: watch::Sender<LoginState>,
}

struct ProbeGuard {
    generation: u64,
    cancel: CancellationToken,
}

impl ProbeShared {
    fn apply(&self, generation: u64, state: LoginState) {
        let guard = self.guard.lock().expect("probe guard lock poisoned");
        // An explicitly cancelled probe keeps its generation, so the token
        // is checked as well.
        if guard.generation == generation && !guard.cancel.is_cancelled() {
            self.login_state.send_replace(state);
        }
    }
}

/// Negotiates and validates a connection to a document-management server.
///
/// All mutation funnels through this struct; probe tasks it spawns only
/// publish their result when they are still the current probe. State is
/// observable through [`watch`] channels.
pub struct LoginCoordinator {
    store: Arc<dyn SecretStore>,
    repository: Arc<dyn UserRepository>,

    host_input: String,
    scheme: Scheme,

    /// The authentication protocol to run in [`Self::validate_credentials`].
    pub credential_mode: CredentialMode,
    /// Username for [`CredentialMode::UsernameAndPassword`].
    pub username: String,
    /// Password for [`CredentialMode::UsernameAndPassword`].
    pub password: String,
    /// Static token for [`CredentialMode::Token`].
    pub token: String,
    /// Extra headers applied to every request of this attempt.
    pub extra_headers: Vec<ExtraHeader>,
    /// Name of the TLS client identity to use, if any.
    pub selected_identity: Option<String>,

    shared: Arc<ProbeShared>,
    // Held so the login-state channel stays open without subscribers.
    _login_state_rx: watch::Receiver<LoginState>,
    credential_state: watch::Sender<CredentialState>,
    _credential_state_rx: watch::Receiver<CredentialState>,
}

impl LoginCoordinator {
    /// Create a coordinator with an explicit repository collaborator.
    pub fn new(store: Arc<dyn SecretStore>, repository: Arc<dyn UserRepository>) -> Self {
        let (login_state, login_state_rx) = watch::channel(LoginState::default());
        let (credential_state, credential_state_rx) = watch::channel(CredentialState::default());
        Self {
            store,
            repository,
            host_input: String::new(),
            scheme: Scheme::default(),
            credential_mode: CredentialMode::default(),
            username: String::new(),
            password: String::new(),
            token: String::new(),
            extra_headers: Vec::new(),
            selected_identity: None,
            shared: Arc::new(ProbeShared {
                guard: Mutex::new(ProbeGuard {
                    generation: 0,
                    cancel: CancellationToken::new(),
                }),
                login_state,
            }),
            _login_state_rx: login_state_rx,
            credential_state,
            _credential_state_rx: credential_state_rx,
        }
    }

    /// Create a coordinator backed by the HTTP repository implementation.
    pub fn with_api_repository(store: Arc<dyn SecretStore>) -> Self {
        let repository = Arc::new(crate::api::ApiRepository::new(store.clone()));
        Self::new(store, repository)
    }

    /// The host string as currently entered, scheme prefix stripped.
    pub fn host_input(&self) -> &str {
        &self.host_input
    }

    /// The currently selected scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Override the scheme selection without touching the host input.
    pub fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    /// The full candidate URL composed from scheme and host input.
    pub fn full_url(&self) -> String {
        self.scheme.compose(&self.host_input)
    }

    /// Current reachability state.
    pub fn login_state(&self) -> LoginState {
        self.shared.login_state.borrow().clone()
    }

    /// Subscribe to reachability state changes.
    pub fn subscribe_login_state(&self) -> watch::Receiver<LoginState> {
        self.shared.login_state.subscribe()
    }

    /// Whether the reachability state allows attempting a login. Errors
    /// count, so the user can retry.
    pub fn login_state_valid(&self) -> bool {
        matches!(self.login_state(), LoginState::Valid | LoginState::Error(_))
    }

    /// Current credential validation state.
    pub fn credential_state(&self) -> CredentialState {
        self.credential_state.borrow().clone()
    }

    /// Subscribe to credential state changes.
    pub fn subscribe_credential_state(&self) -> watch::Receiver<CredentialState> {
        self.credential_state.subscribe()
    }

    /// Handle an edit of the host input.
    ///
    /// A recognized scheme prefix is stripped off and taken over as the
    /// scheme selection. The previous probe is superseded: it is cancelled
    /// and its eventual result discarded. Unless `immediate` is set, the
    /// new probe waits out [`PROBE_DEBOUNCE`] first; an edit during the
    /// wait cancels it before any network call is issued.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_host_input_changed(&mut self, input: impl Into<String>, immediate: bool) {
        let input = input.into();
        let (scheme, remainder) = strip_scheme_prefix(&input);
        if let Some(scheme) = scheme {
            self.scheme = scheme;
        }
        self.host_input = remainder.to_string();
        self.restart_probe(immediate);
    }

    /// Cancel the in-flight probe, if any, without touching state.
    pub fn cancel_probe(&self) {
        let guard = self.shared.guard.lock().expect("probe guard lock poisoned");
        guard.cancel.cancel();
    }

    fn restart_probe(&self, immediate: bool) {
        let cancel = CancellationToken::new();
        let generation = {
            let mut guard = self.shared.guard.lock().expect("probe guard lock poisoned");
            guard.cancel.cancel();
            guard.generation += 1;
            guard.cancel = cancel.clone();

            if self.host_input.is_empty() {
                self.shared.login_state.send_replace(LoginState::Empty);
                return;
            }
            self.shared.login_state.send_replace(LoginState::Checking);
            guard.generation
        };

        let value = self.full_url();
        let shared = self.shared.clone();
        let store = self.store.clone();
        let identity_name = self.selected_identity.clone();
        let extra_headers = self.extra_headers.clone();

        tokio::spawn(async move {
            if !immediate {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(PROBE_DEBOUNCE) => {}
                }
            }

            let identity = IdentityProvider::new(store)
                .resolve(identity_name.as_deref())
                .await;
            let client = match http::build_client(identity.as_ref(), &extra_headers) {
                Ok(client) => client,
                Err(e) => {
                    shared.apply(generation, LoginState::Error(e));
                    return;
                }
            };

            // Dropping the probe future aborts the request; a cancelled
            // probe terminates without writing any state.
            let state = tokio::select! {
                _ = cancel.cancelled() => return,
                state = probe::check_url(&client, &value) => state,
            };
            shared.apply(generation, state);
        });
    }

    fn fail_validation(&self, error: LoginError) {
        self.credential_state
            .send_replace(CredentialState::Error(error));
    }

    /// Run the credential validation sequence for the current input.
    ///
    /// On success the returned [`StoredConnection`] has been fully
    /// validated against the server and its token, when one exists, has
    /// been persisted to the secure store.
    pub async fn validate_credentials(&self) -> Option<StoredConnection> {
        let full_url = self.full_url();
        info!("Validating credentials against url: {full_url}");
        self.credential_state
            .send_replace(CredentialState::Validating);

        // In principle the probe has already accepted this input, so
        // derivation should not fail here.
        let derived = match derive_url(&full_url, "token") {
            Ok(derived) => derived,
            Err(e) => {
                warn!("Error making URL for logging in (url: {full_url}): {e}");
                self.fail_validation(LoginError::InvalidUrl(e));
                return None;
            }
        };
        let base_url = derived.base;
        let token_url = derived.api;

        let identity = IdentityProvider::new(self.store.clone())
            .resolve(self.selected_identity.as_deref())
            .await;

        let make_connection = |token: Option<String>| Connection {
            base_url: base_url.clone(),
            token,
            extra_headers: self.extra_headers.clone(),
            identity_name: self.selected_identity.clone(),
        };

        let connection = match self.credential_mode {
            CredentialMode::UsernameAndPassword => {
                info!("Credential mode is username and password");
                let client = match http::build_client(identity.as_ref(), &self.extra_headers) {
                    Ok(client) => client,
                    Err(e) => {
                        self.fail_validation(e);
                        return None;
                    }
                };
                match fetch_token(&client, &token_url, &self.username, &self.password).await {
                    Ok(token) => {
                        info!("Username and password are valid, have token");
                        make_connection(Some(token))
                    }
                    Err(e) => {
                        self.fail_validation(e);
                        return None;
                    }
                }
            }
            CredentialMode::Token => make_connection(Some(self.token.clone())),
            CredentialMode::None => make_connection(None),
        };

        info!("Requesting current user");
        let user = match self.repository.current_user(&connection).await {
            Ok(user) => user,
            Err(RepositoryError::Forbidden) => {
                error!("User logging in does not have permission to read their own account");
                self.fail_validation(RequestError::UnsupportedVersion.into());
                return None;
            }
            Err(RepositoryError::Unauthorized) => {
                self.fail_validation(LoginError::InvalidToken);
                return None;
            }
            Err(e) => {
                error!("Error during login with url: {e}");
                self.fail_validation(LoginError::Other(e.to_string()));
                return None;
            }
        };

        info!("Have user: {}", user.username);
        if self.credential_mode == CredentialMode::UsernameAndPassword
            && user.username != self.username
        {
            warn!("Username from login and logged in username are not the same");
        }

        let stored = StoredConnection {
            base_url,
            extra_headers: self.extra_headers.clone(),
            user,
            identity_name: self.selected_identity.clone(),
        };

        if let Some(token) = &connection.token {
            info!("Have token for connection, storing");
            if let Err(e) = self.store.store_secret(&stored.token_key(), token).await {
                error!("Failed to store token for validated connection: {e}");
                self.fail_validation(LoginError::Other(e.to_string()));
                return None;
            }
        } else {
            info!("No token for connection, leaving unset");
        }

        info!("Credentials are valid");
        self.credential_state.send_replace(CredentialState::Valid);
        Some(stored)
    }
}
