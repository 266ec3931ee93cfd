//! End-to-end credential validation against a mocked server.

use std::sync::Arc;

use docshelf_core::{
    CredentialMode, CredentialState, LoginCoordinator, LoginError, RequestError, SecretStore,
};
use docshelf_test::{start_server_mock, MemorySecretStore};
use wiremock::{matchers, Mock, ResponseTemplate};

fn token_mock(token: &str) -> Mock {
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/token/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": token})),
        )
}

fn current_user_mock(username: &str) -> Mock {
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"id": 1, "username": username})),
        )
}

#[tokio::test]
async fn username_and_password_login_produces_a_stored_connection() {
    let (server, base) =
        start_server_mock(vec![token_mock("tkn1"), current_user_mock("alice")]).await;

    let store = Arc::new(MemorySecretStore::default());
    let mut coordinator = LoginCoordinator::with_api_repository(store.clone());
    coordinator.on_host_input_changed(base.as_str(), true);
    coordinator.credential_mode = CredentialMode::UsernameAndPassword;
    coordinator.username = "alice".to_string();
    coordinator.password = "hunter2".to_string();

    let stored = coordinator
        .validate_credentials()
        .await
        .expect("stored connection");

    assert_eq!(stored.user.username, "alice");
    assert_eq!(stored.base_url, base);
    assert_eq!(stored.identity_name, None);
    assert_eq!(coordinator.credential_state(), CredentialState::Valid);

    // The token lives in the secure store, not in the record.
    assert_eq!(
        store.load_secret(&stored.token_key()).await.unwrap(),
        Some("tkn1".to_string())
    );

    // The current-user fetch authenticated with the freshly obtained token.
    let requests = server.received_requests().await.expect("requests recorded");
    let user_request = requests
        .iter()
        .find(|r| r.url.path() == "/api/users/me/")
        .expect("current-user request");
    assert_eq!(
        user_request
            .headers
            .get("Authorization")
            .map(|v| v.to_str().unwrap()),
        Some("Token tkn1")
    );
}

#[tokio::test]
async fn static_token_rejected_by_the_server_is_an_invalid_token() {
    let user_mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(401));
    let (_server, base) = start_server_mock(vec![user_mock]).await;

    let store = Arc::new(MemorySecretStore::default());
    let mut coordinator = LoginCoordinator::with_api_repository(store);
    coordinator.on_host_input_changed(base.as_str(), true);
    coordinator.credential_mode = CredentialMode::Token;
    coordinator.token = "stale".to_string();

    assert!(coordinator.validate_credentials().await.is_none());
    assert_eq!(
        coordinator.credential_state(),
        CredentialState::Error(LoginError::InvalidToken)
    );
}

#[tokio::test]
async fn rejected_credentials_surface_as_invalid_login() {
    let token_mock = Mock::given(matchers::method("POST"))
        .and(matchers::path("/token/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"detail": "Unable to log in."})),
        );
    let (_server, base) = start_server_mock(vec![token_mock]).await;

    let store = Arc::new(MemorySecretStore::default());
    let mut coordinator = LoginCoordinator::with_api_repository(store);
    coordinator.on_host_input_changed(base.as_str(), true);
    coordinator.username = "alice".to_string();
    coordinator.password = "wrong".to_string();

    assert!(coordinator.validate_credentials().await.is_none());
    assert_eq!(
        coordinator.credential_state(),
        CredentialState::Error(LoginError::InvalidLogin)
    );
}

#[tokio::test]
async fn forbidden_current_user_maps_to_unsupported_version() {
    let user_mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(403));
    let (_server, base) = start_server_mock(vec![user_mock]).await;

    let store = Arc::new(MemorySecretStore::default());
    let mut coordinator = LoginCoordinator::with_api_repository(store);
    coordinator.on_host_input_changed(base.as_str(), true);
    coordinator.credential_mode = CredentialMode::None;

    assert!(coordinator.validate_credentials().await.is_none());
    assert_eq!(
        coordinator.credential_state(),
        CredentialState::Error(LoginError::Request(RequestError::UnsupportedVersion))
    );
}

#[tokio::test]
async fn failed_token_persistence_aborts_the_login() {
    let (_server, base) =
        start_server_mock(vec![token_mock("tkn2"), current_user_mock("alice")]).await;

    let store = Arc::new(MemorySecretStore::default());
    store.fail_writes(true);
    let mut coordinator = LoginCoordinator::with_api_repository(store.clone());
    coordinator.on_host_input_changed(base.as_str(), true);
    coordinator.username = "alice".to_string();
    coordinator.password = "hunter2".to_string();

    assert!(coordinator.validate_credentials().await.is_none());
    assert!(matches!(
        coordinator.credential_state(),
        CredentialState::Error(LoginError::Other(_))
    ));
}
