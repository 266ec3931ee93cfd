//! Tests for the HTTP repository implementation, run as integration tests
//! because `docshelf-test`'s store double must link against the same build
//! of `docshelf-core` as the code under test.

use std::sync::Arc;

use docshelf_core::{
    ApiRepository, Connection, RepositoryError, StoredConnection, User, UserRepository,
};
use docshelf_test::{start_server_mock, MemorySecretStore};
use reqwest::StatusCode;
use url::Url;
use wiremock::{matchers, Mock, ResponseTemplate};

fn connection(base: &Url, token: Option<&str>) -> Connection {
    Connection {
        base_url: base.clone(),
        token: token.map(str::to_string),
        extra_headers: vec![],
        identity_name: None,
    }
}

#[test]
fn token_key_distinguishes_identities() {
    let base: Url = "https://example.com/".parse().unwrap();
    let plain = StoredConnection {
        base_url: base.clone(),
        extra_headers: vec![],
        user: User {
            id: 1,
            username: "alice".to_string(),
        },
        identity_name: None,
    };
    let with_identity = StoredConnection {
        identity_name: Some("mtls".to_string()),
        ..plain.clone()
    };
    assert_eq!(plain.token_key(), "token/https://example.com/");
    assert_eq!(with_identity.token_key(), "token/https://example.com//mtls");
    assert_ne!(plain.token_key(), with_identity.token_key());
}

#[tokio::test]
async fn current_user_sends_token_and_parses_user() {
    let mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .and(matchers::header("Authorization", "Token tkn1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"id": 7, "username": "alice"})),
        );
    let (_server, base) = start_server_mock(vec![mock]).await;

    let repository = ApiRepository::new(Arc::new(MemorySecretStore::default()));
    let user = repository
        .current_user(&connection(&base, Some("tkn1")))
        .await
        .unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.id, 7);
}

#[tokio::test]
async fn current_user_maps_401_and_403() {
    let mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(401));
    let (_server, base) = start_server_mock(vec![mock]).await;

    let repository = ApiRepository::new(Arc::new(MemorySecretStore::default()));
    let err = repository
        .current_user(&connection(&base, None))
        .await
        .unwrap_err();
    assert_eq!(err, RepositoryError::Unauthorized);

    let mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(403));
    let (_server, base) = start_server_mock(vec![mock]).await;
    let err = repository
        .current_user(&connection(&base, Some("tkn")))
        .await
        .unwrap_err();
    assert_eq!(err, RepositoryError::Forbidden);
}

#[tokio::test]
async fn current_user_surfaces_unexpected_statuses_with_detail() {
    let mock = Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/users/me/"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(serde_json::json!({"detail": "maintenance"})),
        );
    let (_server, base) = start_server_mock(vec![mock]).await;

    let repository = ApiRepository::new(Arc::new(MemorySecretStore::default()));
    let err = repository
        .current_user(&connection(&base, None))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RepositoryError::Response {
            code: StatusCode::SERVICE_UNAVAILABLE,
            detail: "maintenance".to_string(),
        }
    );
}
