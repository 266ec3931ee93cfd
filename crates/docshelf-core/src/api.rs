//! Connection descriptors and the repository/current-user collaborator.

use std::{fmt, sync::Arc};

use log::debug;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{
    error::decode_details,
    http::{self, ExtraHeader},
    store::SecretStore,
    tls::IdentityProvider,
};

/// The server-side account a connection was validated against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Server-assigned user id.
    #[serde(default)]
    pub id: i64,
    /// Login name.
    pub username: String,
}

/// A transient in-memory connection bundle, built fresh for each
/// validation attempt. Never persisted directly.
#[derive(Clone, PartialEq, Eq)]
pub struct Connection {
    /// Normalized base URL of the server.
    pub base_url: Url,
    /// Bearer token, when the credential mode produced one.
    pub token: Option<String>,
    /// Ordered extra headers for every request on this connection.
    pub extra_headers: Vec<ExtraHeader>,
    /// Name of the TLS client identity to use, if any.
    pub identity_name: Option<String>,
}

// The token is a secret and stays out of Debug output.
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("extra_headers", &self.extra_headers)
            .field("identity_name", &self.identity_name)
            .finish()
    }
}

/// The persisted record of a successfully validated connection.
///
/// The token itself is never embedded here; it lives in the secure store
/// under [`StoredConnection::token_key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredConnection {
    /// Normalized base URL of the server.
    pub base_url: Url,
    /// Ordered extra headers for every request on this connection.
    pub extra_headers: Vec<ExtraHeader>,
    /// The validated account.
    pub user: User,
    /// Name of the TLS client identity to use, if any.
    pub identity_name: Option<String>,
}

impl StoredConnection {
    /// The secure-store key the connection's token is filed under.
    ///
    /// Two connections to the same host with different client identities
    /// get distinct keys.
    pub fn token_key(&self) -> String {
        match &self.identity_name {
            Some(identity) => format!("token/{}/{identity}", self.base_url),
            None => format!("token/{}", self.base_url),
        }
    }
}

/// Failures of the repository collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The account lacks the permissions the client requires.
    #[error("access forbidden")]
    Forbidden,
    /// The connection's token was rejected.
    #[error("not authorized")]
    Unauthorized,
    /// Any other non-2xx answer.
    #[error("unexpected status code {code}: {detail}")]
    Response {
        /// The HTTP status the server answered with.
        code: StatusCode,
        /// Detail text extracted from the response body.
        detail: String,
    },
    /// Transport-level failure, carried as display text.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// The document-repository collaborator, reduced to the single call the
/// login core needs: fetching the identity of the current user.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the account the connection authenticates as.
    async fn current_user(&self, connection: &Connection) -> Result<User, RepositoryError>;
}

/// HTTP implementation of [`UserRepository`] against the server API.
pub struct ApiRepository {
    store: Arc<dyn SecretStore>,
}

impl ApiRepository {
    /// Create a repository that resolves TLS identities from `store`.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl UserRepository for ApiRepository {
    async fn current_user(&self, connection: &Connection) -> Result<User, RepositoryError> {
        let identity = IdentityProvider::new(self.store.clone())
            .resolve(connection.identity_name.as_deref())
            .await;
        let client = http::build_client(identity.as_ref(), &connection.extra_headers)
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;

        let url = connection
            .base_url
            .join("api/users/me/")
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;
        debug!("Fetching current user from {url}");

        let mut request = client
            .get(url)
            .header(header::ACCEPT, http::version_accept_header());
        if let Some(token) = &connection.token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(RepositoryError::Unauthorized),
            StatusCode::FORBIDDEN => Err(RepositoryError::Forbidden),
            status if status.is_success() => response
                .json::<User>()
                .await
                .map_err(|e| RepositoryError::Transport(e.to_string())),
            status => {
                let body = response.bytes().await.unwrap_or_default();
                Err(RepositoryError::Response {
                    code: status,
                    detail: decode_details(&body),
                })
            }
        }
    }
}
