#![doc = include_str!("../README.md")]

pub mod api;
pub mod auth;
pub mod dates;
mod error;
pub mod http;
pub mod net;
pub mod store;
pub mod tls;

pub use api::{ApiRepository, Connection, RepositoryError, StoredConnection, User, UserRepository};
pub use auth::{CredentialMode, CredentialState, LoginCoordinator, LoginState};
pub use error::{LoginError, RequestError, UrlError};
pub use http::{ExtraHeader, MINIMUM_API_VERSION, REQUEST_TIMEOUT};
pub use net::{derive_api_url, derive_url, is_local_address, strip_scheme_prefix, Scheme};
pub use store::{ClientIdentity, SecretStore, StoreError};
