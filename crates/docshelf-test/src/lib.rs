//! Test helpers for the docshelf crates: a wiremock bootstrap and an
//! in-memory secret store.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        RwLock,
    },
};

use docshelf_core::{ClientIdentity, SecretStore, StoreError};
use url::Url;

/// Helper for testing against a mocked Docshelf server using wiremock.
///
/// Returns the mock server and its base URL (trailing slash normalized, so
/// it can be joined against directly).
///
/// Warning: when using `Mock::expect` ensure the server is not dropped
/// before the test completes.
pub async fn start_server_mock(mocks: Vec<wiremock::Mock>) -> (wiremock::MockServer, Url) {
    let server = wiremock::MockServer::start().await;

    for mock in mocks {
        server.register(mock).await;
    }

    let base = Url::parse(&format!("{}/", server.uri())).expect("mock server uri is a valid URL");

    (server, base)
}

/// An in-memory [`SecretStore`] double.
///
/// Writes can be made to fail to exercise persistence error paths.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
    identities: RwLock<HashMap<String, ClientIdentity>>,
    fail_writes: AtomicBool,
}

impl MemorySecretStore {
    /// Pre-populate a TLS client identity.
    pub fn insert_identity(&self, identity: ClientIdentity) {
        self.identities
            .write()
            .expect("identity lock poisoned")
            .insert(identity.name.clone(), identity);
    }

    /// Make every subsequent `store_secret` call fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SecretStore for MemorySecretStore {
    async fn store_secret(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("simulated write failure".to_string()));
        }
        self.secrets
            .write()
            .expect("secret lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn load_secret(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .secrets
            .read()
            .expect("secret lock poisoned")
            .get(key)
            .cloned())
    }

    async fn load_identity(&self, name: &str) -> Result<Option<ClientIdentity>, StoreError> {
        Ok(self
            .identities
            .read()
            .expect("identity lock poisoned")
            .get(name)
            .cloned())
    }
}
