//! Resolution of TLS client identities and the challenge decision applied
//! when the transport is constructed.

use std::sync::Arc;

use log::{info, warn};

use crate::store::{ClientIdentity, SecretStore};

/// The kind of authentication challenge a server can raise during the TLS
/// handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsChallenge {
    /// The server requests a client certificate (mutual TLS).
    ClientCertificate,
    /// The server presents its own certificate for verification.
    ServerTrust,
    /// Anything else (HTTP auth schemes, proxies, ...).
    Other,
}

/// The decision for a single challenge. Stateless per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeResponse {
    /// Offer this identity to the server.
    UseIdentity(ClientIdentity),
    /// Let the transport's default handling run. Never fails the request.
    Default,
}

/// Resolves named client identities from the secure store.
///
/// Absence of an identity is a normal, non-error path: servers that do not
/// require mutual TLS are the common case.
#[derive(Clone)]
pub struct IdentityProvider {
    store: Arc<dyn SecretStore>,
}

impl IdentityProvider {
    /// Create a provider backed by the given store.
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Look up an identity by name.
    ///
    /// Returns `None` when no name is selected, the store has no identity
    /// under that name, or the lookup fails. The chosen identity is fixed
    /// for the lifetime of one login attempt; callers resolve once and
    /// hold on to the result.
    pub async fn resolve(&self, name: Option<&str>) -> Option<ClientIdentity> {
        let name = name?;
        match self.store.load_identity(name).await {
            Ok(Some(identity)) => Some(identity),
            Ok(None) => {
                info!("No client identity named {name} in the secret store");
                None
            }
            Err(e) => {
                warn!("Failed to load client identity {name}: {e}");
                None
            }
        }
    }

    /// Answer a single authentication challenge.
    ///
    /// Only client-certificate challenges are answered with an identity;
    /// every other challenge gets default handling, as does a
    /// client-certificate challenge without a configured identity.
    pub fn respond_to_challenge(
        identity: Option<&ClientIdentity>,
        challenge: TlsChallenge,
    ) -> ChallengeResponse {
        match (challenge, identity) {
            (TlsChallenge::ClientCertificate, Some(identity)) => {
                ChallengeResponse::UseIdentity(identity.clone())
            }
            _ => ChallengeResponse::Default,
        }
    }
}
