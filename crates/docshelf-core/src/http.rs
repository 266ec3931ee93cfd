//! Construction of the HTTP transport for a single connection attempt.

use std::time::Duration;

use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{
    error::LoginError,
    store::ClientIdentity,
    tls::{ChallengeResponse, IdentityProvider, TlsChallenge},
};

/// The lowest server API version this client can talk to.
pub const MINIMUM_API_VERSION: u32 = 3;

/// Fixed timeout applied to every network call of the negotiation core.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// An additional header applied to every outgoing request of a login
/// attempt, e.g. for reverse proxies that require their own auth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtraHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// The `Accept` value carrying the minimum API version requirement.
pub(crate) fn version_accept_header() -> String {
    format!("application/json; version={MINIMUM_API_VERSION}")
}

/// Build the per-attempt HTTP client.
///
/// Carries the configured extra headers as defaults, the fixed request
/// timeout, and the TLS client identity when the challenge decision calls
/// for one. The identity is attached at construction and not re-resolved
/// mid-handshake.
pub(crate) fn build_client(
    identity: Option<&ClientIdentity>,
    extra_headers: &[ExtraHeader],
) -> Result<reqwest::Client, LoginError> {
    let mut headers = header::HeaderMap::new();
    for extra in extra_headers {
        let name = header::HeaderName::from_bytes(extra.name.as_bytes())
            .map_err(|e| LoginError::Other(format!("invalid header name {}: {e}", extra.name)))?;
        let value = HeaderValue::from_str(&extra.value)
            .map_err(|e| LoginError::Other(format!("invalid header value for {}: {e}", extra.name)))?;
        headers.append(name, value);
    }

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT);

    if let ChallengeResponse::UseIdentity(identity) =
        IdentityProvider::respond_to_challenge(identity, TlsChallenge::ClientCertificate)
    {
        builder = builder.identity(identity.to_reqwest_identity()?);
    }

    builder
        .build()
        .map_err(|e| LoginError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_header_carries_the_minimum_version() {
        assert_eq!(
            version_accept_header(),
            format!("application/json; version={MINIMUM_API_VERSION}")
        );
    }

    #[test]
    fn build_client_rejects_malformed_extra_headers() {
        let headers = vec![ExtraHeader {
            name: "bad header".to_string(),
            value: "x".to_string(),
        }];
        assert!(matches!(
            build_client(None, &headers),
            Err(LoginError::Other(_))
        ));
    }

    #[test]
    fn build_client_without_identity_succeeds() {
        let headers = vec![ExtraHeader {
            name: "X-Proxy-Auth".to_string(),
            value: "secret".to_string(),
        }];
        assert!(build_client(None, &headers).is_ok());
    }
}
