//! The closed error taxonomy for connection negotiation.
//!
//! Every failure inside URL derivation, probing, token exchange and
//! credential validation is converted into one of these kinds before it
//! reaches observable state. Raw transport errors never surface directly,
//! and cancellation of an in-flight operation is not represented here at
//! all.

use std::error::Error as StdError;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// A user-supplied host string could not be turned into a usable URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// Empty input, missing host, or input the URL parser rejects.
    #[error("invalid URL: {reason}")]
    Malformed {
        /// Human-readable reason, for logs only.
        reason: String,
    },
}

impl UrlError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Failures of a single request against the server.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The response was not HTTP or could not be read at all.
    #[error("invalid response received from server")]
    InvalidResponse,
    /// The server's API version is below the minimum this client requires.
    /// Also used when the logged-in user lacks the permissions the client
    /// needs, since the app cannot function in either case.
    #[error("server version is not supported")]
    UnsupportedVersion,
    /// Any non-2xx status this taxonomy has no more specific kind for.
    #[error("unexpected status code {code}: {detail}")]
    UnexpectedStatusCode {
        /// The HTTP status the server answered with.
        code: StatusCode,
        /// Detail text extracted from the response body.
        detail: String,
    },
    /// The operating system denied access to the local network.
    #[error("local network access denied")]
    LocalNetworkDenied,
}

/// Everything that can go wrong while validating a connection or logging in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The candidate URL could not be derived.
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
    /// A request-level failure, see [`RequestError`].
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The server rejected the supplied username/password pair.
    #[error("invalid username or password")]
    InvalidLogin,
    /// The server rejected the token on an authenticated call.
    #[error("invalid or expired token")]
    InvalidToken,
    /// TLS/certificate failure during connection setup.
    #[error("certificate error: {0}")]
    Certificate(String),
    /// Anything else, carried as display text.
    #[error("{0}")]
    Other(String),
}

impl LoginError {
    /// Classify a transport failure into the taxonomy.
    ///
    /// Certificate and local-network failures are recognized by inspecting
    /// the error's source chain, not its message text. Timeouts and all
    /// remaining transport failures become [`LoginError::Other`].
    pub fn from_transport(err: reqwest::Error) -> Self {
        if let Some(classified) = classify_source_chain(&err) {
            return classified;
        }
        LoginError::Other(err.to_string())
    }
}

/// Walk an error's source chain looking for TLS and permission failures.
pub(crate) fn classify_source_chain(err: &(dyn StdError + 'static)) -> Option<LoginError> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::PermissionDenied {
                return Some(RequestError::LocalNetworkDenied.into());
            }
        }
        if let Some(tls) = cause.downcast_ref::<rustls::Error>() {
            return Some(LoginError::Certificate(tls.to_string()));
        }
        source = cause.source();
    }
    None
}

/// Extract a human-readable detail string from an error response body.
///
/// The server reports failure reasons in a JSON object field named
/// `detail`; if the body does not parse as that shape it is used verbatim.
pub(crate) fn decode_details(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Response {
        detail: String,
    }

    if let Ok(response) = serde_json::from_slice::<Response>(body) {
        return response.detail;
    }

    if body.is_empty() {
        return "no details".to_string();
    }

    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_details_prefers_json_detail_field() {
        let body = br#"{"detail": "Invalid credentials."}"#;
        assert_eq!(decode_details(body), "Invalid credentials.");
    }

    #[test]
    fn decode_details_falls_back_to_raw_text() {
        assert_eq!(decode_details(b"<html>Bad gateway</html>"), "<html>Bad gateway</html>");
        assert_eq!(decode_details(br#"{"error": "other shape"}"#), r#"{"error": "other shape"}"#);
    }

    #[test]
    fn decode_details_placeholder_for_empty_body() {
        assert_eq!(decode_details(b""), "no details");
    }

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct Outer {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn permission_denied_in_source_chain_is_local_network_denied() {
        let err = Outer {
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            classify_source_chain(&err),
            Some(LoginError::Request(RequestError::LocalNetworkDenied))
        );
    }

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct OuterTls {
        #[source]
        source: rustls::Error,
    }

    #[test]
    fn rustls_error_in_source_chain_is_certificate_error() {
        let err = OuterTls {
            source: rustls::Error::InvalidCertificate(rustls::CertificateError::Expired),
        };
        assert!(matches!(
            classify_source_chain(&err),
            Some(LoginError::Certificate(_))
        ));
    }

    #[test]
    fn unrelated_errors_are_not_classified() {
        let err = Outer {
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(classify_source_chain(&err), None);
    }
}
