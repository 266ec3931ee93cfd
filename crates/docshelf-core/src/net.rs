//! URL derivation and normalization for user-supplied host strings.
//!
//! Everything in here is pure: the same input always yields the same
//! output and no I/O happens.

use std::{fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::UrlError;

/// The URL scheme selected for a connection attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP, only sensible for local or test servers.
    Http,
    /// TLS, the default.
    #[default]
    Https,
}

impl Scheme {
    /// Compose a full URL string from this scheme and a host remainder.
    pub fn compose(&self, host: &str) -> String {
        format!("{self}://{host}")
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Split a recognized scheme prefix off a host string as the user types it.
///
/// Unrecognized prefixes are left alone; the caller keeps its current
/// scheme selection in that case.
pub fn strip_scheme_prefix(input: &str) -> (Option<Scheme>, &str) {
    if let Some(rest) = input.strip_prefix("https://") {
        (Some(Scheme::Https), rest)
    } else if let Some(rest) = input.strip_prefix("http://") {
        (Some(Scheme::Http), rest)
    } else {
        (None, input)
    }
}

/// A validated base URL together with the endpoint URL derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedUrl {
    /// The normalized base URL: absolute, non-empty host, trailing-slash
    /// path, no query or fragment.
    pub base: Url,
    /// `base` joined with the requested suffix, e.g. `api/` or `token/`.
    pub api: Url,
}

/// Derive the base URL and an endpoint URL from a raw host string.
///
/// Accepts a bare host, `host:port`, or a host with a path. An explicit
/// scheme is optional; without one the input is completed with `https://`.
pub fn derive_url(value: &str, suffix: &str) -> Result<DerivedUrl, UrlError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UrlError::malformed("input is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut base = Url::parse(&candidate).map_err(|e| UrlError::malformed(e.to_string()))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(UrlError::malformed(format!(
            "unsupported scheme: {}",
            base.scheme()
        )));
    }
    if base.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::malformed("input has no host"));
    }

    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let api = base
        .join(&format!("{suffix}/"))
        .map_err(|e| UrlError::malformed(e.to_string()))?;

    Ok(DerivedUrl { base, api })
}

/// Derive the base URL and the standard `api/` endpoint.
pub fn derive_api_url(value: &str) -> Result<DerivedUrl, UrlError> {
    derive_url(value, "api")
}

/// Whether a URL points at the local machine or an RFC1918 private range.
///
/// Callers use this to relax constraints that only make sense for servers
/// reachable from the open internet.
pub fn is_local_address(value: &str) -> bool {
    let Ok(url) = Url::parse(value) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    if host == "localhost" {
        return true;
    }

    let Ok(ip) = host.parse::<Ipv4Addr>() else {
        return false;
    };

    ip == Ipv4Addr::LOCALHOST || ip.is_private()
}
