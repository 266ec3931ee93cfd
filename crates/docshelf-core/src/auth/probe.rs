//! The reachability/version probe against a candidate URL.

use std::collections::HashMap;

use log::{info, warn};
use reqwest::{header, StatusCode};
use url::Url;

use crate::{
    auth::login::LoginState,
    error::{decode_details, LoginError, RequestError},
    http::version_accept_header,
    net::derive_api_url,
};

/// Probe a candidate URL and classify the outcome as a [`LoginState`].
///
/// Debouncing and superseding cancellation are owned by the coordinator;
/// when the future is dropped mid-flight the request is aborted and no
/// state is produced.
pub(crate) async fn check_url(client: &reqwest::Client, value: &str) -> LoginState {
    info!("Checking backend URL {value}");
    if value.is_empty() {
        return LoginState::Empty;
    }

    let derived = match derive_api_url(value) {
        Ok(derived) => derived,
        Err(e) => {
            warn!("Cannot derive URL: {value} -> {e}");
            return LoginState::Error(LoginError::InvalidUrl(e));
        }
    };

    let response = match client
        .get(derived.api.clone())
        .header(header::ACCEPT, version_accept_header())
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return LoginState::Error(LoginError::from_transport(e)),
    };

    let status = response.status();
    let data = match response.bytes().await {
        Ok(data) => data,
        Err(_) => return LoginState::Error(RequestError::InvalidResponse.into()),
    };

    if status != StatusCode::OK {
        let detail = decode_details(&data);
        warn!("Checking API status was not 200 but {status}, detail: {detail}");
        return match status {
            StatusCode::NOT_ACCEPTABLE => LoginState::Error(RequestError::UnsupportedVersion.into()),
            code => LoginState::Error(RequestError::UnexpectedStatusCode { code, detail }.into()),
        };
    }

    // The endpoint index must parse as a map from endpoint name to URL; a
    // 200 with any other shape is a malformed server response.
    match serde_json::from_slice::<HashMap<String, Url>>(&data) {
        Ok(_) => LoginState::Valid,
        Err(e) => {
            warn!("Probe response with status 200 could not be decoded: {e}");
            LoginState::Error(RequestError::InvalidResponse.into())
        }
    }
}
