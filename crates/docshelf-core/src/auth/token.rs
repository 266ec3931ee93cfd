//! The username/password to bearer-token exchange.

use log::{error, info};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{decode_details, LoginError, RequestError};

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Exchange a username/password pair for a bearer token at the server's
/// token endpoint.
///
/// The client is expected to already carry the attempt's extra headers,
/// timeout and TLS identity.
pub async fn fetch_token(
    client: &reqwest::Client,
    token_url: &Url,
    username: &str,
    password: &str,
) -> Result<String, LoginError> {
    info!("Fetching token for user {username} from {token_url}");

    // Serializing two plain strings cannot fail; if it does, the build is
    // defective and there is nothing to recover.
    let body = serde_json::to_vec(&TokenRequest { username, password })
        .expect("token request serialization is infallible");

    let response = client
        .post(token_url.clone())
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(LoginError::from_transport)?;

    let status = response.status();
    let data = response.bytes().await.map_err(LoginError::from_transport)?;

    match status {
        StatusCode::OK => {}
        StatusCode::BAD_REQUEST => {
            error!(
                "Credentials were rejected when requesting token: {}",
                decode_details(&data)
            );
            return Err(LoginError::InvalidLogin);
        }
        code => {
            error!(
                "Token request response was not 200 but {code}, detail: {}",
                decode_details(&data)
            );
            return Err(RequestError::UnexpectedStatusCode {
                code,
                detail: decode_details(&data),
            }
            .into());
        }
    }

    match serde_json::from_slice::<TokenResponse>(&data) {
        Ok(response) => Ok(response.token),
        Err(_) => {
            error!("Token response could not be decoded, even though status code was good");
            Err(RequestError::InvalidResponse.into())
        }
    }
}
