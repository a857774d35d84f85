use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use hyper::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Body, Method, Request,
};
use serde::Deserialize;

use crate::{request::exchange, AuthError, ConfigError, RequestError, Transport};

pub const CLIENT_ID_VAR: &str = "CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";

#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Credentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential(CLIENT_ID_VAR));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential(CLIENT_SECRET_VAR));
        }
        Ok(())
    }

    fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: Option<String>,
}

/// Exchanges client credentials for a bearer token.
///
/// Empty credentials are rejected before anything touches the network.
pub async fn fetch_token(
    transport: &impl Transport,
    auth_url: &str,
    credentials: &Credentials,
    limit: Duration,
) -> Result<String, AuthError> {
    credentials.validate()?;

    let request = Request::builder()
        .method(Method::POST)
        .uri(auth_url)
        .header(AUTHORIZATION, credentials.basic_authorization())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("grant_type=client_credentials"))
        .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;

    let response = exchange(transport, request, limit).await?;
    let grant: TokenGrant = response.json().map_err(|_| AuthError::MissingToken)?;

    grant
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}
