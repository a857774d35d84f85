use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::{client::HttpConnector, Body, Client, Request, Response};
use hyper_rustls::HttpsConnector;

pub mod auth;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod logger;
pub mod metrics;
pub mod report;
pub mod request;

pub use error::{AuthError, ConfigError, ReportError, RequestError};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const AUTH_URL: &str = "https://accounts.spotify.com/api/token";
pub const REQ_TIMEOUT: Duration = Duration::from_millis(5000);

pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends a fully built request and hands back the raw response.
///
/// Implemented by the hyper client for real runs and by recording mocks in
/// tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError>;
}

#[async_trait]
impl Transport for HttpsClient {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        Ok(self.request(request).await?)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        (**self).send(request).await
    }
}

pub fn https_client() -> HttpsClient {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder().build(https)
}

#[cfg(test)]
mod testing;
