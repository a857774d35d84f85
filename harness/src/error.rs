use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

use crate::request::HttpResponse;
use crate::BoxError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("credential `{0}` is missing or empty, set it in the environment")]
    MissingCredential(&'static str),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("could not build request: {0}")]
    InvalidRequest(String),
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("unexpected status {}", .0.status)]
    Http(Box<HttpResponse>),
}

impl RequestError {
    /// Status of the remote response, `None` when no response arrived.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            RequestError::Http(response) => Some(response),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("token exchange failed: {0}")]
    Request(#[from] RequestError),
    #[error("token exchange succeeded but no access_token was returned")]
    MissingToken,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("log directory not found: {0}")]
    MissingLogDir(PathBuf),
    #[error("no .json or .log files found in {0}")]
    NoLogFiles(PathBuf),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
