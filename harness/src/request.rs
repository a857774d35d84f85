use std::sync::RwLock;
use std::time::Duration;

use hyper::{
    body::Bytes,
    header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Body, HeaderMap, Method, Request, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;

use crate::{https_client, HttpsClient, RequestError, Transport};

/// A response that has been fully read off the wire.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-call additions merged over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Shared entry point for every call against the target API.
///
/// The bearer token lives inside the client, so installing a new one with
/// [`RequestClient::set_token`] affects every request issued afterwards.
pub struct RequestClient<T = HttpsClient> {
    transport: T,
    base_url: String,
    timeout: Duration,
    token: RwLock<Option<HeaderValue>>,
}

impl RequestClient<HttpsClient> {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_transport(https_client(), base_url, timeout)
    }
}

impl<T: Transport> RequestClient<T> {
    pub fn with_transport(transport: T, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        RequestClient {
            transport,
            base_url,
            timeout,
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_token(&self, token: &str) -> Result<(), RequestError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| RequestError::InvalidRequest(format!("token is not a valid header: {e}")))?;
        value.set_sensitive(true);
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(value);
        Ok(())
    }

    pub fn clear_token(&self) {
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    pub async fn get(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        self.send(Method::GET, path, None, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        self.send(Method::POST, path, body, options).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        self.send(Method::PUT, path, body, options).await
    }

    pub async fn delete(
        &self,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        self.send(Method::DELETE, path, body, options).await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        let request = self.build_request(method, path, body, options)?;
        exchange(&self.transport, request, self.timeout).await
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<Request<Body>, RequestError> {
        let uri = format!(
            "{}{}{}",
            self.base_url,
            normalize_path(path),
            query_string(&options.query)
        );

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self
            .token
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
        {
            headers.insert(AUTHORIZATION, token);
        }

        let body = match body {
            Some(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        // caller headers win over defaults
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Runs one request under a hard timeout and reads the whole body.
///
/// Any non-2xx status comes back as [`RequestError::Http`] carrying the
/// response.
pub(crate) async fn exchange(
    transport: &impl Transport,
    request: Request<Body>,
    limit: Duration,
) -> Result<HttpResponse, RequestError> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let round_trip = async {
        let response = transport
            .send(request)
            .await
            .map_err(RequestError::Transport)?;
        let (parts, body) = response.into_parts();
        let body = hyper::body::to_bytes(body)
            .await
            .map_err(|e| RequestError::Transport(e.into()))?;
        Ok::<_, RequestError>(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    };

    let response = timeout(limit, round_trip)
        .await
        .map_err(|_| RequestError::Timeout(limit))??;

    log::debug!("{} {} -> {}", method, uri, response.status);

    if response.status.is_success() {
        Ok(response)
    } else {
        Err(RequestError::Http(Box::new(response)))
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn query_string(query: &[(String, String)]) -> String {
    if query.is_empty() {
        return String::new();
    }
    let pairs = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("?{pairs}")
}
