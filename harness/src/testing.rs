use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use hyper::{header::CONTENT_TYPE, Body, HeaderMap, Method, Request, Response};

use crate::{BoxError, Transport};

pub(crate) enum MockReply {
    Status {
        status: u16,
        content_type: Option<&'static str>,
        body: &'static str,
    },
    Fail(&'static str),
    Hang,
}

impl MockReply {
    pub(crate) fn json(status: u16, body: &'static str) -> Self {
        MockReply::Status {
            status,
            content_type: Some("application/json; charset=utf-8"),
            body,
        }
    }

    pub(crate) fn empty(status: u16) -> Self {
        MockReply::Status {
            status,
            content_type: None,
            body: "",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Replays canned replies in order and records every request it sees.
pub(crate) struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub(crate) fn with_replies(replies: Vec<MockReply>) -> Self {
        MockTransport {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        let (parts, body) = request.into_parts();
        let body = hyper::body::to_bytes(body).await?.to_vec();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Status {
                status,
                content_type,
                body,
            }) => {
                let mut builder = Response::builder().status(status);
                if let Some(content_type) = content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                Ok(builder.body(Body::from(body))?)
            }
            Some(MockReply::Fail(message)) => Err(message.into()),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Err("no reply queued".into()),
        }
    }
}
