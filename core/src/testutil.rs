//! Scripted transport for unit tests. No sockets involved: responses are
//! queued ahead of time and every executed request is recorded for
//! inspection. Clones share the same script and log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Inner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn push_response(&self, status: u16, body: &str) {
        self.inner
            .script
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
            }));
    }

    /// Queue a transport-level failure.
    pub fn push_transport_error(&self, message: &str) {
        self.inner
            .script
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Transport(message.to_string())));
    }

    /// Drain and return every request executed so far.
    pub fn take_requests(&self) -> Vec<HttpRequest> {
        std::mem::take(&mut self.inner.requests.lock().unwrap())
    }

    /// Number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }
}

impl HttpTransport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.inner.requests.lock().unwrap().push(request);
        self.inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left"))
    }
}
