//! HTTP client and transport boundary.
//!
//! # Design
//! Requests and responses are plain data (`HttpRequest` / `HttpResponse`);
//! the [`HttpTransport`] trait is the only place actual network I/O happens.
//! `HttpClient` owns everything above the socket: URL joining, the standard
//! JSON headers, bearer attachment, lenient body parsing, and the non-2xx to
//! [`ApiError::Http`] mapping. Tests drive it with a scripted transport and
//! never open a socket.

use std::future::Future;

use serde_json::Value;

use crate::config::RiderConfig;
use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

/// An HTTP request described as plain data, ready for a transport to execute.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response as plain data. Headers are not carried; nothing in the
/// client reads them.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes an [`HttpRequest`] against the network.
///
/// Transport failures (refused connection, DNS, dropped socket) surface as
/// [`ApiError::Transport`]; any response that arrives, whatever its status,
/// is returned as data.
pub trait HttpTransport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send;
}

/// Production transport backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Per-request options, mirroring what callers vary: method, bearer token,
/// JSON body, and extra headers appended after the standard set.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub token: Option<String>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// JSON-speaking HTTP client over a transport.
#[derive(Debug, Clone)]
pub struct HttpClient<T> {
    config: RiderConfig,
    transport: T,
}

impl<T: HttpTransport> HttpClient<T> {
    pub fn new(config: RiderConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &RiderConfig {
        &self.config
    }

    /// Execute a request against `path` and return the parsed response body.
    ///
    /// An empty body yields `None`. A non-JSON body is wrapped as
    /// `{"raw": <text>}` rather than treated as an error. A non-2xx status
    /// yields [`ApiError::Http`] whose message prefers the body's `error`
    /// field, then `message`, then a generic fallback.
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        let body = match &options.body {
            Some(value) => Some(
                serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = &options.token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        headers.extend(options.headers);

        let response = self
            .transport
            .execute(HttpRequest {
                method: options.method,
                url: self.config.url_for(path),
                headers,
                body,
            })
            .await?;

        let data = read_json_safe(&response.body);

        if !(200..300).contains(&response.status) {
            let message = data
                .as_ref()
                .and_then(|d| {
                    d.get("error")
                        .or_else(|| d.get("message"))
                        .and_then(Value::as_str)
                })
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {}", response.status));
            return Err(ApiError::Http {
                status: response.status,
                message,
                data,
            });
        }

        Ok(data)
    }
}

/// Parse a response body leniently: empty is absent, invalid JSON is wrapped.
fn read_json_safe(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::json!({ "raw": text })),
    }
}
