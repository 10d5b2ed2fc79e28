//! Error types for the rider API client.
//!
//! # Design
//! Authentication rejection is the only error class the session layer acts
//! on: an HTTP 401 whose body carries one of the recognized token codes. The
//! predicate for it lives here ([`ApiError::auth_rejection_code`]) so the
//! bootstrap and request paths cannot drift apart. Every other failure is
//! carried with enough raw material (status, parsed body) for the caller to
//! present or log.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the HTTP client, session manager, and order actions.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered outside the 2xx range. `data` holds the parsed
    /// response body when one was present.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        data: Option<Value>,
    },

    /// The request never produced a response (connection refused, DNS
    /// failure, closed socket). The session layer treats this the same as
    /// an unreachable server.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The credential store failed to read or write.
    #[error("credential store error: {0}")]
    Storage(#[from] StorageError),

    /// An authenticated operation was attempted with no session token. Raised
    /// before any network traffic.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The login endpoint answered 2xx but the body was missing the token or
    /// the rider profile. A server contract violation, not retryable.
    #[error("login response missing token or rider")]
    InvalidLoginResponse,
}

impl ApiError {
    /// The server-provided `error` code from the response body, if any.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            ApiError::Http { data: Some(data), .. } => data.get("error")?.as_str(),
            _ => None,
        }
    }

    /// If this error is a server-side token invalidation (HTTP 401 with a
    /// recognized code), the matching [`SessionErrorCode`]. This is the single
    /// signal that triggers forced local logout.
    pub fn auth_rejection_code(&self) -> Option<SessionErrorCode> {
        match self {
            ApiError::Http { status: 401, .. } => {
                SessionErrorCode::from_token_code(self.api_code()?)
            }
            _ => None,
        }
    }

    /// Message suitable for direct display: the server's `error` code when
    /// present, `HTTP_<status>` for other HTTP failures, otherwise the
    /// error's own text.
    pub fn user_message(&self) -> String {
        if let Some(code) = self.api_code() {
            return code.to_string();
        }
        match self {
            ApiError::Http { status, .. } => format!("HTTP_{status}"),
            other => other.to_string(),
        }
    }
}

/// Diagnostic codes recorded in the session's `last_error` slot.
///
/// The first three are produced by the server on 401 responses; the rest are
/// client-side conditions. Wire strings match the backend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    TokenInvalid,
    TokenRevoked,
    TokenRequired,
    /// Session validation could not reach a verdict (network or server
    /// trouble); the stored session was kept.
    MeCheckFailed,
    /// Bootstrap itself failed unexpectedly; the session was left
    /// unauthenticated rather than stuck.
    BootstrapFailed,
    LoginResponseInvalid,
}

impl SessionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionErrorCode::TokenInvalid => "TOKEN_INVALID",
            SessionErrorCode::TokenRevoked => "TOKEN_REVOKED",
            SessionErrorCode::TokenRequired => "TOKEN_REQUIRED",
            SessionErrorCode::MeCheckFailed => "ME_CHECK_FAILED",
            SessionErrorCode::BootstrapFailed => "BOOTSTRAP_FAILED",
            SessionErrorCode::LoginResponseInvalid => "LOGIN_RESPONSE_INVALID",
        }
    }

    /// Map a server 401 `error` code to its session code. Only the token
    /// invalidation codes are recognized; anything else (unknown codes,
    /// permission errors) must not force a logout.
    pub fn from_token_code(code: &str) -> Option<Self> {
        match code {
            "TOKEN_INVALID" => Some(SessionErrorCode::TokenInvalid),
            "TOKEN_REVOKED" => Some(SessionErrorCode::TokenRevoked),
            "TOKEN_REQUIRED" => Some(SessionErrorCode::TokenRequired),
            _ => None,
        }
    }
}

impl fmt::Display for SessionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http_error(status: u16, data: Option<Value>) -> ApiError {
        ApiError::Http {
            status,
            message: format!("Request failed with status {status}"),
            data,
        }
    }

    #[test]
    fn recognized_401_codes_are_auth_rejections() {
        for code in ["TOKEN_INVALID", "TOKEN_REVOKED", "TOKEN_REQUIRED"] {
            let err = http_error(401, Some(json!({ "error": code })));
            let rejection = err.auth_rejection_code().unwrap();
            assert_eq!(rejection.as_str(), code);
        }
    }

    #[test]
    fn unrecognized_401_code_is_not_an_auth_rejection() {
        let err = http_error(401, Some(json!({ "error": "INVALID_CREDENTIALS" })));
        assert!(err.auth_rejection_code().is_none());
    }

    #[test]
    fn recognized_code_on_non_401_is_not_an_auth_rejection() {
        let err = http_error(403, Some(json!({ "error": "TOKEN_INVALID" })));
        assert!(err.auth_rejection_code().is_none());
    }

    #[test]
    fn transport_error_is_not_an_auth_rejection() {
        let err = ApiError::Transport("connection refused".to_string());
        assert!(err.auth_rejection_code().is_none());
    }

    #[test]
    fn user_message_prefers_server_code() {
        let err = http_error(409, Some(json!({ "error": "ORDER_ALREADY_ASSIGNED" })));
        assert_eq!(err.user_message(), "ORDER_ALREADY_ASSIGNED");
    }

    #[test]
    fn user_message_falls_back_to_status() {
        let err = http_error(500, Some(json!({ "detail": "boom" })));
        assert_eq!(err.user_message(), "HTTP_500");
    }

    #[test]
    fn user_message_for_non_http_errors_uses_display() {
        let err = ApiError::NotAuthenticated;
        assert_eq!(err.user_message(), "not authenticated");
    }
}
