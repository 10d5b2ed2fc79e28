//! Client core for the rider delivery service.
//!
//! # Overview
//! Authenticates a rider, keeps the session token in a credential store, and
//! drives orders through their status lifecycle (accept, out for delivery,
//! delivered) against the backend REST API.
//!
//! # Design
//! - [`SessionManager`] owns the session state machine: bootstrap from
//!   storage with server validation, login/logout, and forced local logout
//!   when the server invalidates a token. It is constructed explicitly and
//!   passed to collaborators; there is no global session.
//! - [`HttpClient`] is generic over [`HttpTransport`], so the whole stack
//!   runs against a scripted transport in tests and `reqwest` in production.
//! - The credential store is an external collaborator behind
//!   [`CredentialStore`]; [`MemoryStore`] ships for tests and
//!   process-lifetime hosts.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod config;
pub mod error;
pub mod http;
pub mod orders;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::RiderConfig;
pub use error::{ApiError, SessionErrorCode};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestOptions};
pub use orders::{OrderActions, OrderBoard};
pub use session::{Session, SessionManager};
pub use storage::{CredentialStore, MemoryStore, StorageError};
pub use types::{Order, OrderItem, OrderStatus, Rider};
