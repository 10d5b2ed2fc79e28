//! Order actions API and the order board.
//!
//! # Design
//! `OrderActions` is a thin, typed layer over the session manager's
//! authenticated-request capability: one method per endpoint, no recovery,
//! no retry. `OrderBoard` holds the two lists a rider works from and exposes
//! explicit load/refresh operations; every mutation reloads both lists from
//! the server, which is the sole source of truth.

use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{HttpTransport, RequestOptions};
use crate::session::SessionManager;
use crate::storage::CredentialStore;
use crate::types::Order;

/// Typed request layer for the order endpoints.
pub struct OrderActions<'a, S, T> {
    session: &'a SessionManager<S, T>,
}

impl<'a, S: CredentialStore, T: HttpTransport> OrderActions<'a, S, T> {
    pub fn new(session: &'a SessionManager<S, T>) -> Self {
        Self { session }
    }

    /// Orders open for any rider to accept.
    pub async fn list_available(&self) -> Result<Vec<Order>, ApiError> {
        self.list("/rider/orders/available").await
    }

    /// Orders currently assigned to this rider.
    pub async fn list_active(&self) -> Result<Vec<Order>, ApiError> {
        self.list("/rider/orders/active").await
    }

    async fn list(&self, path: &str) -> Result<Vec<Order>, ApiError> {
        let data = self.session.authed_request(path, RequestOptions::get()).await?;
        let Some(orders) = data.as_ref().and_then(|d| d.get("orders")).cloned() else {
            return Ok(Vec::new());
        };
        serde_json::from_value(orders).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Claim an available order for this rider.
    pub async fn accept(&self, order_id: Uuid) -> Result<Option<Value>, ApiError> {
        self.transition(order_id, "accept").await
    }

    pub async fn mark_out_for_delivery(&self, order_id: Uuid) -> Result<Option<Value>, ApiError> {
        self.transition(order_id, "out-for-delivery").await
    }

    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<Option<Value>, ApiError> {
        self.transition(order_id, "delivered").await
    }

    async fn transition(&self, order_id: Uuid, action: &str) -> Result<Option<Value>, ApiError> {
        self.session
            .authed_request(
                &format!("/rider/orders/{order_id}/{action}"),
                RequestOptions::post(),
            )
            .await
    }
}

/// The rider's working set of orders, with explicit refresh semantics.
#[derive(Debug, Clone, Default)]
pub struct OrderBoard {
    pub available: Vec<Order>,
    pub active: Vec<Order>,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload both lists from the server.
    pub async fn refresh<S: CredentialStore, T: HttpTransport>(
        &mut self,
        api: &OrderActions<'_, S, T>,
    ) -> Result<(), ApiError> {
        self.available = api.list_available().await?;
        self.active = api.list_active().await?;
        Ok(())
    }

    /// Accept an order, then reload.
    pub async fn accept<S: CredentialStore, T: HttpTransport>(
        &mut self,
        api: &OrderActions<'_, S, T>,
        order_id: Uuid,
    ) -> Result<(), ApiError> {
        api.accept(order_id).await?;
        self.refresh(api).await
    }

    /// Mark an assigned order out for delivery, then reload.
    pub async fn mark_out_for_delivery<S: CredentialStore, T: HttpTransport>(
        &mut self,
        api: &OrderActions<'_, S, T>,
        order_id: Uuid,
    ) -> Result<(), ApiError> {
        api.mark_out_for_delivery(order_id).await?;
        self.refresh(api).await
    }

    /// Mark an order delivered, then reload.
    pub async fn mark_delivered<S: CredentialStore, T: HttpTransport>(
        &mut self,
        api: &OrderActions<'_, S, T>,
        order_id: Uuid,
    ) -> Result<(), ApiError> {
        api.mark_delivered(order_id).await?;
        self.refresh(api).await
    }
}
