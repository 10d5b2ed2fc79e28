//! Domain DTOs for the rider API.
//!
//! # Design
//! These types mirror the backend's wire schema (camelCase JSON) but are
//! defined independently of the mock-server crate; integration tests catch
//! any drift between the two. Fields the client renders but never interprets
//! are optional with serde defaults, so a sparse server payload still
//! deserializes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rider profile, as returned by login and the "who am I" endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub username: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Fixed order status lifecycle. `Unknown` absorbs statuses introduced
/// server-side before the client learns about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Confirmed,
    AssignedRider,
    OutForDelivery,
    Delivered,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// True when a rider may accept the order (it has not been assigned yet).
    pub fn is_acceptable(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Confirmed)
    }
}

/// A line item on an order. Only rendered, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub product_img_url: Option<String>,
}

/// A delivery order. Read-only from the client's perspective; every mutation
/// goes through a server endpoint and the server's copy wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub subtotal_amount: Option<f64>,
    #[serde(default)]
    pub delivery_fee: Option<f64>,
    #[serde(default)]
    pub address_label: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}
