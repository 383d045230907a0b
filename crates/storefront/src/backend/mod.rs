//! Remote backend gateway.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`, one call per operation, no retries
//! - The backend is the source of truth: every write is followed by a re-fetch
//!   in the cart store, never by a local patch
//! - Response shapes are not contractually fixed, so every body goes through
//!   [`normalize`] before it becomes a domain type
//!
//! # Resources
//!
//! - `cart` - provisioned once per session, identified by an opaque id
//! - `cart_item` - lines of a cart, listed with embedded product data
//! - `order` - created from a cart at checkout
//! - `product` - catalog reads (see [`crate::catalog`])

use std::future::Future;

use thehub_core::{Cart, CartId, CartItemId, Quantity};
use thiserror::Error;

mod client;
pub mod normalize;
pub mod types;

pub use client::RestBackend;
pub use types::{NewCartItem, OrderItemInput, OrderRecord, OrderRequest, ProvisionedCart};

/// Errors that can occur when talking to the remote backend.
///
/// Messages are stored as strings so the error is `Clone` and can be shared
/// by every caller of a coalesced request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// The backend no longer recognizes the resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend rejected the session credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Gateway misconfiguration (bad base URL, invalid token header).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether the backend reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the backend rejected the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Cart-related REST calls consumed by [`crate::cart::CartStore`].
///
/// [`RestBackend`] is the production implementation; tests substitute an
/// in-memory fake.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait CartBackend: Send + Sync + 'static {
    /// `POST /cart` - provision a new cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no id.
    fn create_cart(&self) -> impl Future<Output = Result<ProvisionedCart, BackendError>> + Send;

    /// `GET /cart_item?cart_id=..&add_related_data=product` - fetch the
    /// canonical lines of a cart.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the cart is unknown, or another
    /// variant if the request fails.
    fn fetch_cart(&self, cart_id: &CartId)
    -> impl Future<Output = Result<Cart, BackendError>> + Send;

    /// `POST /cart_item` - add a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn create_item(
        &self,
        item: &NewCartItem,
    ) -> impl Future<Output = Result<serde_json::Value, BackendError>> + Send;

    /// `PATCH /cart_item/{id}` - set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn update_item_quantity(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<serde_json::Value, BackendError>> + Send;

    /// `DELETE /cart_item/{id}` - remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn delete_item(
        &self,
        item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `POST /order` - finalize a cart into an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn create_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderRecord, BackendError>> + Send;
}
