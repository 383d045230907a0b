//! Catalog product and the snapshot embedded in cart lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A catalog product.
///
/// Cart lines carry a denormalized copy of the product, taken when the cart
/// was fetched, which is used for display and subtotal computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Lower-cased category slug.
    pub category: String,
    /// Brand name (empty when unknown).
    pub brand: String,
    /// Unit price.
    pub price: Price,
    /// Units in stock, when the backend reports it.
    pub stock: Option<i64>,
    /// Image URLs in display order.
    pub images: Vec<String>,
    /// Primary image URL.
    pub image: Option<String>,
    /// Creation time, when the backend reports it.
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Create a product with only an ID and price set.
    #[must_use]
    pub fn new(id: ProductId, price: Price) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            category: String::new(),
            brand: String::new(),
            price,
            stock: None,
            images: Vec::new(),
            image: None,
            created_at: None,
        }
    }

    /// Whether the backend reported the product as out of stock.
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock.is_some_and(|stock| stock <= 0)
    }
}
