//! Cart and cart line types.
//!
//! Totals are always derived from the lines held in memory; a total reported
//! by the backend is never trusted.

use serde::{Deserialize, Serialize};

use super::id::{CartId, CartItemId, ProductId, UserId};
use super::price::Price;
use super::product::Product;
use super::quantity::Quantity;

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart line ID.
    pub id: CartItemId,
    /// Parent cart, when the backend echoes it.
    pub cart_id: Option<CartId>,
    /// Referenced product.
    pub product_id: ProductId,
    /// Number of units (always positive).
    pub quantity: Quantity,
    /// Product snapshot taken when the cart was fetched.
    pub product: Product,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// A cart as seen by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Remote cart ID (`None` before the cart is provisioned).
    pub id: Option<CartId>,
    /// Owning user (`None` for anonymous sessions).
    pub user_id: Option<UserId>,
    /// Lines in backend order.
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of line subtotals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Find a line by ID.
    #[must_use]
    pub fn find_item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
