//! Request and response bodies for the cart and order resources.

use serde::{Deserialize, Serialize};
use thehub_core::{AddressId, Cart, CartId, OrderId, Price, ProductId, Quantity, UserId};

/// A freshly provisioned cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedCart {
    /// Cart ID issued by the backend.
    pub id: CartId,
    /// Owning user, when the request was authenticated.
    pub user_id: Option<UserId>,
}

impl From<ProvisionedCart> for Cart {
    fn from(cart: ProvisionedCart) -> Self {
        Self {
            id: Some(cart.id),
            user_id: cart.user_id,
            items: Vec::new(),
        }
    }
}

/// Body of `POST /cart_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCartItem {
    /// Target cart.
    pub cart_id: CartId,
    /// Product to add.
    pub product_id: ProductId,
    /// Units to add.
    pub quantity: Quantity,
}

/// One line of an order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemInput {
    /// Ordered product.
    pub product_id: ProductId,
    /// Ordered units.
    pub quantity: Quantity,
}

/// Body of `POST /order`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    /// Cart being finalized.
    pub cart_id: CartId,
    /// Total computed from the local cart.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_amount: Option<rust_decimal::Decimal>,
    /// Ordering user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Shipping address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    /// Lines copied from the local cart.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_items: Vec<OrderItemInput>,
    /// Payment method label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl OrderRequest {
    /// Build a request for `cart`, copying its lines and recomputed total.
    #[must_use]
    pub fn for_cart(cart_id: CartId, cart: &Cart) -> Self {
        let total: Price = cart.total_price();
        Self {
            cart_id,
            total_amount: (!cart.is_empty()).then(|| total.amount()),
            user_id: cart.user_id.clone(),
            address_id: None,
            order_items: cart
                .items
                .iter()
                .map(|item| OrderItemInput {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            payment_method: None,
        }
    }
}

/// Order returned by `POST /order`.
///
/// Only the id and status are interpreted; everything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderRecord {
    /// Order ID.
    #[serde(default)]
    pub id: Option<OrderId>,
    /// Backend order status.
    #[serde(default)]
    pub status: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use thehub_core::{CartItem, CartItemId, Product};

    use super::*;

    #[test]
    fn test_new_cart_item_body() {
        let body = NewCartItem {
            cart_id: CartId::from("12"),
            product_id: ProductId::from(7),
            quantity: Quantity::new(2).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"cart_id": 12, "product_id": 7, "quantity": 2})
        );
    }

    #[test]
    fn test_order_request_for_cart() {
        let product_id = ProductId::from(7);
        let cart = Cart {
            id: Some(CartId::from(3)),
            user_id: Some(UserId::from(9)),
            items: vec![CartItem {
                id: CartItemId::from(1),
                cart_id: None,
                product_id: product_id.clone(),
                quantity: Quantity::new(2).unwrap(),
                product: Product::new(product_id, Price::new(Decimal::new(1050, 2))),
            }],
        };

        let request = OrderRequest::for_cart(CartId::from(3), &cart);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "cart_id": 3,
                "total_amount": 21.0,
                "user_id": 9,
                "order_items": [{"product_id": 7, "quantity": 2}],
            })
        );
    }

    #[test]
    fn test_order_request_for_empty_cart_sends_only_cart_id() {
        let request = OrderRequest::for_cart(CartId::from("abc"), &Cart::default());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"cart_id": "abc"})
        );
    }

    #[test]
    fn test_order_record_keeps_unknown_fields() {
        let record: OrderRecord =
            serde_json::from_value(json!({"id": 44, "status": "paid", "total": 10})).unwrap();
        assert_eq!(record.id, Some(OrderId::from(44)));
        assert_eq!(record.status.as_deref(), Some("paid"));
        assert_eq!(record.extra.get("total"), Some(&json!(10)));
    }
}
