//! Cart commands.
//!
//! # Environment Variables
//!
//! - `THEHUB_API_BASE_URL` - Backend base URL
//! - `THEHUB_STATE_DIR` / `THEHUB_CART_KEY` - Where the cart id is kept

use std::fmt::Write as _;
use std::sync::Arc;

use thehub_core::{AddressId, CartItemId, ProductId, UserId};
use thehub_storefront::backend::{BackendError, OrderRecord, RestBackend};
use thehub_storefront::cart::{CartState, CartStore, FileCartIdStore, OrderDraft};
use thehub_storefront::config::BackendConfig;

use super::{CommandError, OutputFormat, emit};

/// Direction of a one-unit quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

/// Build a store whose cart id lives in the configured state directory.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn open_store(config: &BackendConfig) -> Result<CartStore<RestBackend>, BackendError> {
    let backend = RestBackend::new(config)?;
    let storage = Arc::new(FileCartIdStore::new(config.cart_id_path()));
    tracing::debug!(path = %storage.path().display(), "Using cart id file");
    Ok(CartStore::new(backend, storage))
}

/// Print the current cart without provisioning one.
pub async fn show(store: &CartStore<RestBackend>, format: OutputFormat) -> Result<(), CommandError> {
    let state = store.refresh(None).await?;
    print_state(&state, format)
}

/// Add `quantity` units of `product`.
pub async fn add(
    store: &CartStore<RestBackend>,
    product: &str,
    quantity: i64,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let state = store.add_item(&ProductId::new(product), quantity).await?;
    print_state(&state, format)
}

/// Set the quantity of a line.
pub async fn set(
    store: &CartStore<RestBackend>,
    item: &str,
    quantity: i64,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let state = store
        .update_quantity(&CartItemId::new(item), quantity)
        .await?;
    print_state(&state, format)
}

/// Add or remove one unit of a line.
pub async fn step(
    store: &CartStore<RestBackend>,
    item: &str,
    step: Step,
    format: OutputFormat,
) -> Result<(), CommandError> {
    // Lines are looked up in local state, so load it first
    store.refresh(None).await?;
    let item_id = CartItemId::new(item);
    if store.state().cart.find_item(&item_id).is_none() {
        tracing::warn!(item_id = %item_id, "No such line in the cart");
    }
    let state = match step {
        Step::Up => store.increment_item(&item_id).await?,
        Step::Down => store.decrement_item(&item_id).await?,
    };
    print_state(&state, format)
}

/// Remove a line.
pub async fn remove(
    store: &CartStore<RestBackend>,
    item: &str,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let state = store.remove_item(&CartItemId::new(item)).await?;
    print_state(&state, format)
}

/// Remove every line.
///
/// On a partial failure the refreshed cart is printed before the error is
/// returned.
pub async fn clear(store: &CartStore<RestBackend>, format: OutputFormat) -> Result<(), CommandError> {
    match store.clear().await {
        Ok(state) => print_state(&state, format),
        Err(err) => {
            print_state(&store.state(), format)?;
            Err(err.into())
        }
    }
}

/// Turn the cart into an order.
pub async fn checkout(
    store: &CartStore<RestBackend>,
    user_id: Option<String>,
    address_id: Option<String>,
    payment_method: Option<String>,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let draft = OrderDraft {
        user_id: user_id.map(UserId::new),
        address_id: address_id.map(AddressId::new),
        payment_method,
    };
    let order = store.checkout(draft).await?;
    match format {
        OutputFormat::Json => emit(&serde_json::to_string_pretty(&order)?),
        OutputFormat::Text => emit(&render_order(&order)),
    }
}

fn print_state(state: &CartState, format: OutputFormat) -> Result<(), CommandError> {
    match format {
        OutputFormat::Json => emit(&serde_json::to_string_pretty(&state.cart)?),
        OutputFormat::Text => emit(&render_cart(state)),
    }
}

/// Human-readable cart listing.
pub fn render_cart(state: &CartState) -> String {
    let Some(cart_id) = state.cart_id() else {
        return "No cart yet. Add a product to start one.".to_string();
    };

    let mut out = format!("Cart {cart_id} ({} units)\n", state.total_items());
    for item in state.items() {
        let name = if item.product.name.is_empty() {
            format!("product {}", item.product_id)
        } else {
            item.product.name.clone()
        };
        let _ = writeln!(
            out,
            "  [{}] {name} x{} @ {} = {}",
            item.id,
            item.quantity.get(),
            item.product.price,
            item.subtotal()
        );
    }
    let _ = write!(out, "Total: {}", state.total_price());
    out
}

/// Human-readable order confirmation.
pub fn render_order(order: &OrderRecord) -> String {
    match (&order.id, &order.status) {
        (Some(id), Some(status)) => format!("Order {id} created ({status})"),
        (Some(id), None) => format!("Order {id} created"),
        (None, _) => "Order created".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use thehub_core::{Cart, CartId, CartItem, Price, Product, Quantity};

    use super::*;

    #[test]
    fn test_render_empty_state() {
        assert_eq!(
            render_cart(&CartState::default()),
            "No cart yet. Add a product to start one."
        );
    }

    #[test]
    fn test_render_cart_lines() {
        let mut product = Product::new(ProductId::from(7), Price::new(Decimal::new(1050, 2)));
        product.name = "Headphones".to_string();
        let state = CartState::from(Cart {
            id: Some(CartId::from(3)),
            user_id: None,
            items: vec![CartItem {
                id: CartItemId::from(41),
                cart_id: None,
                product_id: ProductId::from(7),
                quantity: Quantity::new(2).unwrap(),
                product,
            }],
        });

        assert_eq!(
            render_cart(&state),
            "Cart 3 (2 units)\n  [41] Headphones x2 @ $10.50 = $21.00\nTotal: $21.00"
        );
    }

    #[test]
    fn test_render_order() {
        let order: OrderRecord =
            serde_json::from_value(serde_json::json!({"id": 9, "status": "pending"})).unwrap();
        assert_eq!(render_order(&order), "Order 9 created (pending)");
    }
}
