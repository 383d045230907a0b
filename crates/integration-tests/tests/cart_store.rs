//! Cart lifecycle through `CartStore` against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thehub_core::{AuthStatus, CartId, CartItemId, Price, ProductId};
use thehub_integration_tests::{CartShape, MockBackend, Route};
use thehub_storefront::backend::RestBackend;
use thehub_storefront::cart::{
    CartError, CartIdStore, CartStore, FileCartIdStore, MemoryCartIdStore, OrderDraft,
};

// =============================================================================
// Helpers
// =============================================================================

fn store_for(
    mock: &MockBackend,
    stored: Option<i64>,
) -> (CartStore<RestBackend>, Arc<MemoryCartIdStore>) {
    let storage = Arc::new(
        stored.map_or_else(MemoryCartIdStore::new, |id| {
            MemoryCartIdStore::with_cart_id(CartId::from(id))
        }),
    );
    let backend = RestBackend::new(&mock.config()).unwrap();
    let store = CartStore::new(backend, Arc::clone(&storage) as Arc<dyn CartIdStore>)
        .with_auth_throttle(Duration::ZERO);
    (store, storage)
}

async fn catalog_mock() -> MockBackend {
    let mock = MockBackend::start().await;
    mock.add_product(7, "Headphones", "audio", 10.5);
    mock.add_product(8, "Speaker", "audio", 25.0);
    mock.add_product(9, "Cable", "accessories", 3.25);
    mock
}

// =============================================================================
// Ensure and refresh
// =============================================================================

#[tokio::test]
async fn test_first_add_provisions_and_persists_cart() {
    let mock = catalog_mock().await;
    let (store, storage) = store_for(&mock, None);

    let state = store.add_item(&ProductId::from(7), 2).await.unwrap();

    assert_eq!(mock.hits(Route::CreateCart), 1);
    let cart_id = state.cart_id().cloned().unwrap();
    assert_eq!(storage.load().unwrap(), Some(cart_id));

    assert_eq!(state.items().len(), 1);
    let item = &state.items()[0];
    assert_eq!(item.product_id, ProductId::from(7));
    assert_eq!(item.quantity.get(), 2);
    assert_eq!(item.product.name, "Headphones");
    assert_eq!(state.total_price(), Price::new(Decimal::new(2100, 2)));
}

#[tokio::test]
async fn test_stale_stored_cart_is_replaced() {
    let mock = catalog_mock().await;
    let (store, storage) = store_for(&mock, Some(999));

    let cart_id = store.ensure_cart().await.unwrap();

    assert_ne!(cart_id, CartId::from(999));
    assert_eq!(storage.load().unwrap(), Some(cart_id.clone()));
    assert!(mock.has_cart(cart_id.as_str().parse().unwrap()));
    assert_eq!(mock.hits(Route::CreateCart), 1);
}

#[tokio::test]
async fn test_concurrent_refreshes_issue_one_request() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1), (8, 2)]);
    mock.set_fetch_delay(Duration::from_millis(200));
    let (store, _) = store_for(&mock, Some(cart_id));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.refresh(None).await })
        })
        .collect();

    let mut states = Vec::new();
    for handle in handles {
        states.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(mock.hits(Route::ListCartItems), 1);
    assert!(states.iter().all(|s| s == &states[0]));
    assert_eq!(states[0].total_items(), 3);
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 3), (9, 4)]);
    let (store, _) = store_for(&mock, Some(cart_id));

    let first = store.refresh(None).await.unwrap();
    let second = store.refresh(None).await.unwrap();

    assert_eq!(first.total_price(), second.total_price());
    assert_eq!(first.total_price(), Price::new(Decimal::new(4450, 2)));
}

#[tokio::test]
async fn test_every_listing_shape_yields_same_cart() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1), (8, 1)]);
    let (store, _) = store_for(&mock, Some(cart_id));

    let mut totals = Vec::new();
    for shape in [
        CartShape::Bare,
        CartShape::Items,
        CartShape::Related,
        CartShape::Unknown,
    ] {
        mock.set_cart_shape(shape);
        let state = store.refresh(None).await.unwrap();
        assert_eq!(state.items().len(), 2, "{shape:?}");
        totals.push(state.total_price());
    }
    assert!(totals.iter().all(|t| *t == Price::new(Decimal::new(3550, 2))));
}

#[tokio::test]
async fn test_cart_expired_server_side_self_heals() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    let (store, storage) = store_for(&mock, Some(cart_id));
    store.refresh(None).await.unwrap();

    mock.drop_cart(cart_id);
    let err = store.refresh(None).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(storage.load().unwrap(), None);
    assert!(store.state().items().is_empty());

    // The next write provisions a fresh cart
    let state = store.add_item(&ProductId::from(8), 1).await.unwrap();
    assert_ne!(state.cart_id(), Some(&CartId::from(cart_id)));
    assert_eq!(state.items().len(), 1);
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_invalid_quantity_never_reaches_backend() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    let item_id = mock.lines(cart_id)[0].0;
    let (store, _) = store_for(&mock, Some(cart_id));

    for quantity in [0, -3] {
        let err = store
            .update_quantity(&CartItemId::from(item_id), quantity)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity(_)));
    }
    assert_eq!(mock.hits(Route::UpdateCartItem), 0);
    assert_eq!(mock.hits(Route::ListCartItems), 0);
}

#[tokio::test]
async fn test_update_increment_decrement() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1), (8, 1)]);
    let item_id = CartItemId::from(mock.lines(cart_id)[0].0);
    let (store, _) = store_for(&mock, Some(cart_id));
    store.refresh(None).await.unwrap();

    let state = store.update_quantity(&item_id, 5).await.unwrap();
    assert_eq!(state.cart.find_item(&item_id).unwrap().quantity.get(), 5);

    let state = store.increment_item(&item_id).await.unwrap();
    assert_eq!(state.cart.find_item(&item_id).unwrap().quantity.get(), 6);

    store.update_quantity(&item_id, 1).await.unwrap();
    let state = store.decrement_item(&item_id).await.unwrap();
    assert!(state.cart.find_item(&item_id).is_none());
    assert_eq!(mock.lines(cart_id).len(), 1);
    assert_eq!(mock.hits(Route::DeleteCartItem), 1);
}

#[tokio::test]
async fn test_clear_with_failed_delete_reflects_backend() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1), (8, 1), (9, 1)]);
    let failing = mock.lines(cart_id)[2].0;
    mock.fail_delete_of(failing);
    let (store, _) = store_for(&mock, Some(cart_id));

    let err = store.clear().await.unwrap_err();

    assert!(matches!(
        err,
        CartError::PartialClear {
            failed: 1,
            attempted: 3,
            ..
        }
    ));
    assert_eq!(mock.hits(Route::DeleteCartItem), 3);
    let state = store.state();
    assert_eq!(state.items().len(), 1);
    assert_eq!(state.items()[0].id, CartItemId::from(failing));
    assert_eq!(state.last_error, Some(err));
}

// =============================================================================
// Checkout and session changes
// =============================================================================

#[tokio::test]
async fn test_checkout_sends_local_totals_and_forgets_cart() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 2), (9, 1)]);
    let (store, storage) = store_for(&mock, Some(cart_id));

    let order = store
        .checkout(OrderDraft {
            payment_method: Some("card".to_string()),
            ..OrderDraft::default()
        })
        .await
        .unwrap();

    assert_eq!(order.status.as_deref(), Some("pending"));
    let sent = &mock.orders()[0];
    assert_eq!(sent["cart_id"], serde_json::json!(cart_id));
    assert_eq!(sent["total_amount"], serde_json::json!(24.25));
    assert_eq!(sent["order_items"].as_array().unwrap().len(), 2);
    assert_eq!(sent["payment_method"], "card");
    assert_eq!(storage.load().unwrap(), None);
    assert!(store.state().cart_id().is_none());
}

#[tokio::test]
async fn test_failed_checkout_keeps_cart() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    mock.fail_orders(true);
    let (store, storage) = store_for(&mock, Some(cart_id));

    let err = store.checkout(OrderDraft::default()).await.unwrap_err();
    assert!(!err.is_not_found());
    assert_eq!(storage.load().unwrap(), Some(CartId::from(cart_id)));

    mock.fail_orders(false);
    store.checkout(OrderDraft::default()).await.unwrap();
    assert_eq!(mock.orders().len(), 1);
}

#[tokio::test]
async fn test_rejected_session_forgets_stored_cart() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    let (store, storage) = store_for(&mock, Some(cart_id));
    store.refresh(None).await.unwrap();

    mock.reject_sessions(true);
    let err = store.refresh(None).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(storage.load().unwrap(), None);
    assert!(store.state().cart_id().is_none());

    // Once the session is valid again a fresh cart is provisioned
    mock.reject_sessions(false);
    let state = store.add_item(&ProductId::from(8), 1).await.unwrap();
    assert_ne!(state.cart_id(), Some(&CartId::from(cart_id)));
    assert_eq!(mock.hits(Route::CreateCart), 1);
}

#[tokio::test]
async fn test_login_starts_a_new_cart() {
    let mock = catalog_mock().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    let (store, storage) = store_for(&mock, Some(cart_id));
    store.initialize().await.unwrap();

    store.handle_auth_change(AuthStatus::Anonymous).await.unwrap();
    store.handle_auth_change(AuthStatus::Checking).await.unwrap();
    assert_eq!(mock.hits(Route::CreateCart), 0);

    let state = store
        .handle_auth_change(AuthStatus::Authenticated)
        .await
        .unwrap();
    assert_eq!(mock.hits(Route::CreateCart), 1);
    assert!(state.items().is_empty());
    assert_ne!(state.cart_id(), Some(&CartId::from(cart_id)));
    assert_eq!(storage.load().unwrap().as_ref(), state.cart_id());
}

#[tokio::test]
async fn test_file_store_survives_new_store_instance() {
    let mock = catalog_mock().await;
    let path = std::env::temp_dir()
        .join(format!("thehub-it-{}", mock.base_url().replace([':', '/', '.'], "_")))
        .join("cart.json");

    let first = CartStore::new(
        RestBackend::new(&mock.config()).unwrap(),
        Arc::new(FileCartIdStore::new(&path)),
    );
    first.add_item(&ProductId::from(9), 3).await.unwrap();

    // A later process picks the cart up from disk
    let second = CartStore::new(
        RestBackend::new(&mock.config()).unwrap(),
        Arc::new(FileCartIdStore::new(&path)),
    );
    let state = second.initialize().await.unwrap();
    assert_eq!(state.total_items(), 3);
    assert_eq!(mock.hits(Route::CreateCart), 1);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}
