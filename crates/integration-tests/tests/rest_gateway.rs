//! Wire behavior of `RestBackend` against the mock backend.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use secrecy::SecretString;
use thehub_core::{CartId, CartItemId, ProductId, Quantity};
use thehub_integration_tests::{MockBackend, Route};
use thehub_storefront::backend::{BackendError, CartBackend, NewCartItem, RestBackend};

#[tokio::test]
async fn test_create_cart_returns_id() {
    let mock = MockBackend::start().await;
    let backend = RestBackend::new(&mock.config()).unwrap();

    let cart = backend.create_cart().await.unwrap();

    assert!(mock.has_cart(cart.id.as_str().parse().unwrap()));
    assert_eq!(cart.user_id, None);
}

#[tokio::test]
async fn test_unknown_cart_is_not_found() {
    let mock = MockBackend::start().await;
    let backend = RestBackend::new(&mock.config()).unwrap();

    let err = backend.fetch_cart(&CartId::from(404)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_item_round_trip() {
    let mock = MockBackend::start().await;
    mock.add_product(7, "Headphones", "audio", 10.5);
    let cart_id = mock.seed_cart(&[]);
    let backend = RestBackend::new(&mock.config()).unwrap();

    backend
        .create_item(&NewCartItem {
            cart_id: CartId::from(cart_id),
            product_id: ProductId::from(7),
            quantity: Quantity::new(2).unwrap(),
        })
        .await
        .unwrap();
    let (item_id, product_id, quantity) = mock.lines(cart_id)[0];
    assert_eq!((product_id, quantity), (7, 2));

    backend
        .update_item_quantity(&CartItemId::from(item_id), Quantity::new(4).unwrap())
        .await
        .unwrap();
    let cart = backend.fetch_cart(&CartId::from(cart_id)).await.unwrap();
    assert_eq!(cart.items[0].quantity.get(), 4);
    assert_eq!(cart.items[0].product.images, vec!["https://cdn.example.io/7.jpg"]);

    backend.delete_item(&CartItemId::from(item_id)).await.unwrap();
    assert!(mock.lines(cart_id).is_empty());
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let mock = MockBackend::start().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    let item_id = mock.lines(cart_id)[0].0;
    mock.fail_delete_of(item_id);
    let backend = RestBackend::new(&mock.config()).unwrap();

    let err = backend
        .delete_item(&CartItemId::from(item_id))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            status: 500,
            message: "database unavailable".to_string(),
        }
    );
}

#[tokio::test]
async fn test_rejected_session_maps_to_unauthorized() {
    let mock = MockBackend::start().await;
    let cart_id = mock.seed_cart(&[(7, 1)]);
    mock.reject_sessions(true);
    let backend = RestBackend::new(&mock.config()).unwrap();

    let err = backend.fetch_cart(&CartId::from(cart_id)).await.unwrap_err();
    assert_eq!(err, BackendError::Unauthorized("expired".to_string()));
}

#[tokio::test]
async fn test_item_id_with_slash_stays_one_segment() {
    let mock = MockBackend::start().await;
    let backend = RestBackend::new(&mock.config()).unwrap();

    let err = backend
        .delete_item(&CartItemId::from("7/cart_item/8"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(mock.hits(Route::DeleteCartItem), 1);
}

#[tokio::test]
async fn test_headers_carry_token_and_request_id() {
    let mock = MockBackend::start().await;
    let mut config = mock.config();
    config.api_token = Some(SecretString::from("session-token-123"));
    let backend = RestBackend::new(&config).unwrap();

    backend.create_cart().await.unwrap();
    backend.create_cart().await.unwrap();

    assert_eq!(mock.hits(Route::CreateCart), 2);
    assert!(
        mock.authorizations()
            .iter()
            .all(|auth| auth.as_deref() == Some("Bearer session-token-123"))
    );
    let ids: HashSet<String> = mock.request_ids().into_iter().collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_anonymous_requests_have_no_token() {
    let mock = MockBackend::start().await;
    let backend = RestBackend::new(&mock.config()).unwrap();

    backend.create_cart().await.unwrap();
    assert_eq!(mock.authorizations(), vec![None]);
}
