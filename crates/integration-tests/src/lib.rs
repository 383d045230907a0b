//! End-to-end tests for the THEHUB storefront client.
//!
//! [`MockBackend`] serves the cart, order and product resources from memory
//! on `127.0.0.1:0`, so the real `RestBackend`, `CartStore` and
//! `CatalogClient` can be driven over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p thehub-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - cart lifecycle through the store
//! - `rest_gateway` - wire format of the REST gateway
//! - `catalog` - product reads and caching

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use thehub_storefront::config::BackendConfig;
use tokio::task::JoinHandle;

/// Route names used by [`MockBackend::hits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    CreateCart,
    ListCartItems,
    CreateCartItem,
    UpdateCartItem,
    DeleteCartItem,
    CreateOrder,
    ListProducts,
    GetProduct,
    RelatedProducts,
}

/// Envelope used for `GET /cart_item` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartShape {
    /// A bare JSON array.
    #[default]
    Bare,
    /// `{ "items": [...] }`
    Items,
    /// `{ "_cart_item_of_cart_of_product": [...] }`
    Related,
    /// `{ "lines": [...] }`, a field the client does not know by name.
    Unknown,
}

#[derive(Debug, Clone)]
struct MockLine {
    id: i64,
    product_id: i64,
    quantity: i64,
}

#[derive(Default)]
struct MockData {
    next_id: i64,
    carts: HashMap<i64, Vec<MockLine>>,
    products: BTreeMap<i64, Value>,
    failing_deletes: HashSet<i64>,
    fail_orders: bool,
    reject_sessions: bool,
    orders: Vec<Value>,
    cart_shape: CartShape,
    fetch_delay: Option<Duration>,
    hits: HashMap<Route, usize>,
    authorizations: Vec<Option<String>>,
    request_ids: Vec<String>,
}

impl MockData {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, route: Route, headers: &HeaderMap) {
        *self.hits.entry(route).or_default() += 1;
        self.authorizations.push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            self.request_ids.push(id.to_string());
        }
    }

    fn line_json(&self, cart_id: i64, line: &MockLine) -> Value {
        json!({
            "id": line.id,
            "cart_id": cart_id,
            "product_id": line.product_id,
            "quantity": line.quantity,
            "product": self.products.get(&line.product_id).cloned().unwrap_or(Value::Null),
        })
    }
}

type SharedData = Arc<Mutex<MockData>>;

fn lock(data: &SharedData) -> std::sync::MutexGuard<'_, MockData> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "expired").into_response()
}

// =============================================================================
// MockBackend
// =============================================================================

/// In-memory backend serving the REST resources the client uses.
pub struct MockBackend {
    addr: SocketAddr,
    data: SharedData,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let data: SharedData = Arc::default();
        let router = Router::new()
            .route("/cart", post(create_cart))
            .route("/cart_item", get(list_cart_items).post(create_cart_item))
            .route("/cart_item/{id}", patch(update_cart_item).delete(delete_cart_item))
            .route("/order", post(create_order))
            .route("/product", get(list_products))
            .route("/product/{id}", get(get_product))
            .route("/product/{id}/related", get(related_products))
            .with_state(Arc::clone(&data));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, data, server }
    }

    /// Base URL of the mock.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at the mock.
    #[must_use]
    pub fn config(&self) -> BackendConfig {
        BackendConfig::new(&self.base_url()).unwrap()
    }

    /// Add a catalog product.
    pub fn add_product(&self, id: i64, name: &str, category: &str, price: f64) {
        lock(&self.data).products.insert(
            id,
            json!({
                "id": id,
                "name": name,
                "description": format!("{name} description"),
                "category": category,
                "brand": "Acme",
                "price": price,
                "stock_quantity": 10,
                "image_url": [{"url": format!("https://cdn.example.io/{id}.jpg")}],
                "created_at": 1_700_000_000_000_i64,
            }),
        );
    }

    /// Create a cart holding `lines` of `(product_id, quantity)`.
    pub fn seed_cart(&self, lines: &[(i64, i64)]) -> i64 {
        let mut data = lock(&self.data);
        let cart_id = data.next();
        let lines = lines
            .iter()
            .map(|&(product_id, quantity)| MockLine {
                id: data.next(),
                product_id,
                quantity,
            })
            .collect();
        data.carts.insert(cart_id, lines);
        cart_id
    }

    /// Whether the backend knows `cart_id`.
    #[must_use]
    pub fn has_cart(&self, cart_id: i64) -> bool {
        lock(&self.data).carts.contains_key(&cart_id)
    }

    /// Forget a cart, as if it expired server-side.
    pub fn drop_cart(&self, cart_id: i64) {
        lock(&self.data).carts.remove(&cart_id);
    }

    /// `(item_id, product_id, quantity)` of each line of a cart.
    #[must_use]
    pub fn lines(&self, cart_id: i64) -> Vec<(i64, i64, i64)> {
        lock(&self.data)
            .carts
            .get(&cart_id)
            .map(|lines| {
                lines
                    .iter()
                    .map(|l| (l.id, l.product_id, l.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make `DELETE /cart_item/{item_id}` fail with a 500.
    pub fn fail_delete_of(&self, item_id: i64) {
        lock(&self.data).failing_deletes.insert(item_id);
    }

    /// Make `POST /order` fail with a 500.
    pub fn fail_orders(&self, fail: bool) {
        lock(&self.data).fail_orders = fail;
    }

    /// Answer cart listings and orders with a 401.
    pub fn reject_sessions(&self, reject: bool) {
        lock(&self.data).reject_sessions = reject;
    }

    /// Choose the envelope of cart listings.
    pub fn set_cart_shape(&self, shape: CartShape) {
        lock(&self.data).cart_shape = shape;
    }

    /// Delay every cart listing.
    pub fn set_fetch_delay(&self, delay: Duration) {
        lock(&self.data).fetch_delay = Some(delay);
    }

    /// Requests received on `route`.
    #[must_use]
    pub fn hits(&self, route: Route) -> usize {
        lock(&self.data).hits.get(&route).copied().unwrap_or(0)
    }

    /// Bodies of the orders created so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        lock(&self.data).orders.clone()
    }

    /// `Authorization` header of every request, in arrival order.
    #[must_use]
    pub fn authorizations(&self) -> Vec<Option<String>> {
        lock(&self.data).authorizations.clone()
    }

    /// `X-Request-Id` header of every request that carried one.
    #[must_use]
    pub fn request_ids(&self) -> Vec<String> {
        lock(&self.data).request_ids.clone()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_cart(State(data): State<SharedData>, headers: HeaderMap) -> Response {
    let mut data = lock(&data);
    data.record(Route::CreateCart, &headers);
    let cart_id = data.next();
    data.carts.insert(cart_id, Vec::new());
    Json(json!({"id": cart_id, "user_id": null, "created_at": 1_700_000_000_000_i64})).into_response()
}

async fn list_cart_items(
    State(data): State<SharedData>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let delay = {
        let mut data = lock(&data);
        data.record(Route::ListCartItems, &headers);
        data.fetch_delay
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let data = lock(&data);
    if data.reject_sessions {
        return unauthorized();
    }
    let Some(cart_id) = query.get("cart_id").and_then(|id| id.parse::<i64>().ok()) else {
        return not_found();
    };
    let Some(lines) = data.carts.get(&cart_id) else {
        return not_found();
    };
    let items: Vec<Value> = lines.iter().map(|l| data.line_json(cart_id, l)).collect();

    let body = match data.cart_shape {
        CartShape::Bare => Value::Array(items),
        CartShape::Items => json!({"id": cart_id, "items": items}),
        CartShape::Related => json!({"id": cart_id, "_cart_item_of_cart_of_product": items}),
        CartShape::Unknown => json!({"id": cart_id, "tags": "none", "lines": items}),
    };
    Json(body).into_response()
}

async fn create_cart_item(
    State(data): State<SharedData>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::CreateCartItem, &headers);

    let cart_id = body["cart_id"].as_i64().unwrap_or_default();
    let product_id = body["product_id"].as_i64().unwrap_or_default();
    let quantity = body["quantity"].as_i64().unwrap_or_default();
    if quantity <= 0 {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "quantity"}))).into_response();
    }
    if !data.carts.contains_key(&cart_id) {
        return not_found();
    }

    let line = MockLine {
        id: data.next(),
        product_id,
        quantity,
    };
    let response = data.line_json(cart_id, &line);
    if let Some(lines) = data.carts.get_mut(&cart_id) {
        lines.push(line);
    }
    Json(response).into_response()
}

async fn update_cart_item(
    State(data): State<SharedData>,
    Path(item_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::UpdateCartItem, &headers);

    let Some(quantity) = body["quantity"].as_i64().filter(|q| *q > 0) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "quantity"}))).into_response();
    };
    let Some(line) = data
        .carts
        .values_mut()
        .flat_map(|lines| lines.iter_mut())
        .find(|line| line.id == item_id)
    else {
        return not_found();
    };
    line.quantity = quantity;
    Json(json!({"id": item_id, "quantity": quantity})).into_response()
}

async fn delete_cart_item(
    State(data): State<SharedData>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::DeleteCartItem, &headers);

    let Ok(item_id) = item_id.parse::<i64>() else {
        return not_found();
    };

    if data.failing_deletes.contains(&item_id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }
    let mut found = false;
    for lines in data.carts.values_mut() {
        let before = lines.len();
        lines.retain(|line| line.id != item_id);
        found |= lines.len() != before;
    }
    if found {
        StatusCode::OK.into_response()
    } else {
        not_found()
    }
}

async fn create_order(
    State(data): State<SharedData>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::CreateOrder, &headers);

    if data.reject_sessions {
        return unauthorized();
    }
    if data.fail_orders {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "payment declined"})),
        )
            .into_response();
    }
    let order_id = data.next();
    data.orders.push(body.clone());
    Json(json!({
        "id": order_id,
        "status": "pending",
        "cart_id": body["cart_id"],
        "total_amount": body["total_amount"],
    }))
    .into_response()
}

async fn list_products(
    State(data): State<SharedData>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::ListProducts, &headers);

    let matching: Vec<Value> = data
        .products
        .values()
        .filter(|p| {
            query
                .get("category")
                .is_none_or(|c| p["category"].as_str() == Some(c.as_str()))
        })
        .filter(|p| {
            query.get("q").is_none_or(|q| {
                p["name"]
                    .as_str()
                    .is_some_and(|name| name.to_lowercase().contains(&q.to_lowercase()))
            })
        })
        .cloned()
        .collect();

    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(12);
    let page = query
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1);
    let items: Vec<Value> = matching
        .iter()
        .skip(page.saturating_sub(1) * limit)
        .take(limit)
        .cloned()
        .collect();

    Json(json!({"items": items, "total": matching.len()})).into_response()
}

async fn get_product(
    State(data): State<SharedData>,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::GetProduct, &headers);
    data.products
        .get(&product_id)
        .map_or_else(not_found, |p| Json(p.clone()).into_response())
}

async fn related_products(
    State(data): State<SharedData>,
    Path(product_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut data = lock(&data);
    data.record(Route::RelatedProducts, &headers);

    let n = query
        .get("n")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(4);
    let related: Vec<Value> = data
        .products
        .iter()
        .filter(|(id, _)| **id != product_id)
        .map(|(_, p)| p.clone())
        .take(n)
        .collect();
    Json(Value::Array(related)).into_response()
}
