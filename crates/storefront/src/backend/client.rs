//! REST client for the cart, order and product resources.

use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use thehub_core::{Cart, CartId, CartItemId, Quantity, UserId};
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::normalize::{normalize_cart, read_id};
use super::types::{NewCartItem, OrderRecord, OrderRequest, ProvisionedCart};
use super::{BackendError, CartBackend};
use crate::config::BackendConfig;

/// Characters of an error body kept in logs.
const LOGGED_BODY_CHARS: usize = 500;
/// Characters of an error body kept in the returned error.
const ERROR_BODY_CHARS: usize = 200;

// =============================================================================
// RestBackend
// =============================================================================

/// Client for the backend REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    order_endpoint: String,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .field("order_endpoint", &self.inner.order_endpoint)
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url: config.base_url.clone(),
                token: config.api_token.clone(),
                order_endpoint: config.order_endpoint.clone(),
            }),
        })
    }

    /// Base URL every resource path is appended to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// `GET` a resource and return the raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not JSON.
    #[instrument(skip(self, query))]
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BackendError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        self.send::<Value>(Method::GET, url, None).await
    }

    /// Resolve `path` against the base URL.
    ///
    /// Segments are appended to the base path and percent-encoded, so
    /// `/cart_item/12` under `https://host/api:abc` becomes
    /// `https://host/api:abc/cart_item/12`.
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.endpoint_with(&segments)
    }

    /// Append `segments` to the base URL, each encoded as exactly one path
    /// segment (a `/` inside an id is escaped, not split).
    fn endpoint_with(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::Config(format!(
                    "base URL cannot carry a path: {}",
                    self.inner.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the parsed JSON body.
    ///
    /// An empty success body is returned as `Value::Null`.
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Value, BackendError> {
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, %url, %request_id, "Sending backend request");

        let mut request = self
            .inner
            .client
            .request(method.clone(), url.clone())
            .header("X-Request-Id", &request_id)
            .header("Accept", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(%method, %url, %request_id, "Backend resource not found");
            return Err(BackendError::NotFound(format!("{method} {}", url.path())));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(%method, %url, %request_id, "Backend rejected the session");
            return Err(BackendError::Unauthorized(
                response_text.chars().take(ERROR_BODY_CHARS).collect(),
            ));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                %request_id,
                body = %response_text.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                %request_id,
                body = %response_text.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e.to_string())
        })
    }
}

impl CartBackend for RestBackend {
    #[instrument(skip(self))]
    async fn create_cart(&self) -> Result<ProvisionedCart, BackendError> {
        let url = self.endpoint("/cart")?;
        let body = self.send(Method::POST, url, Some(&json!({}))).await?;

        let id = body
            .get("id")
            .and_then(read_id)
            .map(CartId::new)
            .ok_or_else(|| BackendError::Parse("cart response has no id".to_string()))?;
        let user_id = body.get("user_id").and_then(read_id).map(UserId::new);

        debug!(cart_id = %id, "Provisioned cart");
        Ok(ProvisionedCart { id, user_id })
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Cart, BackendError> {
        let body = self
            .get_json(
                "/cart_item",
                &[
                    ("cart_id", cart_id.to_string()),
                    ("add_related_data", "product".to_string()),
                ],
            )
            .await?;
        Ok(normalize_cart(cart_id, &body))
    }

    #[instrument(skip(self, item), fields(cart_id = %item.cart_id, product_id = %item.product_id))]
    async fn create_item(&self, item: &NewCartItem) -> Result<Value, BackendError> {
        let url = self.endpoint("/cart_item")?;
        self.send(Method::POST, url, Some(item)).await
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update_item_quantity(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> Result<Value, BackendError> {
        let url = self.endpoint_with(&["cart_item", item_id.as_str()])?;
        self.send(Method::PATCH, url, Some(&json!({ "quantity": quantity })))
            .await
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn delete_item(&self, item_id: &CartItemId) -> Result<(), BackendError> {
        let url = self.endpoint_with(&["cart_item", item_id.as_str()])?;
        self.send::<Value>(Method::DELETE, url, None).await?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(cart_id = %order.cart_id))]
    async fn create_order(&self, order: &OrderRequest) -> Result<OrderRecord, BackendError> {
        let url = self.endpoint(&self.inner.order_endpoint)?;
        let body = match self.send(Method::POST, url, Some(order)).await? {
            Value::Null => json!({}),
            body => body,
        };
        serde_json::from_value(body).map_err(|e| BackendError::Parse(e.to_string()))
    }
}
