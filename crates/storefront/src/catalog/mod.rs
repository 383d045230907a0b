//! Product catalog reads.
//!
//! Uses the same REST gateway as the cart. Single products and unfiltered
//! listings are cached with `moka`; filtered and search listings always go
//! to the backend.

mod cache;

use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use thehub_core::{Product, ProductId};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::backend::normalize::{normalize_product, read_integer};
use crate::backend::{BackendError, RestBackend};
use crate::config::BackendConfig;

use cache::{CacheKey, CacheValue};

/// Page number used when the query names none.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size used when the query names none.
pub const DEFAULT_LIMIT: u32 = 12;
/// Related products returned when the caller names no count.
pub const DEFAULT_RELATED: u32 = 4;

/// Category names meaning "no category filter".
const ALL_CATEGORIES: &[&str] = &["todas", "all"];

/// Errors that can occur during catalog reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No product with this id.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// Product id was blank.
    #[error("Product id is required")]
    InvalidId,
}

/// Listing filters. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Page size.
    pub limit: Option<u32>,
    /// One-based page number.
    pub page: Option<u32>,
    /// Backend sort key.
    pub sort: Option<String>,
    /// Category name, matched case-insensitively.
    pub category: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
    /// Restrict to featured products.
    pub featured: Option<bool>,
}

impl ProductQuery {
    /// Normalized category filter; `None` for blank or "all" categories.
    #[must_use]
    pub fn category_filter(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty() && !ALL_CATEGORIES.contains(&c.as_str()))
    }

    /// Whether the query narrows the listing beyond paging and sorting.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.category_filter().is_some()
            || self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.featured.is_some()
    }

    /// Query string parameters.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("sort", sort.trim().to_string()));
        }
        if let Some(category) = self.category_filter() {
            params.push(("category", category));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("q", search.trim().to_string()));
        }
        if let Some(featured) = self.featured {
            params.push(("is_featured", featured.to_string()));
        }
        params
    }

    fn cache_key(&self) -> Option<CacheKey> {
        (!self.is_filtered()).then(|| CacheKey::Products {
            page: self.page,
            limit: self.limit,
            sort: self.sort.clone(),
        })
    }
}

/// One page of products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    /// Products on this page.
    pub items: Vec<Product>,
    /// Total products matching the query, or the page size when unknown.
    pub total: u64,
    /// Page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Cached read access to the product catalog.
#[derive(Clone)]
pub struct CatalogClient {
    backend: RestBackend,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a catalog client caching entries for `ttl`.
    #[must_use]
    pub fn new(backend: RestBackend, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { backend, cache }
    }

    /// Create a catalog client with its own gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self::new(RestBackend::new(config)?, config.catalog_cache_ttl))
    }

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, CatalogError> {
        let cache_key = query.cache_key();

        // Check cache (only for unfiltered listings)
        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(page)) = self.cache.get(key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let body = self.backend.get_json("/product", &query.to_params()).await?;
        let items = product_list(&body);
        let page = ProductPage {
            total: body
                .get("total")
                .and_then(read_integer)
                .and_then(|t| u64::try_from(t).ok())
                .unwrap_or(items.len() as u64),
            items,
            page: query.page.unwrap_or(DEFAULT_PAGE),
            limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        };

        if let Some(key) = cache_key {
            self.cache
                .insert(key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the backend does not know the
    /// product, or another error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        if id.is_blank() {
            return Err(CatalogError::InvalidId);
        }
        let cache_key = CacheKey::Product(id.clone());

        // Check cache
        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let body = match self.backend.get_json(&format!("/product/{id}"), &[]).await {
            Ok(body) => body,
            Err(err) if err.is_not_found() => return Err(CatalogError::NotFound(id.clone())),
            Err(err) => return Err(err.into()),
        };
        let product = normalize_product(&body).ok_or_else(|| CatalogError::NotFound(id.clone()))?;

        self.cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get up to `n` products related to `id` (default 4).
    ///
    /// A blank id yields an empty list without a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn related_products(
        &self,
        id: &ProductId,
        n: Option<u32>,
    ) -> Result<Vec<Product>, CatalogError> {
        if id.is_blank() {
            return Ok(Vec::new());
        }
        let n = n.unwrap_or(DEFAULT_RELATED);
        let body = self
            .backend
            .get_json(&format!("/product/{id}/related"), &[("n", n.to_string())])
            .await?;
        Ok(product_list(&body))
    }

    /// Drop a cached product.
    pub async fn invalidate_product(&self, id: &ProductId) {
        self.cache.invalidate(&CacheKey::Product(id.clone())).await;
    }
}

/// Products from a bare array or an `{items: [...]}` envelope.
fn product_list(body: &Value) -> Vec<Product> {
    let raw = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(fields) => fields
            .get("items")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice),
        _ => &[],
    };
    raw.iter().filter_map(normalize_product).collect()
}
