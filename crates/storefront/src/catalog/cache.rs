//! Cache types for catalog responses.

use thehub_core::{Product, ProductId};

use super::ProductPage;

/// Cache key for products and product listings.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products {
        page: Option<u32>,
        limit: Option<u32>,
        sort: Option<String>,
    },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
}
