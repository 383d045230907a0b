//! Catalog commands.

use std::fmt::Write as _;

use serde_json::json;
use thehub_core::{Product, ProductId};
use thehub_storefront::backend::BackendError;
use thehub_storefront::catalog::{CatalogClient, ProductPage, ProductQuery};
use thehub_storefront::config::BackendConfig;

use super::{CommandError, OutputFormat, emit};

/// Build a catalog client with the configured cache lifetime.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn open_catalog(config: &BackendConfig) -> Result<CatalogClient, BackendError> {
    CatalogClient::from_config(config)
}

/// List one page of products.
pub async fn list(
    catalog: &CatalogClient,
    query: &ProductQuery,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let page = catalog.list_products(query).await?;
    match format {
        OutputFormat::Json => emit(&serde_json::to_string_pretty(&json!({
            "items": page.items,
            "total": page.total,
            "page": page.page,
            "limit": page.limit,
        }))?),
        OutputFormat::Text => emit(&render_page(&page)),
    }
}

/// Show one product.
pub async fn show(catalog: &CatalogClient, id: &str, format: OutputFormat) -> Result<(), CommandError> {
    let product = catalog.get_product(&ProductId::new(id)).await?;
    match format {
        OutputFormat::Json => emit(&serde_json::to_string_pretty(&product)?),
        OutputFormat::Text => emit(&render_product(&product)),
    }
}

/// List products related to `id`.
pub async fn related(
    catalog: &CatalogClient,
    id: &str,
    n: u32,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let products = catalog.related_products(&ProductId::new(id), Some(n)).await?;
    match format {
        OutputFormat::Json => emit(&serde_json::to_string_pretty(&products)?),
        OutputFormat::Text => {
            let mut out = String::new();
            for product in &products {
                let _ = writeln!(out, "{}", summary_line(product));
            }
            emit(out.trim_end())
        }
    }
}

fn summary_line(product: &Product) -> String {
    let mut line = format!("[{}] {} - {}", product.id, product.name, product.price);
    if !product.category.is_empty() {
        let _ = write!(line, " ({})", product.category);
    }
    if product.is_out_of_stock() {
        line.push_str(" [out of stock]");
    }
    line
}

/// Human-readable page listing.
pub fn render_page(page: &ProductPage) -> String {
    let mut out = String::new();
    for product in &page.items {
        let _ = writeln!(out, "{}", summary_line(product));
    }
    let _ = write!(
        out,
        "Page {} ({} per page), {} products",
        page.page, page.limit, page.total
    );
    out
}

/// Human-readable product details.
pub fn render_product(product: &Product) -> String {
    let mut out = summary_line(product);
    if !product.brand.is_empty() {
        let _ = write!(out, "\nBrand: {}", product.brand);
    }
    if let Some(stock) = product.stock {
        let _ = write!(out, "\nStock: {stock}");
    }
    if !product.description.is_empty() {
        let _ = write!(out, "\n\n{}", product.description);
    }
    for image in &product.images {
        let _ = write!(out, "\nImage: {image}");
    }
    out
}
