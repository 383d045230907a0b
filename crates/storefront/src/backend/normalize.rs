//! Response-shape normalization.
//!
//! The backend does not version its response shapes: a cart listing may come
//! back as a bare array, as `{ "items": [...] }`, or under a generated field
//! name, and prices and ids arrive as numbers or strings. Every body is read
//! through this module.
//!
//! # Item array lookup
//!
//! [`extract_item_array`] checks, in order:
//!
//! 1. the body itself, when it is an array;
//! 2. the fields listed in [`ITEM_ARRAY_FIELDS`], in that order;
//! 3. the first array-valued field of the object, in document order;
//! 4. otherwise, nothing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::{Map, Value};
use thehub_core::{Cart, CartId, CartItem, CartItemId, Price, Product, ProductId, Quantity, UserId};
use tracing::{debug, warn};

/// Known item-array field names, highest priority first.
pub const ITEM_ARRAY_FIELDS: &[&str] = &[
    "_cart_item_of_cart_of_product",
    "items",
    "cart_items",
    "_cart_items",
    "items_list",
];

/// Product price fields, highest priority first. The first non-zero wins.
const PRODUCT_PRICE_FIELDS: &[&str] = &["price", "price_value", "priceNumber"];

/// Locate the array of records in a response body.
#[must_use]
pub fn extract_item_array(body: &Value) -> &[Value] {
    match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(fields) => {
            if let Some(items) = ITEM_ARRAY_FIELDS
                .iter()
                .find_map(|name| fields.get(*name).and_then(Value::as_array))
            {
                return items.as_slice();
            }
            match fields.iter().find_map(|(name, v)| v.as_array().map(|a| (name, a))) {
                Some((name, items)) => {
                    debug!(field = %name, "Using fallback item array field");
                    items.as_slice()
                }
                None => &[],
            }
        }
        _ => &[],
    }
}

/// Normalize a cart listing for `cart_id`.
///
/// The returned cart always carries `cart_id`; lines that lack a product id
/// or a positive quantity are dropped.
#[must_use]
pub fn normalize_cart(cart_id: &CartId, body: &Value) -> Cart {
    let raw_items = extract_item_array(body);
    let items: Vec<CartItem> = raw_items.iter().filter_map(normalize_cart_item).collect();

    if items.len() != raw_items.len() {
        warn!(
            cart_id = %cart_id,
            dropped = raw_items.len() - items.len(),
            "Dropped cart lines without product id or positive quantity"
        );
    }

    Cart {
        id: Some(cart_id.clone()),
        user_id: body.get("user_id").and_then(read_id).map(UserId::new),
        items,
    }
}

/// Normalize one cart line.
///
/// Returns `None` when the record has no product id or no positive quantity.
#[must_use]
pub fn normalize_cart_item(raw: &Value) -> Option<CartItem> {
    let fields = raw.as_object()?;
    let empty = Map::new();
    let product = fields
        .get("product")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let product_id = fields
        .get("product_id")
        .and_then(read_id)
        .or_else(|| product.get("id").and_then(read_id))
        .map(ProductId::new)?;
    let quantity = fields.get("quantity").and_then(read_quantity)?;

    let mut snapshot = product_fields(product_id.clone(), product);
    if snapshot.price.is_zero()
        && let Some(price) = fields.get("price").and_then(read_decimal)
    {
        snapshot.price = Price::new(price);
    }

    Some(CartItem {
        id: fields
            .get("id")
            .and_then(read_id)
            .map_or_else(|| CartItemId::new(product_id.as_str()), CartItemId::new),
        cart_id: fields.get("cart_id").and_then(read_id).map(CartId::new),
        product_id,
        quantity,
        product: snapshot,
    })
}

/// Normalize a catalog product. Returns `None` when the record has no id.
#[must_use]
pub fn normalize_product(raw: &Value) -> Option<Product> {
    let fields = raw.as_object()?;
    let id = fields.get("id").and_then(read_id).map(ProductId::new)?;
    Some(product_fields(id, fields))
}

fn product_fields(id: ProductId, fields: &Map<String, Value>) -> Product {
    let (images, image) = read_images(fields);
    Product {
        id,
        name: read_text(fields.get("name")),
        description: read_text(fields.get("description")),
        category: read_text(fields.get("category").or_else(|| fields.get("categoria")))
            .to_lowercase(),
        brand: read_text(fields.get("brand")),
        price: PRODUCT_PRICE_FIELDS
            .iter()
            .filter_map(|name| fields.get(*name).and_then(read_decimal))
            .find(|price| !price.is_zero())
            .map_or(Price::ZERO, Price::new),
        stock: fields
            .get("stock")
            .filter(|v| !v.is_null())
            .or_else(|| fields.get("stock_quantity"))
            .and_then(read_integer),
        images,
        image,
        created_at: fields
            .get("created_at")
            .or_else(|| fields.get("createdAt"))
            .and_then(read_timestamp),
    }
}

/// Read an opaque id from a string or integer.
#[must_use]
pub fn read_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        _ => None,
    }
}

/// Read a decimal from a number or numeric string.
#[must_use]
pub fn read_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Read an integer, truncating fractional numbers.
#[must_use]
pub fn read_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                Decimal::from_str(s)
                    .ok()
                    .and_then(|d| d.trunc().to_i64())
            })
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)] // only the integer part is kept
fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

/// Read a positive quantity; anything else is treated as absent.
fn read_quantity(value: &Value) -> Option<Quantity> {
    read_integer(value).and_then(|q| Quantity::new(q).ok())
}

fn read_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Image URLs from `image_url` or `images`, plus the primary image.
///
/// Entries may be plain strings or objects carrying `url`, `path` or `src`.
fn read_images(fields: &Map<String, Value>) -> (Vec<String>, Option<String>) {
    let raw = fields
        .get("image_url")
        .filter(|v| !v.is_null())
        .or_else(|| fields.get("images"));

    let images: Vec<String> = match raw {
        Some(Value::String(url)) if !url.is_empty() => vec![url.clone()],
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(url) => Some(url.clone()),
                Value::Object(obj) => ["url", "path", "src"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(Value::as_str))
                    .map(str::to_owned),
                _ => None,
            })
            .filter(|url| !url.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    let image = fields
        .get("image")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
        .or_else(|| images.first().cloned());

    (images, image)
}

/// Read an RFC 3339 string or an epoch-milliseconds number.
fn read_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ids(items: &[Value]) -> Vec<i64> {
        items.iter().map(|v| v["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_bare_array() {
        let body = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(ids(extract_item_array(&body)), vec![1, 2]);
    }

    #[test]
    fn test_items_field() {
        let body = json!({"id": 5, "items": [{"id": 3}]});
        assert_eq!(ids(extract_item_array(&body)), vec![3]);
    }

    #[test]
    fn test_generated_field_has_priority_over_items() {
        let body = json!({
            "items": [{"id": 1}],
            "_cart_item_of_cart_of_product": [{"id": 2}],
        });
        assert_eq!(ids(extract_item_array(&body)), vec![2]);
    }

    #[test]
    fn test_each_known_field() {
        for field in ITEM_ARRAY_FIELDS {
            let mut fields = Map::new();
            fields.insert((*field).to_string(), json!([{"id": 9}]));
            let body = Value::Object(fields);
            assert_eq!(ids(extract_item_array(&body)), vec![9], "field {field}");
        }
    }

    #[test]
    fn test_unknown_field_falls_back_to_first_array() {
        let body = json!({
            "id": 1,
            "tags": "not-an-array",
            "lines": [{"id": 4}],
            "other": [{"id": 5}],
        });
        assert_eq!(ids(extract_item_array(&body)), vec![4]);
    }

    #[test]
    fn test_no_array_anywhere() {
        assert!(extract_item_array(&json!({"id": 1})).is_empty());
        assert!(extract_item_array(&Value::Null).is_empty());
        assert!(extract_item_array(&json!("text")).is_empty());
    }

    #[test]
    fn test_normalize_cart_item_with_embedded_product() {
        let raw = json!({
            "id": 11,
            "cart_id": 3,
            "product_id": 7,
            "quantity": "2",
            "product": {
                "id": 7,
                "name": " Mug ",
                "price": "12.50",
                "stock_quantity": 4,
                "image_url": [{"url": "https://cdn/mug.png"}, "https://cdn/mug2.png"],
            }
        });

        let item = normalize_cart_item(&raw).unwrap();
        assert_eq!(item.id.as_str(), "11");
        assert_eq!(item.cart_id, Some(CartId::from(3)));
        assert_eq!(item.product_id.as_str(), "7");
        assert_eq!(item.quantity.get(), 2);
        assert_eq!(item.product.name, "Mug");
        assert_eq!(item.product.price, Price::new(Decimal::new(1250, 2)));
        assert_eq!(item.product.stock, Some(4));
        assert_eq!(
            item.product.images,
            vec!["https://cdn/mug.png", "https://cdn/mug2.png"]
        );
        assert_eq!(item.product.image.as_deref(), Some("https://cdn/mug.png"));
        assert_eq!(item.subtotal(), Price::new(Decimal::new(2500, 2)));
    }

    #[test]
    fn test_price_falls_back_through_fields() {
        let raw = json!({
            "id": 1,
            "product_id": 2,
            "quantity": 1,
            "product": {"price": 0, "price_value": null, "priceNumber": 3.5},
        });
        let item = normalize_cart_item(&raw).unwrap();
        assert_eq!(item.product.price, Price::new(Decimal::new(35, 1)));

        let raw = json!({"id": 1, "product_id": 2, "quantity": 1, "price": "8"});
        let item = normalize_cart_item(&raw).unwrap();
        assert_eq!(item.product.price, Price::new(Decimal::from(8)));
    }

    #[test]
    fn test_item_id_defaults_to_product_id() {
        let raw = json!({"quantity": 1, "product": {"id": 42}});
        let item = normalize_cart_item(&raw).unwrap();
        assert_eq!(item.id.as_str(), "42");
        assert_eq!(item.product_id.as_str(), "42");
    }

    #[test]
    fn test_lines_without_product_or_quantity_are_dropped() {
        assert!(normalize_cart_item(&json!({"id": 1, "quantity": 2})).is_none());
        assert!(normalize_cart_item(&json!({"id": 1, "product_id": 2, "quantity": 0})).is_none());
        assert!(normalize_cart_item(&json!({"id": 1, "product_id": 2, "quantity": -3})).is_none());
        assert!(normalize_cart_item(&json!({"id": 1, "product_id": 2, "quantity": "x"})).is_none());
        assert!(normalize_cart_item(&json!("not an object")).is_none());
    }

    #[test]
    fn test_normalize_cart_keeps_requested_id() {
        let body = json!({
            "user_id": 8,
            "items": [
                {"id": 1, "product_id": 5, "quantity": 1},
                {"id": 2, "quantity": 1},
            ]
        });
        let cart = normalize_cart(&CartId::from("abc"), &body);
        assert_eq!(cart.id, Some(CartId::from("abc")));
        assert_eq!(cart.user_id, Some(UserId::from(8)));
        assert_eq!(cart.items.len(), 1);
    }

    #[test]
    fn test_normalize_product() {
        let raw = json!({
            "id": "p-1",
            "name": "Lamp",
            "categoria": "Hogar",
            "brand": "Lux",
            "price": 19990,
            "stock": null,
            "stock_quantity": "3",
            "images": "https://cdn/lamp.png",
            "created_at": 1_700_000_000_000_i64,
        });
        let product = normalize_product(&raw).unwrap();
        assert_eq!(product.id.as_str(), "p-1");
        assert_eq!(product.category, "hogar");
        assert_eq!(product.brand, "Lux");
        assert_eq!(product.price, Price::new(Decimal::from(19990)));
        assert_eq!(product.stock, Some(3));
        assert_eq!(product.images, vec!["https://cdn/lamp.png"]);
        assert_eq!(
            product.created_at.unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_normalize_product_requires_id() {
        assert!(normalize_product(&json!({"name": "No id"})).is_none());
    }

    #[test]
    fn test_read_timestamp_rfc3339() {
        let ts = read_timestamp(&json!("2024-05-01T10:00:00Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
