//! Newtype IDs for type-safe entity references.
//!
//! The remote backend hands out identifiers as JSON numbers on some endpoints
//! and as strings on others (the persisted cart id is always a string). IDs
//! are therefore kept as opaque strings that accept either form on input and
//! serialize back as a number whenever the text is a canonical integer.

use serde::{Deserialize, Deserializer, Serializer};

/// Macro to define a type-safe, string-backed ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` accepting JSON strings and integers
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `is_blank()`, `into_inner()`
/// - `From<&str>`, `From<String>`, `From<i64>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use thehub_core::define_id;
/// define_id!(WidgetId);
///
/// let id = WidgetId::from(42);
/// assert_eq!(id.as_str(), "42");
/// assert_eq!(serde_json::to_string(&id).unwrap(), "42");
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(::std::string::String);

        impl $name {
            /// Create a new ID, trimming surrounding whitespace.
            #[must_use]
            pub fn new(id: impl ::core::convert::Into<::std::string::String>) -> Self {
                let id: ::std::string::String = id.into();
                Self(id.trim().to_owned())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID is empty and cannot reference anything.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.is_empty()
            }

            /// Consume the ID and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> ::std::string::String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::convert::From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl ::core::convert::From<::std::string::String> for $name {
            fn from(id: ::std::string::String) -> Self {
                Self::new(id)
            }
        }

        impl ::core::convert::From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl ::core::convert::AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::core::result::Result<S::Ok, S::Error> {
                $crate::types::id::serialize_opaque(&self.0, serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::core::result::Result<Self, D::Error> {
                $crate::types::id::deserialize_opaque(deserializer).map(Self::new)
            }
        }
    };
}

// Define standard entity IDs
define_id!(
    /// Remote cart identifier.
    CartId
);
define_id!(
    /// Remote cart line identifier.
    CartItemId
);
define_id!(
    /// Catalog product identifier.
    ProductId
);
define_id!(
    /// Owning user of a cart or order.
    UserId
);
define_id!(
    /// Order created from a cart at checkout.
    OrderId
);
define_id!(
    /// Shipping address selected at checkout.
    AddressId
);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Serialize an opaque ID, emitting a JSON number when the text is a
/// canonical integer so numeric backends receive the type they issued.
#[doc(hidden)]
pub fn serialize_opaque<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
    match id.parse::<i64>() {
        Ok(n) if n.to_string() == id => serializer.serialize_i64(n),
        _ => serializer.serialize_str(id),
    }
}

/// Deserialize an opaque ID from a JSON string or integer.
#[doc(hidden)]
pub fn deserialize_opaque<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_number() {
        let id: CartId = serde_json::from_str("17").unwrap();
        assert_eq!(id.as_str(), "17");
    }

    #[test]
    fn test_deserialize_from_string() {
        let id: CartId = serde_json::from_str("\"  abc-1 \"").unwrap();
        assert_eq!(id.as_str(), "abc-1");
    }

    #[test]
    fn test_numeric_text_serializes_as_number() {
        let id = ProductId::from("7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn test_non_canonical_number_stays_text() {
        let id = ProductId::from("007");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"007\"");

        let id = ProductId::from("sku-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sku-7\"");
    }

    #[test]
    fn test_blank() {
        assert!(CartItemId::from("   ").is_blank());
        assert!(!CartItemId::from(3).is_blank());
    }

    #[test]
    fn test_display() {
        let id = OrderId::from(99);
        assert_eq!(format!("{id}"), "99");
    }
}
