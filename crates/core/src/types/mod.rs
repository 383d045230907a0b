//! Core types for THEHUB.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod status;

pub use cart::{Cart, CartItem};
pub use id::*;
pub use price::Price;
pub use product::Product;
pub use quantity::{Quantity, QuantityError};
pub use status::AuthStatus;
