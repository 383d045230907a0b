//! THEHUB Core - Shared domain types.
//!
//! This crate provides the types shared by every THEHUB component:
//! - `storefront` - Cart synchronization, catalog reads and the REST gateway
//! - `cli` - Terminal front end driving the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async
//! runtime. Everything here can be constructed and checked synchronously.
//!
//! # Modules
//!
//! - [`types`] - Opaque IDs, prices, quantities, carts, products and auth status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
