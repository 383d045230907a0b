//! THEHUB storefront client library.
//!
//! Keeps a shopper's cart synchronized with the remote backend and exposes
//! read access to the product catalog.
//!
//! - [`cart::CartStore`] - the cart state container and its operations
//! - [`backend::RestBackend`] - the REST gateway used by the store and catalog
//! - [`catalog::CatalogClient`] - cached product listing and lookup
//! - [`config::BackendConfig`] - environment-driven configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod catalog;
pub mod config;
