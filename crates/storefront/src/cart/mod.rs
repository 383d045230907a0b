//! Cart synchronization.
//!
//! [`CartStore`] keeps the local view of a cart consistent with the remote
//! backend. Writes are never applied optimistically: every mutation goes to
//! the backend and is followed by a full re-fetch of the cart.

pub mod single_flight;
pub mod storage;
mod store;

use thehub_core::QuantityError;
use thiserror::Error;

use crate::backend::BackendError;

pub use storage::{CartIdStore, FileCartIdStore, MemoryCartIdStore, StorageError};
pub use store::{CartState, CartStore, OrderDraft};

/// Errors returned by cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity was zero, negative or out of range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Product id was blank.
    #[error("Product id is required")]
    MissingProductId,

    /// Cart line id was blank.
    #[error("Cart item id is required")]
    MissingItemId,

    /// The operation needs a cart but none is known.
    #[error("No active cart")]
    NoActiveCart,

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Some deletes of a clear failed; the cart reflects what was removed.
    #[error("Cleared cart partially: {failed} of {attempted} deletes failed ({source})")]
    PartialClear {
        /// Deletes that failed.
        failed: usize,
        /// Deletes issued.
        attempted: usize,
        /// First failure.
        source: BackendError,
    },
}

impl CartError {
    /// Whether the backend no longer recognizes the cart.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_not_found())
    }

    /// Whether the backend rejected the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_unauthorized())
    }

    /// Whether the error was raised before any network call.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity(_) | Self::MissingProductId | Self::MissingItemId
        )
    }
}
