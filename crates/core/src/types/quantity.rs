//! Cart line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative quantities are not allowed on a cart line.
    #[error("quantity must be a positive integer (got {0})")]
    NotPositive(i64),
    /// The quantity does not fit the supported range.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// Rejected input.
        got: i64,
    },
}

/// A positive number of units on a cart line.
///
/// A line whose quantity would reach zero is removed instead, so a zero
/// quantity is unrepresentable.
///
/// ```
/// use thehub_core::Quantity;
///
/// assert_eq!(Quantity::new(2).unwrap().get(), 2);
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is zero, negative, or above `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(QuantityError::TooLarge {
                max: u32::MAX,
                got: value,
            })
    }

    /// Get the number of units.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// One more unit, saturating at the maximum.
    #[must_use]
    pub const fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// One unit fewer, or `None` when the line should be removed.
    #[must_use]
    pub fn decremented(self) -> Option<Self> {
        NonZeroU32::new(self.0.get() - 1).map(Self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive() {
        for raw in [0, -1, -50, i64::MIN] {
            assert_eq!(Quantity::new(raw), Err(QuantityError::NotPositive(raw)));
        }
    }

    #[test]
    fn test_rejects_too_large() {
        let raw = i64::from(u32::MAX) + 1;
        assert!(matches!(
            Quantity::new(raw),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_increment_and_decrement() {
        let one = Quantity::ONE;
        assert_eq!(one.incremented().get(), 2);
        assert_eq!(one.decremented(), None);
        assert_eq!(Quantity::new(3).unwrap().decremented().unwrap().get(), 2);
    }

    #[test]
    fn test_serde() {
        let qty: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(qty.get(), 4);
        assert_eq!(serde_json::to_string(&qty).unwrap(), "4");
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
