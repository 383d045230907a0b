//! Status enums shared across components.

use serde::{Deserialize, Serialize};

/// Authentication state as reported by the session layer.
///
/// Only transitions between [`AuthStatus::Authenticated`] and
/// [`AuthStatus::Anonymous`] affect the cart; the other states are
/// intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Session state has not been determined yet.
    #[default]
    Unknown,
    /// A session check is in progress.
    Checking,
    /// A user is logged in.
    Authenticated,
    /// No user is logged in.
    Anonymous,
}

impl AuthStatus {
    /// Whether this is a settled state that the cart reacts to.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Authenticated | Self::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_states() {
        assert!(AuthStatus::Authenticated.is_settled());
        assert!(AuthStatus::Anonymous.is_settled());
        assert!(!AuthStatus::Unknown.is_settled());
        assert!(!AuthStatus::Checking.is_settled());
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(AuthStatus::default(), AuthStatus::Unknown);
    }
}
