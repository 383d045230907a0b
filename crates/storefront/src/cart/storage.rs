//! Persistence of the current cart id.
//!
//! The store never reads ambient global state; it is handed a [`CartIdStore`]
//! at construction. [`MemoryCartIdStore`] serves tests and short-lived
//! processes, [`FileCartIdStore`] keeps the id across CLI invocations.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thehub_core::CartId;
use thiserror::Error;

/// Errors raised by a cart id store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record is not valid JSON.
    #[error("Storage parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Get/set/clear capability for the single persisted cart id.
///
/// Saving overwrites; at most one id is held at a time.
pub trait CartIdStore: Send + Sync {
    /// Load the persisted id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<CartId>, StorageError>;

    /// Persist `cart_id`, replacing any previous id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, cart_id: &CartId) -> Result<(), StorageError>;

    /// Forget the persisted id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

// =============================================================================
// MemoryCartIdStore
// =============================================================================

/// In-process cart id store.
#[derive(Debug, Default)]
pub struct MemoryCartIdStore {
    cart_id: Mutex<Option<CartId>>,
}

impl MemoryCartIdStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `cart_id`.
    #[must_use]
    pub fn with_cart_id(cart_id: CartId) -> Self {
        Self {
            cart_id: Mutex::new(Some(cart_id)),
        }
    }
}

impl CartIdStore for MemoryCartIdStore {
    fn load(&self) -> Result<Option<CartId>, StorageError> {
        Ok(self
            .cart_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, cart_id: &CartId) -> Result<(), StorageError> {
        *self.cart_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(cart_id.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.cart_id.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// =============================================================================
// FileCartIdStore
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCartId {
    cart_id: CartId,
    saved_at: DateTime<Utc>,
}

/// Cart id store backed by a small JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileCartIdStore {
    path: PathBuf,
}

impl FileCartIdStore {
    /// Store the id at `path`. Parent directories are created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartIdStore for FileCartIdStore {
    fn load(&self) -> Result<Option<CartId>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: PersistedCartId = serde_json::from_str(&raw)?;
        Ok(Some(record.cart_id).filter(|id| !id.is_blank()))
    }

    fn save(&self, cart_id: &CartId) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let record = PersistedCartId {
            cart_id: cart_id.clone(),
            saved_at: Utc::now(),
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
