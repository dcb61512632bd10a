//! Local device storage for the cart.
//!
//! The cart store mirrors its state into a named local record after every
//! mutation so the cart survives restarts. The record is JSON of the form
//! `{"items": [LineItem...]}`; quantities and prices are JSON numbers.
//!
//! Loading is lenient: a bare array is accepted as the item list, unknown
//! shapes load as an empty cart, and individual bad entries are dropped
//! (see [`cartsync_core::decode_items`]).

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cartsync_core::{LineItem, decode_items};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur reading or writing the local record.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The record could not be encoded or is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Synchronous key-value storage holding the serialized cart.
pub trait LocalCartStorage: Send + Sync {
    /// Load the stored items. `Ok(None)` means nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record exists but cannot be read.
    fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError>;

    /// Replace the stored record with `items`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    fn save(&self, items: &[LineItem]) -> Result<(), StorageError>;
}

#[derive(Serialize)]
struct StoredCart<'a> {
    items: &'a [LineItem],
}

fn encode_record(items: &[LineItem]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(&StoredCart { items })?)
}

fn decode_record(raw: &str) -> Result<Vec<LineItem>, StorageError> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(match value {
        Value::Object(mut record) => decode_items(record.remove("items").unwrap_or(Value::Null)),
        array @ Value::Array(_) => decode_items(array),
        _ => Vec::new(),
    })
}

// =============================================================================
// FileStorage
// =============================================================================

/// Stores the cart record as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling file that is then renamed over the
/// record, so a crash mid-write never leaves a truncated cart.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create storage for the record named `key` inside `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCartStorage for FileStorage {
    fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_record(&raw).map(Some)
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StorageError> {
        let encoded = encode_record(items)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(encoded.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-process storage holding the serialized record as a string.
///
/// Useful for ephemeral sessions and tests; the record still goes through
/// the same encode/decode path as [`FileStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a raw record.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw stored record, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalCartStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError> {
        self.raw().as_deref().map(decode_record).transpose()
    }

    fn save(&self, items: &[LineItem]) -> Result<(), StorageError> {
        let encoded = encode_record(items)?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartsync_core::VariantKey;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("p1", "M/Red".parse().unwrap(), 2, Decimal::new(1999, 2))
                .with_title("Tee")
                .with_thumbnail("https://cdn.example.com/p1.jpg"),
            LineItem::new("p2", VariantKey::default(), 1, Decimal::from(5)),
        ]
    }

    #[test]
    fn test_file_storage_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "cart-storage");
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"), "cart-storage");

        storage.save(&items()).unwrap();
        assert_eq!(storage.load().unwrap().unwrap(), items());
        assert!(storage.path().ends_with("nested/cart-storage.json"));
    }

    #[test]
    fn test_record_keeps_numbers_numeric() {
        let storage = MemoryStorage::new();
        storage.save(&items()).unwrap();

        let record: Value = serde_json::from_str(&storage.raw().unwrap()).unwrap();
        let first = &record["items"][0];
        assert!(first["quantity"].is_u64());
        assert!(first["unitPrice"].is_f64());
        assert_eq!(record["items"][1]["unitPrice"], json!(5));
    }

    #[test]
    fn test_load_accepts_bare_array() {
        let storage = MemoryStorage::with_raw(r#"[{"productId":"p1","quantity":"3","unitPrice":"2.5"}]"#);
        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].quantity, 3);
        assert_eq!(loaded[0].unit_price, Decimal::new(25, 1));
    }

    #[test]
    fn test_load_unknown_shape_is_empty() {
        let storage = MemoryStorage::with_raw(r#"{"items": "nope"}"#);
        assert_eq!(storage.load().unwrap(), Some(Vec::new()));

        let storage = MemoryStorage::with_raw("42");
        assert_eq!(storage.load().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_load_corrupt_record_errors() {
        let storage = MemoryStorage::with_raw("{not json");
        assert!(matches!(storage.load(), Err(StorageError::Json(_))));
    }
}
