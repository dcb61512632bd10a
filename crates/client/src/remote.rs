//! Remote cart persistence.
//!
//! The backend stores one cart document per user: the full item list plus
//! an update timestamp. There are no partial updates; every write replaces
//! the whole document.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cartsync_core::{LineItem, UserId, decode_items};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur talking to the backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Backend is not reachable.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Whole-document cart persistence keyed by user.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Fetch the stored cart. `Ok(None)` means the user has no cart document.
    async fn fetch(&self, user_id: &UserId) -> Result<Option<Vec<LineItem>>, RemoteError>;

    /// Replace the stored cart.
    async fn write(&self, user_id: &UserId, items: &[LineItem]) -> Result<(), RemoteError>;
}

/// The stored cart document.
///
/// `items` is kept as raw JSON so documents written by other clients decode
/// leniently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub items: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl CartRecord {
    /// Build a record for `items`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Parse` if the items cannot be encoded.
    pub fn new(user_id: UserId, items: &[LineItem]) -> Result<Self, RemoteError> {
        Ok(Self {
            user_id,
            items: serde_json::to_value(items).map_err(|e| RemoteError::Parse(e.to_string()))?,
            updated_at: Utc::now(),
        })
    }

    /// Decode the item payload.
    #[must_use]
    pub fn line_items(&self) -> Vec<LineItem> {
        decode_items(self.items.clone())
    }
}

// =============================================================================
// MemoryRemoteStore
// =============================================================================

/// In-process remote store.
///
/// Keeps every write in a log so callers can observe how many writes
/// reached the backend and what they contained. Latency and failures can be
/// injected to model a slow or unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    carts: Mutex<HashMap<UserId, CartRecord>>,
    writes: Mutex<Vec<(UserId, Vec<LineItem>)>>,
    latency: Duration,
    fail_writes: AtomicBool,
    fail_fetches: AtomicBool,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch and write by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Store a cart document directly, bypassing the write log.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Parse` if the items cannot be encoded.
    pub fn seed(&self, user_id: &UserId, items: &[LineItem]) -> Result<(), RemoteError> {
        let record = CartRecord::new(user_id.clone(), items)?;
        self.lock_carts().insert(user_id.clone(), record);
        Ok(())
    }

    /// Store a raw document, for payloads no well-behaved client would write.
    pub fn seed_raw(&self, user_id: &UserId, items: serde_json::Value) {
        let record = CartRecord {
            user_id: user_id.clone(),
            items,
            updated_at: Utc::now(),
        };
        self.lock_carts().insert(user_id.clone(), record);
    }

    /// The stored cart for a user.
    #[must_use]
    pub fn cart(&self, user_id: &UserId) -> Option<Vec<LineItem>> {
        self.lock_carts().get(user_id).map(CartRecord::line_items)
    }

    /// Every successful write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(UserId, Vec<LineItem>)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent fetches fail.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    fn lock_carts(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, CartRecord>> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RemoteCartStore for MemoryRemoteStore {
    async fn fetch(&self, user_id: &UserId) -> Result<Option<Vec<LineItem>>, RemoteError> {
        self.simulate_latency().await;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("fetch failure injected".to_string()));
        }
        Ok(self.cart(user_id))
    }

    async fn write(&self, user_id: &UserId, items: &[LineItem]) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("write failure injected".to_string()));
        }

        let record = CartRecord::new(user_id.clone(), items)?;
        self.lock_carts().insert(user_id.clone(), record);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((user_id.clone(), items.to_vec()));
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

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Api {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - maintenance");
    }

    #[test]
    fn test_record_decodes_items_leniently() {
        let record: CartRecord = serde_json::from_value(json!({
            "user_id": "u1",
            "items": [{"productId": "p1", "quantity": "2", "unitPrice": 3}, "junk"],
            "updated_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap();

        let items = record.line_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_memory_store_write_then_fetch() {
        let store = MemoryRemoteStore::new();
        let user = UserId::new("u1");
        assert!(store.fetch(&user).await.unwrap().is_none());

        let items = vec![LineItem::new("p1", VariantKey::default(), 1, Decimal::from(4))];
        store.write(&user, &items).await.unwrap();

        assert_eq!(store.fetch(&user).await.unwrap(), Some(items));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_injected_failures() {
        let store = MemoryRemoteStore::new();
        let user = UserId::new("u1");

        store.set_fail_writes(true);
        assert!(store.write(&user, &[]).await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_fail_fetches(true);
        assert!(matches!(
            store.fetch(&user).await,
            Err(RemoteError::Unavailable(_))
        ));
    }
}
