//! Integration tests for cartsync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! Tests run against an in-process remote store and a temporary directory
//! for local storage, so they need no running services. Timing-sensitive
//! tests use Tokio's paused clock.
//!
//! # Test Categories
//!
//! - `cart_store` - Local cart operations and persistence
//! - `remote_sync` - Debounced writes and the clear race
//! - `login_reconciliation` - Merging local and remote carts on sign-in

use std::sync::Arc;
use std::time::Duration;

use cartsync_client::{
    AuthSession, CartStore, FileStorage, LocalCartStorage, MemoryRemoteStore, RemoteSync,
};
use cartsync_core::{LineItem, UserId, VariantKey};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Quiet period used by the harness, matching the production default.
pub const QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Storage key used by the harness.
pub const STORAGE_KEY: &str = "cart-storage";

/// A cart store wired to file storage in a temp dir and an in-memory remote.
pub struct TestContext {
    pub store: Arc<CartStore>,
    pub session: AuthSession,
    pub remote: Arc<MemoryRemoteStore>,
    pub dir: TempDir,
}

impl TestContext {
    /// A guest session with remote sync available.
    ///
    /// # Panics
    ///
    /// Panics if the temp dir cannot be created.
    #[must_use]
    pub fn guest() -> Self {
        Self::build(AuthSession::new(), Arc::new(MemoryRemoteStore::new()))
    }

    /// A session already signed in as `user_id`.
    ///
    /// # Panics
    ///
    /// Panics if the temp dir cannot be created.
    #[must_use]
    pub fn signed_in(user_id: &str) -> Self {
        Self::build(
            AuthSession::authenticated(UserId::new(user_id)),
            Arc::new(MemoryRemoteStore::new()),
        )
    }

    /// A session with a caller-supplied remote.
    ///
    /// # Panics
    ///
    /// Panics if the temp dir cannot be created.
    #[must_use]
    pub fn build(session: AuthSession, remote: Arc<MemoryRemoteStore>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let store = open_store(&dir, &session, Some(&remote));
        Self {
            store: Arc::new(store),
            session,
            remote,
            dir,
        }
    }

    /// A second store over the same local storage, as after a restart.
    #[must_use]
    pub fn reopen(&self) -> CartStore {
        open_store(&self.dir, &self.session, None)
    }

    /// The local record as written to disk.
    ///
    /// # Panics
    ///
    /// Panics if the record cannot be read.
    #[must_use]
    pub fn saved_items(&self) -> Option<Vec<LineItem>> {
        FileStorage::new(self.dir.path(), STORAGE_KEY)
            .load()
            .expect("read local cart")
    }
}

fn open_store(
    dir: &TempDir,
    session: &AuthSession,
    remote: Option<&Arc<MemoryRemoteStore>>,
) -> CartStore {
    let sync = remote.map(|remote| RemoteSync::spawn(remote.clone(), QUIET_PERIOD));
    CartStore::new(
        Box::new(FileStorage::new(dir.path(), STORAGE_KEY)),
        Arc::new(session.clone()),
        sync,
    )
}

/// A line item priced in whole currency units; `variant` is `size/color`.
#[must_use]
pub fn item(product_id: &str, variant: &str, quantity: u32, price: i64) -> LineItem {
    let variant: VariantKey = variant.parse().unwrap_or_default();
    LineItem::new(product_id, variant, quantity, Decimal::from(price))
}

/// Let spawned tasks run without advancing the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
