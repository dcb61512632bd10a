//! The cart store: single owner of the session's cart state.
//!
//! Every mutation runs as one atomic step: update the items, recompute the
//! totals, persist to local storage, and (for a signed-in user) hand the new
//! snapshot to the remote sync worker. Mutations never wait on the network.
//!
//! Local storage is authoritative for the session. Remote failures are
//! logged and reported as booleans; they never roll local state back.

use std::sync::Arc;

use cartsync_core::{
    CartState, LineItem, ProductId, QuantityUpdate, UserId, VariantKey, decode_items,
};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::session::IdentityProvider;
use crate::storage::LocalCartStorage;
use crate::sync::RemoteSync;

/// What login reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The remote cart replaced the local one.
    AdoptedRemote { items: usize },
    /// No remote cart existed, so the local cart was uploaded.
    UploadedLocal { items: usize, success: bool },
    /// Neither side had items.
    NothingToSync,
    /// The remote cart could not be fetched; the local cart was kept.
    RemoteUnavailable,
    /// Remote sync is not configured.
    Disabled,
}

/// Result of [`CartStore::checkout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// The cart as it was when checkout began.
    pub cart: CartState,
    /// Whether the remote cart was cleared (always `true` for guests).
    pub remote_cleared: bool,
}

/// Owns the cart state for the lifetime of a session.
///
/// Construct once at startup and share by `Arc`.
pub struct CartStore {
    state: watch::Sender<CartState>,
    storage: Box<dyn LocalCartStorage>,
    identity: Arc<dyn IdentityProvider>,
    sync: Option<RemoteSync>,
}

impl CartStore {
    /// Create the store, restoring any cart saved in `storage`.
    ///
    /// Pass `None` for `sync` to run guest-only.
    #[must_use]
    pub fn new(
        storage: Box<dyn LocalCartStorage>,
        identity: Arc<dyn IdentityProvider>,
        sync: Option<RemoteSync>,
    ) -> Self {
        let initial = match storage.load() {
            Ok(Some(items)) => CartState::from_items(items),
            Ok(None) => CartState::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load saved cart, starting empty");
                CartState::new()
            }
        };
        debug!(items = initial.len(), "Cart restored from local storage");

        Self {
            state: watch::Sender::new(initial),
            storage,
            identity,
            sync,
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// A copy of the current items.
    #[must_use]
    pub fn items(&self) -> Vec<LineItem> {
        self.state.borrow().items().to_vec()
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.state.borrow().total_items()
    }

    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.state.borrow().total_price()
    }

    /// Receive every new state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Replace the whole cart.
    pub fn set_cart(&self, items: Vec<LineItem>) -> bool {
        self.commit("set_cart", true, |cart| {
            let next = CartState::from_items(items);
            replace_if_different(cart, next)
        })
    }

    /// Replace the whole cart from untyped JSON. Non-array input empties the
    /// cart.
    pub fn set_cart_json(&self, value: serde_json::Value) -> bool {
        self.set_cart(decode_items(value))
    }

    /// Add an item, merging it into an existing line for the same variant.
    pub fn add_item(&self, item: LineItem) -> bool {
        let product_id = item.product_id.clone();
        let added = self.commit("add_item", true, |cart| cart.add_item(item));
        if !added {
            debug!(product_id = %product_id, "Ignored add with zero quantity");
        }
        added
    }

    /// Remove a product's line. With `variant` set to `None`, removes every
    /// variant of the product.
    pub fn remove_item(&self, product_id: &ProductId, variant: Option<&VariantKey>) -> bool {
        self.commit("remove_item", true, |cart| {
            cart.remove_item(product_id, variant)
        })
    }

    /// Set a line's quantity; below one removes the line.
    pub fn update_quantity(
        &self,
        product_id: &ProductId,
        variant: &VariantKey,
        quantity: i64,
    ) -> QuantityUpdate {
        let mut outcome = QuantityUpdate::Missing;
        self.commit("update_quantity", true, |cart| {
            outcome = cart.update_quantity(product_id, variant, quantity);
            outcome.changed()
        });

        if outcome == QuantityUpdate::Missing {
            warn!(
                product_id = %product_id,
                variant = %variant,
                "Quantity update for a line that is not in the cart"
            );
        }
        outcome
    }

    /// Empty the cart.
    ///
    /// Any pending debounced write is canceled first, then (for a signed-in
    /// user) the empty cart is written immediately so a stale snapshot can
    /// never restore the cleared items. Returns whether the remote write
    /// succeeded; `true` when there was nothing to write.
    pub async fn clear_cart(&self) -> bool {
        if let Some(sync) = &self.sync {
            sync.cancel_pending();
        }
        self.commit("clear_cart", false, CartState::clear);

        match (&self.sync, self.identity.current_user()) {
            (Some(sync), Some(user_id)) => {
                let ok = sync.write_now(user_id, Vec::new()).await;
                if !ok {
                    warn!("Cart cleared locally but the remote clear failed");
                }
                ok
            }
            _ => true,
        }
    }

    /// Take the final cart for order placement and clear it.
    pub async fn checkout(&self) -> Checkout {
        let cart = self.snapshot();
        let remote_cleared = self.clear_cart().await;
        info!(
            items = cart.len(),
            total_items = cart.total_items(),
            "Cart checked out"
        );
        Checkout {
            cart,
            remote_cleared,
        }
    }

    // -------------------------------------------------------------------------
    // Remote
    // -------------------------------------------------------------------------

    /// Reconcile with the remote cart after `user_id` signs in.
    ///
    /// A non-empty remote cart replaces the local one outright. Otherwise a
    /// non-empty local cart is uploaded as-is. If the fetch fails the local
    /// cart is kept and nothing is uploaded.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn sync_and_merge_cart(&self, user_id: &UserId) -> ReconcileOutcome {
        let Some(sync) = &self.sync else {
            return ReconcileOutcome::Disabled;
        };

        match sync.fetch(user_id).await {
            Ok(remote) => {
                // Lines that normalize away do not count as a saved cart.
                match remote.map(CartState::from_items).filter(|cart| !cart.is_empty()) {
                    Some(next) => self.adopt_remote(sync, next),
                    None => self.upload_local(sync, user_id).await,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch remote cart, keeping local cart");
                ReconcileOutcome::RemoteUnavailable
            }
        }
    }

    /// Replace the local cart with the remote one. Any snapshot scheduled
    /// while the fetch was in flight is stale and must not reach the remote.
    fn adopt_remote(&self, sync: &RemoteSync, next: CartState) -> ReconcileOutcome {
        sync.cancel_pending();
        let items = next.len();
        self.commit("adopt_remote", false, |cart| replace_if_different(cart, next));
        info!(items, "Adopted remote cart");
        ReconcileOutcome::AdoptedRemote { items }
    }

    async fn upload_local(&self, sync: &RemoteSync, user_id: &UserId) -> ReconcileOutcome {
        let local = self.items();
        if local.is_empty() {
            debug!("No cart on either side");
            return ReconcileOutcome::NothingToSync;
        }

        let items = local.len();
        let success = sync.write_now(user_id.clone(), local).await;
        info!(items, success, "Uploaded guest cart");
        ReconcileOutcome::UploadedLocal { items, success }
    }

    /// Write any pending snapshot now. Returns `true` if nothing was pending
    /// or the write succeeded.
    pub async fn flush(&self) -> bool {
        match &self.sync {
            Some(sync) => sync.flush().await,
            None => true,
        }
    }

    /// Reconcile whenever `identity` changes to a signed-in user.
    ///
    /// The identity held when the task starts is taken as already
    /// reconciled. Signing out keeps the local cart as the guest cart.
    pub fn watch_identity(
        self: &Arc<Self>,
        mut identity: watch::Receiver<Option<UserId>>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut current = identity.borrow_and_update().clone();
            while identity.changed().await.is_ok() {
                let next = identity.borrow_and_update().clone();
                if next != current {
                    match &next {
                        Some(user_id) => {
                            store.sync_and_merge_cart(user_id).await;
                        }
                        None => debug!("Signed out, keeping local cart as guest cart"),
                    }
                }
                current = next;
            }
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Apply `mutate` atomically. When it reports a change, persist the new
    /// state and, if `enqueue` is set and a user is signed in, schedule a
    /// remote write. Returns whether the cart changed.
    fn commit(
        &self,
        operation: &'static str,
        enqueue: bool,
        mutate: impl FnOnce(&mut CartState) -> bool,
    ) -> bool {
        let user_id = self.identity.current_user();

        self.state.send_if_modified(|cart| {
            if !mutate(cart) {
                return false;
            }

            if let Err(e) = self.storage.save(cart.items()) {
                warn!(operation, error = %e, "Failed to persist cart to local storage");
            }

            if enqueue
                && let (Some(sync), Some(user_id)) = (&self.sync, user_id)
            {
                sync.schedule(user_id, cart.items().to_vec());
            }

            debug!(
                operation,
                items = cart.len(),
                total_items = cart.total_items(),
                "Cart updated"
            );
            true
        })
    }
}

fn replace_if_different(cart: &mut CartState, next: CartState) -> bool {
    if *cart == next {
        return false;
    }
    *cart = next;
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::remote::MemoryRemoteStore;
    use crate::session::AuthSession;
    use crate::storage::MemoryStorage;
    use crate::sync::DEFAULT_QUIET_PERIOD;

    fn tee(quantity: u32) -> LineItem {
        LineItem::new("p1", "M/Red".parse().unwrap(), quantity, Decimal::from(10))
    }

    fn guest_store() -> CartStore {
        CartStore::new(
            Box::new(MemoryStorage::new()),
            Arc::new(AuthSession::new()),
            None,
        )
    }

    #[test]
    fn test_restores_saved_cart() {
        let storage = MemoryStorage::new();
        storage.save(&[tee(2), tee(1)]).unwrap();

        let store = CartStore::new(Box::new(storage), Arc::new(AuthSession::new()), None);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.total_items(), 3);
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let store = CartStore::new(
            Box::new(MemoryStorage::with_raw("{oops")),
            Arc::new(AuthSession::new()),
            None,
        );
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_guest_mutations_update_totals() {
        let store = guest_store();
        assert!(store.add_item(tee(2)));
        assert_eq!(store.total_items(), 2);
        assert_eq!(store.total_price(), Decimal::from(20));

        let outcome = store.update_quantity(&"p1".into(), &"M/Red".parse().unwrap(), 0);
        assert_eq!(outcome, QuantityUpdate::Removed);
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_missing_update_is_noop() {
        let store = guest_store();
        store.add_item(tee(2));
        let before = store.snapshot();

        let outcome = store.update_quantity(&"p9".into(), &VariantKey::default(), 4);
        assert_eq!(outcome, QuantityUpdate::Missing);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_set_cart_json_non_array_empties() {
        let store = guest_store();
        store.add_item(tee(2));

        assert!(store.set_cart_json(serde_json::json!({"not": "a list"})));
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_subscribers_see_mutations() {
        let store = guest_store();
        let rx = store.subscribe();

        store.add_item(tee(3));
        assert_eq!(rx.borrow().total_items(), 3);
    }

    #[tokio::test]
    async fn test_guest_clear_needs_no_remote() {
        let store = guest_store();
        store.add_item(tee(1));
        assert!(store.clear_cart().await);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_without_sync_is_disabled() {
        let store = guest_store();
        assert_eq!(
            store.sync_and_merge_cart(&UserId::new("u1")).await,
            ReconcileOutcome::Disabled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_in_mutation_schedules_write() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let session = AuthSession::authenticated(UserId::new("u1"));
        let store = CartStore::new(
            Box::new(MemoryStorage::new()),
            Arc::new(session),
            Some(RemoteSync::spawn(remote.clone(), DEFAULT_QUIET_PERIOD)),
        );

        store.add_item(tee(2));
        assert_eq!(remote.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(remote.cart(&UserId::new("u1")), Some(vec![tee(2)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_mutation_schedules_nothing() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let store = CartStore::new(
            Box::new(MemoryStorage::new()),
            Arc::new(AuthSession::authenticated(UserId::new("u1"))),
            Some(RemoteSync::spawn(remote.clone(), DEFAULT_QUIET_PERIOD)),
        );

        assert!(!store.remove_item(&"absent".into(), None));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.write_count(), 0);
    }
}
