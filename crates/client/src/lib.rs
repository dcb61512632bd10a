//! Cartsync client library.
//!
//! Owns a shopper's cart for the lifetime of a session: local persistence
//! across restarts, debounced remote sync for signed-in users, and login
//! reconciliation between the two.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;

pub use backend::BackendClient;
pub use catalog::{CachedCatalog, ProductCatalog};
pub use config::{BackendConfig, CartConfig, ConfigError};
pub use remote::{MemoryRemoteStore, RemoteCartStore, RemoteError};
pub use session::{AuthSession, IdentityProvider};
pub use storage::{FileStorage, LocalCartStorage, MemoryStorage, StorageError};
pub use store::{CartStore, Checkout, ReconcileOutcome};
pub use sync::RemoteSync;
