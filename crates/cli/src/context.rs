//! Wiring shared by every command.

use std::sync::Arc;

use cartsync_client::{
    AuthSession, BackendClient, CachedCatalog, CartConfig, CartStore, FileStorage, RemoteSync,
};
use cartsync_core::{CurrencyCode, UserId};
use tracing::{debug, warn};

use crate::error::CliError;

/// The cart store plus what commands need around it.
pub struct Context {
    pub store: Arc<CartStore>,
    pub session: AuthSession,
    pub catalog: Option<CachedCatalog<BackendClient>>,
    pub currency: CurrencyCode,
}

impl Context {
    /// Open the local cart and, when a backend is configured, connect
    /// remote sync.
    ///
    /// The session starts signed in as `user`, if given.
    ///
    /// # Errors
    ///
    /// Returns error if the backend client cannot be built.
    pub fn open(config: &CartConfig, user: Option<UserId>) -> Result<Self, CliError> {
        let storage = FileStorage::new(&config.storage_dir, &config.storage_key);
        debug!(path = %storage.path().display(), "Using local cart storage");

        let session = user.map_or_else(AuthSession::new, AuthSession::authenticated);

        let (sync, catalog) = match &config.backend {
            Some(backend) => {
                let client = BackendClient::new(backend)?;
                let sync = RemoteSync::spawn(Arc::new(client.clone()), config.debounce);
                let catalog = CachedCatalog::new(client, config.catalog_cache_ttl);
                (Some(sync), Some(catalog))
            }
            None => {
                debug!("No backend configured, running guest-only");
                (None, None)
            }
        };

        let store = CartStore::new(Box::new(storage), Arc::new(session.clone()), sync);

        Ok(Self {
            store: Arc::new(store),
            session,
            catalog,
            currency: config.currency,
        })
    }

    /// Write out any pending remote snapshot before the process exits.
    pub async fn finish(self) {
        if !self.store.flush().await {
            warn!("Pending cart changes could not be written to the backend");
        }
    }
}
