//! Product catalog lookup.
//!
//! The cart consults the catalog once, when an item is first added, to
//! capture its price and check stock. Lines already in the cart are never
//! re-priced.

use std::time::Duration;

use async_trait::async_trait;
use cartsync_core::{ProductId, ProductListing};
use moka::future::Cache;
use tracing::debug;

use crate::remote::RemoteError;

/// Default time a catalog listing is cached.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Looks up the current price and stock of a product.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch a listing. `Ok(None)` means the product does not exist.
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductListing>, RemoteError>;
}

/// Caches listings from another catalog in memory.
///
/// Only found listings are cached; misses and errors always go to the
/// underlying catalog.
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<ProductId, ProductListing>,
}

impl<C: ProductCatalog> CachedCatalog<C> {
    /// Wrap `inner`, keeping listings for `ttl`.
    #[must_use]
    pub fn new(inner: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }
}

#[async_trait]
impl<C: ProductCatalog> ProductCatalog for CachedCatalog<C> {
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductListing>, RemoteError> {
        if let Some(listing) = self.cache.get(product_id).await {
            debug!(product_id = %product_id, "Cache hit for product listing");
            return Ok(Some(listing));
        }

        let listing = self.inner.lookup(product_id).await?;
        if let Some(listing) = &listing {
            self.cache
                .insert(product_id.clone(), listing.clone())
                .await;
        }
        Ok(listing)
    }
}
