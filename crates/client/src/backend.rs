//! REST client for the hosted backend.
//!
//! The backend exposes its database tables over a REST interface
//! (`/rest/v1/<table>`), filtered with `column=eq.value` query parameters.
//! Two tables matter to the cart:
//!
//! - `carts` - one row per user: `user_id`, `items` (JSON), `updated_at`
//! - `products` - catalog rows: `id`, `title`, `price`, `stock`, `thumbnail`
//!
//! Cart writes are upserts on `user_id`, so every write replaces the whole
//! document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartsync_core::{LineItem, ProductId, ProductListing, UserId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::catalog::ProductCatalog;
use crate::config::BackendConfig;
use crate::remote::{CartRecord, RemoteCartStore, RemoteError};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the backend REST API.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let key = config.api_key.expose_secret();
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|e| RemoteError::Parse(format!("Invalid API key format: {e}")))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| RemoteError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Build the URL for a table, filtered on one column.
    fn table_url(
        &self,
        table: &str,
        column: &str,
        value: &str,
        select: &str,
    ) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.join(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut()
            .append_pair(column, &format!("eq.{value}"))
            .append_pair("select", select);
        Ok(url)
    }

    /// GET a filtered table and parse the returned rows.
    async fn get_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, RemoteError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RemoteCartStore for BackendClient {
    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn fetch(&self, user_id: &UserId) -> Result<Option<Vec<LineItem>>, RemoteError> {
        let url = self.table_url("carts", "user_id", user_id.as_str(), "user_id,items,updated_at")?;
        let rows: Vec<CartRecord> = self.get_rows(url).await?;

        let cart = rows.into_iter().next().map(|record| record.line_items());
        debug!(found = cart.is_some(), "Fetched remote cart");
        Ok(cart)
    }

    #[instrument(skip_all, fields(user_id = %user_id, items = items.len()))]
    async fn write(&self, user_id: &UserId, items: &[LineItem]) -> Result<(), RemoteError> {
        let mut url = self.inner.base_url.join("rest/v1/carts")?;
        url.query_pairs_mut().append_pair("on_conflict", "user_id");

        let record = CartRecord::new(user_id.clone(), items)?;
        let response = self
            .inner
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&record)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for BackendClient {
    #[instrument(skip_all, fields(product_id = %product_id))]
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductListing>, RemoteError> {
        let url = self.table_url(
            "products",
            "id",
            product_id.as_str(),
            "id,title,price,stock,thumbnail",
        )?;
        let rows: Vec<ProductListing> = self.get_rows(url).await?;
        Ok(rows.into_iter().next())
    }
}
