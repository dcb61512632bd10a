//! CLI error type.

use cartsync_client::{ConfigError, RemoteError};
use thiserror::Error;

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Product not found: {0}")]
    UnknownProduct(String),

    #[error("Product is out of stock: {0}")]
    OutOfStock(String),

    #[error("No price given for {0} and no backend is configured to look it up")]
    MissingPrice(String),

    #[error("{0} requires a signed-in user (pass --user)")]
    SignInRequired(&'static str),
}
