//! Cart commands: show, add, remove, update, clear and checkout.

use std::io::Write;

use cartsync_client::ProductCatalog;
use cartsync_core::{LineItem, ProductId, QuantityUpdate, VariantKey};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::CliError;
use crate::output::{render_cart, render_json};

/// What to add, as given on the command line.
pub struct AddRequest {
    pub product_id: ProductId,
    pub variant: VariantKey,
    pub quantity: u32,
    pub price: Option<Decimal>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

/// Print the cart.
///
/// # Errors
///
/// Returns error if writing the output fails.
pub fn show(ctx: &Context, out: &mut impl Write, json: bool) -> Result<(), CliError> {
    let cart = ctx.store.snapshot();
    if json {
        render_json(out, &cart)
    } else {
        render_cart(out, &cart, ctx.currency)
    }
}

/// Add an item.
///
/// With an explicit price the item is added as given. Otherwise its price,
/// title and stock come from the catalog, and the quantity is capped at the
/// available stock.
///
/// # Errors
///
/// Returns error if the product is unknown or out of stock, or if no price
/// is available.
pub async fn add(ctx: &Context, out: &mut impl Write, request: AddRequest) -> Result<(), CliError> {
    let item = resolve_item(ctx, request).await?;
    let (product_id, quantity) = (item.product_id.clone(), item.quantity);

    if ctx.store.add_item(item) {
        info!(product_id = %product_id, quantity, "Added to cart");
        writeln!(out, "Added {quantity} x {product_id}.")?;
    } else {
        writeln!(out, "Nothing to add.")?;
    }
    render_cart(out, &ctx.store.snapshot(), ctx.currency)
}

async fn resolve_item(ctx: &Context, request: AddRequest) -> Result<LineItem, CliError> {
    let AddRequest {
        product_id,
        variant,
        quantity,
        price,
        title,
        thumbnail,
    } = request;

    let mut item = if let Some(price) = price {
        LineItem::new(product_id.clone(), variant, quantity, price)
    } else {
        let catalog = ctx
            .catalog
            .as_ref()
            .ok_or_else(|| CliError::MissingPrice(product_id.to_string()))?;
        let listing = catalog
            .lookup(&product_id)
            .await?
            .ok_or_else(|| CliError::UnknownProduct(product_id.to_string()))?;

        let item = LineItem::from_listing(&listing, variant, quantity)
            .ok_or_else(|| CliError::OutOfStock(product_id.to_string()))?;
        if item.quantity < quantity {
            warn!(
                product_id = %product_id,
                requested = quantity,
                stock = listing.stock,
                "Requested quantity capped at available stock"
            );
        }
        item
    };

    if let Some(title) = title {
        item = item.with_title(title);
    }
    if let Some(thumbnail) = thumbnail {
        item = item.with_thumbnail(thumbnail);
    }
    Ok(item)
}

/// Remove a product. Without a variant every variant of the product is
/// removed.
///
/// # Errors
///
/// Returns error if writing the output fails.
pub fn remove(
    ctx: &Context,
    out: &mut impl Write,
    product_id: &ProductId,
    variant: Option<&VariantKey>,
) -> Result<(), CliError> {
    if ctx.store.remove_item(product_id, variant) {
        writeln!(out, "Removed {product_id}.")?;
    } else {
        writeln!(out, "{product_id} is not in the cart.")?;
    }
    render_cart(out, &ctx.store.snapshot(), ctx.currency)
}

/// Set a line's quantity. A quantity below one removes the line.
///
/// # Errors
///
/// Returns error if writing the output fails.
pub fn update(
    ctx: &Context,
    out: &mut impl Write,
    product_id: &ProductId,
    variant: &VariantKey,
    quantity: i64,
) -> Result<(), CliError> {
    match ctx.store.update_quantity(product_id, variant, quantity) {
        QuantityUpdate::Updated => writeln!(out, "Updated {product_id} to {quantity}.")?,
        QuantityUpdate::Removed => writeln!(out, "Removed {product_id}.")?,
        QuantityUpdate::Unchanged => writeln!(out, "{product_id} already has quantity {quantity}.")?,
        QuantityUpdate::Missing => writeln!(out, "{product_id} ({variant}) is not in the cart.")?,
    }
    render_cart(out, &ctx.store.snapshot(), ctx.currency)
}

/// Empty the cart.
///
/// # Errors
///
/// Returns error if writing the output fails.
pub async fn clear(ctx: &Context, out: &mut impl Write) -> Result<(), CliError> {
    let synced = ctx.store.clear_cart().await;
    writeln!(out, "Cart cleared.")?;
    if !synced {
        writeln!(out, "Warning: the saved cart on the server could not be cleared.")?;
    }
    Ok(())
}

/// Print the final order summary and empty the cart.
///
/// # Errors
///
/// Returns error if no user is signed in, the cart is empty, or writing the
/// output fails.
pub async fn checkout(ctx: &Context, out: &mut impl Write) -> Result<(), CliError> {
    if !ctx.session.is_authenticated() {
        return Err(CliError::SignInRequired("checkout"));
    }
    if ctx.store.snapshot().is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    let checkout = ctx.store.checkout().await;
    writeln!(out, "Order summary:")?;
    render_cart(out, &checkout.cart, ctx.currency)?;
    if !checkout.remote_cleared {
        writeln!(out, "Warning: the saved cart on the server could not be cleared.")?;
    }
    Ok(())
}
