//! Rendering carts for the terminal.

use std::io::Write;

use cartsync_core::{CartState, CurrencyCode, LineItem, Price};

use crate::error::CliError;

/// Print the cart as an aligned table followed by its totals.
///
/// # Errors
///
/// Returns error if writing to `out` fails.
pub fn render_cart(
    out: &mut impl Write,
    cart: &CartState,
    currency: CurrencyCode,
) -> Result<(), CliError> {
    if cart.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for item in cart.items() {
        writeln!(
            out,
            "{:<24} {:<14} {:>4} x {:>10} = {:>10}",
            label(item),
            item.variant.to_string(),
            item.quantity,
            Price::new(item.unit_price, currency).display(),
            Price::new(item.line_total(), currency).display(),
        )?;
    }

    writeln!(
        out,
        "{} item(s), total {}",
        cart.total_items(),
        Price::new(cart.total_price(), currency).display()
    )?;
    Ok(())
}

/// Print the cart as JSON.
///
/// # Errors
///
/// Returns error if serialization or writing fails.
pub fn render_json(out: &mut impl Write, cart: &CartState) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, cart)?;
    writeln!(out)?;
    Ok(())
}

fn label(item: &LineItem) -> &str {
    if item.title.is_empty() {
        item.product_id.as_str()
    } else {
        &item.title
    }
}
